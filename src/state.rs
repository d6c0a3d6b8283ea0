use log::{info, warn};

use crate::api::error::ApiError;
use crate::api::models::{Message, SendMessageRequest, Snapshot};
use crate::reconciler::{self, ConversationSet, SelfIdentity};

pub const LOAD_ERROR: &str = "Failed to load messages. Please try again.";
pub const OFFLINE_ERROR: &str = "You're offline. Connect to load messages.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub selected: Option<String>,
    pub online: bool,
    pub loading: bool,
    pub error: Option<String>,
    /// Single-pane layout for narrow terminals.
    pub compact: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { selected: None, online: true, loading: true, error: None, compact: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Fetch,
    /// A previous poll has not answered yet.
    InFlight,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendRefusal {
    AlreadySending,
    EmptyDraft,
    NoConversation,
}

/// All mutable client state. Only the UI loop touches it.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub conversations: ConversationSet,
    pub view: ViewState,
    pub draft: String,
    me: SelfIdentity,
    poll_in_flight: bool,
    sending: bool,
}

impl AppState {
    pub fn new(me: SelfIdentity) -> Self {
        Self { me, ..Self::default() }
    }

    pub fn me(&self) -> &SelfIdentity {
        &self.me
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn begin_poll(&mut self) -> PollDecision {
        if !self.view.online {
            self.view.error = Some(OFFLINE_ERROR.to_string());
            self.view.loading = false;
            return PollDecision::Offline;
        }
        if self.poll_in_flight {
            return PollDecision::InFlight;
        }
        self.poll_in_flight = true;
        self.view.loading = true;
        PollDecision::Fetch
    }

    /// A failed poll keeps the last good conversations on screen.
    pub fn finish_poll(&mut self, result: Result<Snapshot, ApiError>) {
        self.poll_in_flight = false;
        self.view.loading = false;
        match result {
            Ok(snapshot) => {
                self.conversations = reconciler::rebuild_from_snapshot(snapshot.messages, &self.me);
                if self.view.selected.is_none() {
                    self.view.selected = self.conversations.first_wa_id().map(str::to_string);
                }
                self.view.error = None;
            }
            Err(e) => {
                warn!("Failed to fetch messages: {}", e);
                self.view.error = Some(LOAD_ERROR.to_string());
            }
        }
    }

    pub fn select(&mut self, wa_id: &str) {
        self.view.selected = Some(wa_id.to_string());
        self.conversations = reconciler::mark_read(std::mem::take(&mut self.conversations), wa_id);
    }

    pub fn back(&mut self) {
        self.view.selected = None;
    }

    /// Returns true when the client just came back online and should poll right away.
    pub fn set_online(&mut self, online: bool) -> bool {
        let was_online = self.view.online;
        self.view.online = online;
        if was_online != online {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
        online && !was_online
    }

    pub fn set_layout_width(&mut self, columns: u16, compact_below: u16) {
        self.view.compact = columns < compact_below;
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    pub fn begin_send(&mut self) -> Result<SendMessageRequest, SendRefusal> {
        if self.sending {
            return Err(SendRefusal::AlreadySending);
        }
        if self.draft.trim().is_empty() {
            return Err(SendRefusal::EmptyDraft);
        }
        let conv = self
            .view
            .selected
            .as_deref()
            .and_then(|id| self.conversations.get(id))
            .ok_or(SendRefusal::NoConversation)?;
        let req = SendMessageRequest {
            wa_id: conv.wa_id.clone(),
            name: conv.user.name.clone(),
            message: self.draft.clone(),
        };
        self.sending = true;
        Ok(req)
    }

    /// On failure the draft stays so the user can resend it.
    pub fn finish_send(&mut self, wa_id: &str, result: Result<Message, ApiError>) {
        self.sending = false;
        match result {
            Ok(msg) => {
                self.conversations = reconciler::merge_local_send(std::mem::take(&mut self.conversations), wa_id, msg);
                self.draft.clear();
            }
            Err(e) => warn!("Failed to send message to {}: {}", wa_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::MessageStatus;
    use crate::reconciler::tests::{ME, msg};
    use reqwest::StatusCode;

    fn snapshot() -> Snapshot {
        Snapshot {
            messages: vec![
                msg("m1", "111", "111", "2025-03-04T10:00:00Z", MessageStatus::Delivered),
                msg("m2", "111", ME, "2025-03-04T10:05:00Z", MessageStatus::Sent),
                msg("m3", "222", "222", "2025-03-04T11:00:00Z", MessageStatus::Delivered),
            ],
            rejected: Vec::new(),
        }
    }

    fn loaded() -> AppState {
        let mut state = AppState::new(SelfIdentity::new(ME));
        assert_eq!(state.begin_poll(), PollDecision::Fetch);
        state.finish_poll(Ok(snapshot()));
        state
    }

    #[test]
    fn starts_loading() {
        let state = AppState::new(SelfIdentity::new(ME));
        assert!(state.view.loading);
        assert!(state.view.online);
        assert_eq!(state.view.selected, None);
    }

    #[test]
    fn successful_poll_auto_selects_first_seen() {
        let state = loaded();
        assert!(!state.view.loading);
        assert_eq!(state.view.selected.as_deref(), Some("111"));
        assert_eq!(state.conversations.get("111").unwrap().unread_count, 1);
    }

    #[test]
    fn overlapping_poll_is_skipped() {
        let mut state = AppState::new(SelfIdentity::new(ME));
        assert_eq!(state.begin_poll(), PollDecision::Fetch);
        assert_eq!(state.begin_poll(), PollDecision::InFlight);
        state.finish_poll(Ok(snapshot()));
        assert_eq!(state.begin_poll(), PollDecision::Fetch);
    }

    #[test]
    fn failed_poll_keeps_stale_conversations() {
        let mut state = loaded();
        let before = state.conversations.clone();
        state.begin_poll();
        state.finish_poll(Err(ApiError::Status(StatusCode::BAD_GATEWAY)));
        assert_eq!(state.conversations, before);
        assert_eq!(state.view.error.as_deref(), Some(LOAD_ERROR));
        assert!(!state.view.loading);

        state.begin_poll();
        state.finish_poll(Ok(snapshot()));
        assert_eq!(state.view.error, None);
    }

    #[test]
    fn offline_poll_leaves_state_untouched() {
        let mut state = loaded();
        let before = state.conversations.clone();
        assert!(!state.set_online(false));
        assert_eq!(state.begin_poll(), PollDecision::Offline);
        assert_eq!(state.conversations, before);
        assert_eq!(state.view.error.as_deref(), Some(OFFLINE_ERROR));
        assert!(state.set_online(true));
        assert!(!state.set_online(true));
    }

    #[test]
    fn selecting_marks_read_and_back_clears() {
        let mut state = loaded();
        state.select("222");
        assert_eq!(state.view.selected.as_deref(), Some("222"));
        assert_eq!(state.conversations.get("222").unwrap().unread_count, 0);
        state.back();
        assert_eq!(state.view.selected, None);
    }

    #[test]
    fn send_round_trip_merges_and_clears_draft() {
        let mut state = loaded();
        state.set_draft("hello");
        let req = state.begin_send().unwrap();
        assert_eq!(req.wa_id, "111");
        assert_eq!(req.name, "user-111");
        assert_eq!(state.begin_send(), Err(SendRefusal::AlreadySending));

        let sent = msg("s1", "111", ME, "2025-03-04T10:06:00Z", MessageStatus::Sent);
        state.finish_send("111", Ok(sent));
        assert!(state.draft.is_empty());
        assert!(!state.is_sending());
        assert_eq!(state.conversations.get("111").unwrap().messages.len(), 3);
    }

    #[test]
    fn failed_send_keeps_draft() {
        let mut state = loaded();
        state.set_draft("hello");
        state.begin_send().unwrap();
        state.finish_send("111", Err(ApiError::MissingMessage));
        assert_eq!(state.draft, "hello");
        assert!(state.begin_send().is_ok());
    }

    #[test]
    fn send_refusals() {
        let mut state = loaded();
        state.set_draft("   ");
        assert_eq!(state.begin_send(), Err(SendRefusal::EmptyDraft));
        state.set_draft("hi");
        state.back();
        assert_eq!(state.begin_send(), Err(SendRefusal::NoConversation));
    }

    #[test]
    fn narrow_terminal_is_compact() {
        let mut state = loaded();
        state.set_layout_width(60, 80);
        assert!(state.view.compact);
        state.set_layout_width(120, 80);
        assert!(!state.view.compact);
    }
}
