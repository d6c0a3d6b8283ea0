//! Turns flat message snapshots into the per-conversation view model.
//!
//! Every operation takes the previous [`ConversationSet`] by value and hands
//! back the next one, so the UI loop owns exactly one copy of the state and
//! tests can drive the transitions without any network or terminal.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{debug, warn};

use crate::api::models::{Message, MessageStatus, UserInfo};

/// The local user's phone number. Messages sent from it are outgoing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfIdentity {
    number: String,
}

impl SelfIdentity {
    pub fn new(number: impl Into<String>) -> Self {
        Self { number: number.into().trim().to_string() }
    }

    /// An unset identity owns nothing, so every message counts as incoming.
    pub fn is_outgoing(&self, msg: &Message) -> bool {
        !self.number.is_empty() && msg.user_info.number == self.number
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub wa_id: String,
    pub user: UserInfo,
    pub messages: Vec<Message>,
    pub unread_count: usize,
}

impl Conversation {
    fn new(wa_id: &str, user: UserInfo) -> Self {
        Self { wa_id: wa_id.to_string(), user, messages: Vec::new(), unread_count: 0 }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Timestamp used to order the conversation list; empty conversations sort at the epoch.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message().map(|m| m.timestamp).unwrap_or_default()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.message_id == message_id)
    }

    // Stable, so equal timestamps keep arrival order.
    fn sort_messages(&mut self) {
        self.messages.sort_by_key(|m| m.timestamp);
    }
}

/// Conversations keyed by `wa_id`, remembering the order in which each key first appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSet {
    conversations: HashMap<String, Conversation>,
    order: Vec<String>,
}

impl ConversationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, wa_id: &str) -> Option<&Conversation> {
        self.conversations.get(wa_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The conversation whose `wa_id` was seen first; used for auto-selection.
    pub fn first_wa_id(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Conversations in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.order.iter().filter_map(|id| self.conversations.get(id))
    }

    pub fn total_unread(&self) -> usize {
        self.conversations.values().map(|c| c.unread_count).sum()
    }

    fn entry(&mut self, wa_id: &str, seed: impl FnOnce() -> UserInfo) -> &mut Conversation {
        if !self.conversations.contains_key(wa_id) {
            self.order.push(wa_id.to_string());
        }
        self.conversations
            .entry(wa_id.to_string())
            .or_insert_with(|| Conversation::new(wa_id, seed()))
    }
}

/// Rebuilds the whole set from an authoritative snapshot.
///
/// User info comes from the first message seen for each `wa_id`. A repeated
/// `message_id` inside one conversation keeps its first occurrence.
pub fn rebuild_from_snapshot(messages: Vec<Message>, me: &SelfIdentity) -> ConversationSet {
    let mut set = ConversationSet::new();
    for msg in messages {
        let wa_id = msg.wa_id.clone();
        let conv = set.entry(&wa_id, || msg.user_info.clone());
        if conv.contains(&msg.message_id) {
            warn!("Dropping duplicate message {} in conversation {}", msg.message_id, wa_id);
            continue;
        }
        if msg.status != MessageStatus::Read && !me.is_outgoing(&msg) {
            conv.unread_count += 1;
        }
        conv.messages.push(msg);
    }
    for conv in set.conversations.values_mut() {
        conv.sort_messages();
    }
    debug!("Rebuilt {} conversations ({} unread)", set.len(), set.total_unread());
    set
}

/// Adds a message the local user just sent. Idempotent on `message_id`;
/// leaves the unread count alone.
pub fn merge_local_send(mut set: ConversationSet, wa_id: &str, msg: Message) -> ConversationSet {
    let conv = set.entry(wa_id, || msg.user_info.clone());
    if conv.contains(&msg.message_id) {
        debug!("Message {} already present in {}", msg.message_id, wa_id);
        return set;
    }
    conv.messages.push(msg);
    conv.sort_messages();
    set
}

/// Clears the unread badge and promotes `delivered` messages to `read`.
/// `sent` messages never reached the device, so they stay `sent`.
pub fn mark_read(mut set: ConversationSet, wa_id: &str) -> ConversationSet {
    let Some(conv) = set.conversations.get_mut(wa_id) else {
        return set;
    };
    if conv.unread_count == 0 {
        return set;
    }
    conv.unread_count = 0;
    for msg in conv.messages.iter_mut().filter(|m| m.status == MessageStatus::Delivered) {
        msg.status = MessageStatus::Read;
    }
    set
}

/// Most recently active first; ties keep first-seen order.
pub fn sorted_conversations(set: &ConversationSet) -> Vec<&Conversation> {
    let mut list: Vec<&Conversation> = set.iter().collect();
    list.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
    list
}

#[derive(Debug, PartialEq, Eq)]
pub struct DayGroup<'a> {
    pub label: String,
    pub messages: Vec<&'a Message>,
}

pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if Some(date) == today.pred_opt() {
        "Yesterday".to_string()
    } else {
        date.format("%B %-d, %Y").to_string()
    }
}

/// Buckets messages by calendar day in `now`'s time zone, in order of first appearance.
pub fn group_by_day<'a, Tz: TimeZone>(messages: &'a [Message], now: &DateTime<Tz>) -> Vec<DayGroup<'a>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let mut groups: Vec<DayGroup<'a>> = Vec::new();
    for msg in messages {
        let label = day_label(msg.timestamp.with_timezone(&tz).date_naive(), today);
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.messages.push(msg),
            None => groups.push(DayGroup { label, messages: vec![msg] }),
        }
    }
    groups
}
