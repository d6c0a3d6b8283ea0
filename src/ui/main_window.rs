use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::api::events::AppEvent;
use crate::app::AppConfig;
use crate::reconciler::SelfIdentity;
use crate::state::{AppState, PollDecision, SendRefusal};
use crate::ui::chat_view::ChatView;
use crate::ui::sidebar;
use crate::utils::{run_async_to_loop, spawn_async, terminal_width};

const RESIZE_CHECK: Duration = Duration::from_millis(500);
const OFFLINE_BANNER: &str = "You're offline - messages may not sync";
const HELP: &str = "Commands: /list, /open <n|wa_id>, /back, /retry, /resend, /quit. Anything else is sent to the open chat.";

/// Compose the whole screen from state. Narrow terminals get one pane at a time.
pub fn render<Tz: TimeZone>(state: &AppState, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let view = &state.view;
    let mut out = String::new();
    if !view.compact || view.selected.is_none() {
        let rows = sidebar::rows(&state.conversations, now);
        out.push_str(&sidebar::render(&rows, view.selected.as_deref()));
        out.push('\n');
    }
    if !view.online {
        out.push_str(OFFLINE_BANNER);
        out.push('\n');
    }
    if view.loading && view.selected.is_none() {
        out.push_str("Loading messages…\n");
    } else if let Some(err) = &view.error {
        out.push_str(err);
        out.push_str(if view.loading { "\nRetrying…\n" } else { "\nType /retry to try again.\n" });
    } else if let Some(conv) = view.selected.as_deref().and_then(|id| state.conversations.get(id)) {
        out.push_str(&ChatView::render(conv, state.me(), now, &state.draft));
    } else if state.conversations.is_empty() {
        out.push_str("No chats available\n");
    } else {
        out.push_str("Select a chat to begin\n");
    }
    out
}

enum Flow {
    Continue,
    Quit,
}

struct MainWindow {
    state: AppState,
    client: Arc<ApiClient>,
    tx: UnboundedSender<AppEvent>,
    columns: u16,
    compact_width: u16,
}

impl MainWindow {
    fn redraw(&mut self) {
        self.state.set_layout_width(self.columns, self.compact_width);
        println!("{}", render(&self.state, &Local::now()));
    }

    fn poll(&mut self) {
        match self.state.begin_poll() {
            PollDecision::Fetch => {
                let client = self.client.clone();
                run_async_to_loop(self.tx.clone(), async move { AppEvent::PollFinished(client.messages().await) });
                // An open chat stays put during background refreshes.
                if self.state.view.selected.is_none() || self.state.view.error.is_some() {
                    self.redraw();
                }
            }
            PollDecision::InFlight => debug!("Previous poll still running, skipping tick"),
            PollDecision::Offline => {
                debug!("Offline, skipping poll");
                self.redraw();
            }
        }
    }

    fn send(&mut self) {
        match self.state.begin_send() {
            Ok(req) => {
                let client = self.client.clone();
                run_async_to_loop(self.tx.clone(), async move {
                    let result = client.send_message(&req).await;
                    AppEvent::SendFinished { wa_id: req.wa_id, result }
                });
            }
            Err(SendRefusal::AlreadySending) => println!("Still sending the previous message…"),
            Err(SendRefusal::EmptyDraft) => {}
            Err(SendRefusal::NoConversation) => println!("Open a chat first (/list, /open <n>)."),
        }
    }

    fn open(&mut self, target: &str) {
        let rows = sidebar::rows(&self.state.conversations, &Local::now());
        let wa_id = match target.parse::<usize>() {
            Ok(n) if n >= 1 && n <= rows.len() => Some(rows[n - 1].wa_id.clone()),
            _ => rows.iter().find(|r| r.wa_id == target).map(|r| r.wa_id.clone()),
        };
        match wa_id {
            Some(id) => {
                self.state.select(&id);
                self.redraw();
            }
            None => println!("No conversation {}", target),
        }
    }

    fn handle_input(&mut self, line: &str) -> Flow {
        let line = line.trim_end_matches(['\r', '\n']);
        let (cmd, arg) = match line.split_once(' ') {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };
        match cmd {
            "/quit" | "/q" => return Flow::Quit,
            "/list" | "/l" => self.redraw(),
            "/open" | "/o" => self.open(arg),
            "/back" | "/b" => {
                self.state.back();
                self.redraw();
            }
            "/retry" | "/r" => self.poll(),
            "/resend" => self.send(),
            "/help" | "/h" => println!("{}", HELP),
            _ if cmd.starts_with('/') => println!("{}", HELP),
            _ if line.trim().is_empty() => {}
            _ => {
                if self.state.is_sending() {
                    println!("Still sending the previous message…");
                } else {
                    self.state.set_draft(line);
                    self.send();
                }
            }
        }
        Flow::Continue
    }

    fn handle(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::PollTick => self.poll(),
            AppEvent::PollFinished(result) => {
                self.state.finish_poll(result);
                self.redraw();
            }
            AppEvent::SendFinished { wa_id, result } => {
                self.state.finish_send(&wa_id, result);
                self.redraw();
            }
            AppEvent::Connectivity(online) => {
                let reconnected = self.state.set_online(online);
                self.redraw();
                if reconnected {
                    self.poll();
                }
            }
            AppEvent::Resize(columns) => {
                self.columns = columns;
                self.redraw();
            }
            AppEvent::Input(line) => return self.handle_input(&line),
            AppEvent::InputClosed => return Flow::Quit,
        }
        Flow::Continue
    }
}

fn spawn_poll_timer(tx: UnboundedSender<AppEvent>, every: Duration) -> JoinHandle<()> {
    spawn_async(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // The first tick completes immediately, which gives the initial load.
            ticker.tick().await;
            if tx.send(AppEvent::PollTick).is_err() {
                break;
            }
        }
    })
}

fn spawn_probe(client: Arc<ApiClient>, tx: UnboundedSender<AppEvent>, every: Duration) -> JoinHandle<()> {
    spawn_async(async move {
        let mut online = true;
        loop {
            let reachable = client.probe().await;
            if reachable != online {
                online = reachable;
                if tx.send(AppEvent::Connectivity(online)).is_err() {
                    break;
                }
            }
            tokio::time::sleep(every).await;
        }
    })
}

fn spawn_resize_watch(tx: UnboundedSender<AppEvent>, initial: u16) -> JoinHandle<()> {
    spawn_async(async move {
        let mut columns = initial;
        loop {
            tokio::time::sleep(RESIZE_CHECK).await;
            let now = terminal_width();
            if now != columns {
                columns = now;
                if tx.send(AppEvent::Resize(columns)).is_err() {
                    break;
                }
            }
        }
    })
}

fn spawn_input(tx: UnboundedSender<AppEvent>) -> JoinHandle<()> {
    spawn_async(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(AppEvent::Input(line)).is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    let _ = tx.send(AppEvent::InputClosed);
                    break;
                }
            }
        }
    })
}

pub async fn show_main_window(config: AppConfig) -> Result<(), ApiError> {
    let client = Arc::new(ApiClient::new(&config.base_url, Duration::from_secs(config.request_timeout_secs))?);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let columns = terminal_width();
    let tasks = [
        spawn_poll_timer(tx.clone(), Duration::from_secs(config.poll_interval_secs.max(1))),
        spawn_probe(client.clone(), tx.clone(), Duration::from_secs(config.probe_interval_secs.max(1))),
        spawn_resize_watch(tx.clone(), columns),
        spawn_input(tx.clone()),
    ];

    let mut window = MainWindow {
        state: AppState::new(SelfIdentity::new(config.self_number.as_str())),
        client,
        tx,
        columns,
        compact_width: config.compact_width,
    };
    info!("Polling {} every {}s", config.base_url, config.poll_interval_secs);
    println!("{}", HELP);
    window.redraw();

    while let Some(event) = rx.recv().await {
        if let Flow::Quit = window.handle(event) {
            break;
        }
    }

    for task in tasks {
        task.abort();
    }
    // Dropping the receiver makes any in-flight request discard its result.
    drop(rx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{MessageStatus, Snapshot};
    use crate::reconciler::tests::{ME, msg};
    use chrono::Utc;

    fn loaded(compact: bool) -> AppState {
        let mut state = AppState::new(SelfIdentity::new(ME));
        state.begin_poll();
        state.finish_poll(Ok(Snapshot {
            messages: vec![
                msg("m1", "111", "111", "2025-03-04T10:00:00Z", MessageStatus::Delivered),
                msg("m2", "222", "222", "2025-03-04T11:00:00Z", MessageStatus::Read),
            ],
            rejected: Vec::new(),
        }));
        state.set_layout_width(if compact { 40 } else { 120 }, 80);
        state
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn initial_screen_shows_loading() {
        let state = AppState::new(SelfIdentity::new(ME));
        assert!(render(&state, &now()).contains("Loading messages…"));
    }

    #[test]
    fn wide_layout_shows_both_panes() {
        let text = render(&loaded(false), &now());
        assert!(text.starts_with("Conversations"));
        assert!(text.contains("== user-111 =="));
    }

    #[test]
    fn compact_layout_shows_one_pane() {
        let mut state = loaded(true);
        let text = render(&state, &now());
        assert!(!text.contains("Conversations"));
        assert!(text.contains("== user-111 =="));

        state.back();
        let text = render(&state, &now());
        assert!(text.contains("Conversations"));
        assert!(text.contains("Select a chat to begin"));
    }

    #[test]
    fn loading_shows_while_nothing_is_selected() {
        let mut state = loaded(false);
        state.back();
        assert_eq!(state.begin_poll(), PollDecision::Fetch);
        let text = render(&state, &now());
        assert!(text.contains("user-111"));
        assert!(text.contains("Loading messages…"));

        state.select("222");
        assert!(!render(&state, &now()).contains("Loading messages…"));
    }

    #[test]
    fn retry_from_error_screen_shows_progress() {
        let mut state = loaded(false);
        state.begin_poll();
        state.finish_poll(Err(ApiError::MissingMessage));
        assert!(render(&state, &now()).contains("Type /retry to try again."));
        state.begin_poll();
        let text = render(&state, &now());
        assert!(text.contains("Retrying…"));
        assert!(!text.contains("Type /retry"));
    }

    fn window(columns: u16) -> (MainWindow, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::new(ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap());
        let window = MainWindow { state: loaded(false), client, tx, columns, compact_width: 80 };
        (window, rx)
    }

    #[test]
    fn resize_switches_layout() {
        let (mut window, _rx) = window(120);
        window.handle(AppEvent::Resize(60));
        assert!(window.state.view.compact);
        window.handle(AppEvent::Resize(100));
        assert!(!window.state.view.compact);
    }

    #[test]
    fn offline_and_error_states() {
        let mut state = loaded(false);
        state.set_online(false);
        state.begin_poll();
        let text = render(&state, &now());
        assert!(text.contains(OFFLINE_BANNER));
        assert!(text.contains("You're offline. Connect to load messages."));
        assert!(text.contains("/retry"));
        // Stale conversations stay listed.
        assert!(text.contains("user-222"));
    }
}
