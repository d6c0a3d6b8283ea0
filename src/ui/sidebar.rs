use std::fmt::Write;

use chrono::{DateTime, TimeZone};

use crate::reconciler::{Conversation, ConversationSet, sorted_conversations};

const PREVIEW_CHARS: usize = 40;

pub struct SidebarRow {
    pub wa_id: String,
    pub initial: char,
    pub name: String,
    pub time: String,
    pub preview: String,
    pub unread: usize,
}

impl SidebarRow {
    fn from_conversation<Tz: TimeZone>(conv: &Conversation, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let name = conv.user.name.trim();
        let last = conv.last_message();
        Self {
            wa_id: conv.wa_id.clone(),
            initial: name.chars().next().unwrap_or('?'),
            name: if name.is_empty() { "Unknown".to_string() } else { name.to_string() },
            time: last
                .map(|m| crate::utils::format_clock(&m.timestamp.with_timezone(tz)))
                .unwrap_or_default(),
            preview: match last {
                Some(m) if !m.message.is_empty() => truncate(&m.message, PREVIEW_CHARS),
                _ => "No messages yet".to_string(),
            },
            unread: conv.unread_count,
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}

/// Rows in display order: most recent conversation first.
pub fn rows<Tz: TimeZone>(set: &ConversationSet, now: &DateTime<Tz>) -> Vec<SidebarRow>
where
    Tz::Offset: std::fmt::Display,
{
    let tz = now.timezone();
    sorted_conversations(set).into_iter().map(|c| SidebarRow::from_conversation(c, &tz)).collect()
}

pub fn render(rows: &[SidebarRow], selected: Option<&str>) -> String {
    let mut out = String::from("Conversations\n");
    if rows.is_empty() {
        out.push_str("  (none)\n");
    }
    for (idx, row) in rows.iter().enumerate() {
        let marker = if selected == Some(row.wa_id.as_str()) { '>' } else { ' ' };
        let _ = write!(out, "{} {:>2}. [{}] {}", marker, idx + 1, row.initial, row.name);
        if !row.time.is_empty() {
            let _ = write!(out, "  {}", row.time);
        }
        if row.unread > 0 {
            let _ = write!(out, "  ({})", row.unread);
        }
        let _ = writeln!(out, "\n        {}", row.preview);
    }
    out
}
