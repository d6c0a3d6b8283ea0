use std::fmt::Write;

use chrono::{DateTime, TimeZone};

use crate::api::models::MessageStatus;
use crate::reconciler::{Conversation, SelfIdentity, group_by_day};
use crate::utils::format_clock;

pub struct ChatView;

impl ChatView {
    /// Header, day dividers, then one line per message. Outgoing lines are
    /// indented to the right and carry a read receipt.
    pub fn render<Tz: TimeZone>(conv: &Conversation, me: &SelfIdentity, now: &DateTime<Tz>, draft: &str) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let tz = now.timezone();
        let mut out = String::new();
        let title = if conv.user.name.trim().is_empty() { conv.wa_id.as_str() } else { conv.user.name.as_str() };
        let _ = writeln!(out, "== {} ==", title);

        for group in group_by_day(&conv.messages, now) {
            let _ = writeln!(out, "            -- {} --", group.label);
            for msg in group.messages {
                let time = format_clock(&msg.timestamp.with_timezone(&tz));
                if me.is_outgoing(msg) {
                    let receipt = if msg.status == MessageStatus::Read { "✓✓" } else { "✓" };
                    let _ = writeln!(out, "                    {}  {} {}", msg.message, time, receipt);
                } else {
                    let _ = writeln!(out, "{}: {}  {}", msg.user_info.name, msg.message, time);
                }
            }
        }

        if !draft.is_empty() {
            let _ = writeln!(out, "[unsent] {}  (/resend to retry)", draft);
        }
        out
    }
}
