//! Plain-text rendering of client output.

use hashchat_client::{ChatMessage, MessageOrigin, Notice, NoticeLevel, OnlineUser};
use hashchat_core::ChatError;

/// `HH:MM` in UTC for an epoch-millisecond timestamp.
pub fn clock(timestamp: u64) -> String {
    let minutes = timestamp / 60_000;
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}

/// One line for a delivered message.
pub fn message_line(message: &ChatMessage, own_name: &str) -> String {
    let time = message.timestamp.map_or_else(|| "--:--".to_string(), clock);
    let name = match message.origin {
        MessageOrigin::Local => own_name,
        _ => message.display_name(),
    };

    let mut marks = String::new();
    for flag in &message.flags {
        match flag {
            ChatError::ChainDiscontinuity { .. } => marks.push_str(" [chain broken]"),
            ChatError::OrphanReference { .. } => marks.push_str(" [unlinked]"),
            _ => {},
        }
    }
    if message.origin == MessageOrigin::Legacy {
        marks.push_str(" [unverified]");
    }

    format!("[{time}] {name}{marks}: {}", message.content)
}

/// One line for a system notice.
pub fn notice_line(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("* {}", notice.text),
        NoticeLevel::Warning => format!("! {}", notice.text),
    }
}

/// Online users: self first, then everyone else by name.
pub fn online_line(users: &[OnlineUser], own_id: &str, own_name: &str) -> String {
    let mut others: Vec<&str> = users
        .iter()
        .filter(|u| u.client_id != own_id)
        .map(|u| u.username.as_str())
        .collect();
    others.sort_unstable();

    let mut line = format!("Online ({}): {own_name} (you)", others.len() + 1);
    for name in others {
        line.push_str(", ");
        line.push_str(name);
    }
    line
}
