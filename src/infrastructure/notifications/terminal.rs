use std::borrow::Cow;

use async_trait::async_trait;
use colored::Colorize;

use crate::domain::entities::alert::AlertRecord;
use crate::domain::ports::notifier::{NotificationError, NotificationGateway};
use crate::domain::value_objects::priority::Priority;

const SEPARATOR_WIDTH: usize = 70;

/// Prints alerts to stdout.
#[derive(Default)]
pub struct TerminalChannel;

impl TerminalChannel {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationGateway for TerminalChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        let separator = "\u{2500}".repeat(SEPARATOR_WIDTH);

        println!("\n{}", separator.dimmed());
        println!(
            "{} {} {}",
            priority_badge(alert.priority),
            sanitize(&alert.subject).bold(),
            alert.timestamp.format("%H:%M:%S").to_string().dimmed()
        );
        println!("{}", separator.dimmed());

        if !alert.body.is_empty() {
            println!("{}", sanitize(&alert.body));
        }

        if !alert.attachments.is_empty() {
            println!("\n{}", "Attachments:".cyan().bold());
            for attachment in &alert.attachments {
                println!("  {}", sanitize(&attachment.path).dimmed());
            }
        }

        println!("{}\n", separator.dimmed());
        Ok(())
    }
}

/// Strip ANSI escape sequences and C0/C1 control characters from a string,
/// preserving only printable content, newlines, and tabs.
fn sanitize(s: &str) -> Cow<'_, str> {
    if s.bytes()
        .any(|b| matches!(b, 0x00..=0x08 | 0x0B..=0x0C | 0x0E..=0x1F | 0x7F))
    {
        Cow::Owned(
            s.chars()
                .filter(|&c| !matches!(c as u32, 0x00..=0x08 | 0x0B..=0x0C | 0x0E..=0x1F | 0x7F))
                .collect(),
        )
    } else {
        Cow::Borrowed(s)
    }
}

#[must_use]
fn priority_badge(priority: Priority) -> String {
    match priority {
        Priority::High => format!(" {priority} ").on_red().white().bold().to_string(),
        Priority::Normal => format!(" {priority} ").on_blue().white().to_string(),
    }
}
