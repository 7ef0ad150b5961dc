//! Text and JSON-lines rendering of notifications.

use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;

use courier_core::{Message, Notification};

const PREVIEW_CHARS: usize = 60;

pub fn print(notification: &Notification, json: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if json {
        let line =
            serde_json::to_string(notification).context("failed to encode notification")?;
        writeln!(out, "{line}").context("write stdout")?;
        return Ok(());
    }

    match notification {
        Notification::Events { category, messages } => {
            writeln!(
                out,
                "{} {}",
                category.as_str().cyan().bold(),
                format!("({})", messages.len()).dimmed()
            )
            .context("write stdout")?;
            for message in messages {
                writeln!(out, "  {}", row_line(message)).context("write stdout")?;
            }
        }
        Notification::MessageMatch { temp_guid, message } => {
            writeln!(
                out,
                "{} {} -> {}",
                notification.name().green().bold(),
                temp_guid.as_deref().unwrap_or("-"),
                message.guid
            )
            .context("write stdout")?;
        }
        Notification::MessageError {
            temp_guid, reason, ..
        } => {
            writeln!(
                out,
                "{} {}: {}",
                notification.name().red().bold(),
                temp_guid.as_deref().unwrap_or("-"),
                reason
            )
            .context("write stdout")?;
        }
    }
    Ok(())
}

fn row_line(message: &Message) -> String {
    let chat = message
        .chats
        .first()
        .map(|c| c.guid.0.as_str())
        .unwrap_or("-");
    let who = if message.is_from_me {
        "me".to_string()
    } else {
        message
            .handle
            .as_ref()
            .map(|h| h.address.clone())
            .unwrap_or_else(|| "?".to_string())
    };
    format!(
        "{} {} {} {}",
        message.date_created.format("%H:%M:%S").to_string().dimmed(),
        chat,
        who.bold(),
        message.preview(PREVIEW_CHARS)
    )
}
