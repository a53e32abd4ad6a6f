use teloxide::requests::ResponseResult;
use teloxide::types::Message;

use frb_core::{
    domain::{FeedEntry, Notification},
    feed,
    ports::Notifier,
    Result,
};

use crate::limits::truncate_to_limit;
use crate::router::AppState;

use super::{chat_type_label, core_chat, register_chat};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(msg: &Message, state: &AppState) -> ResponseResult<()> {
    let (cmd, _args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "start" => handle_start(msg, state).await,
        "check" => handle_check(msg, state).await,
        "fetch" => handle_fetch(msg, state).await,
        "status" => handle_status(msg, state).await,
        "about" => handle_about(msg, state).await,
        _ => {
            let _ = state
                .notifier
                .send_text(
                    core_chat(&msg.chat),
                    "Unknown command. Try /start, /check, /fetch, /status or /about.",
                )
                .await;
        }
    }

    Ok(())
}

async fn handle_start(msg: &Message, state: &AppState) {
    let chat = core_chat(&msg.chat);
    register_chat(state, chat).await;

    let reply = format!(
        "Hi! I watch the feed and relay new entries here.\n\nChat ID: {}\nChat type: {}\n\nCommands: /check, /fetch, /status, /about",
        chat.0,
        chat_type_label(&msg.chat),
    );
    let _ = state.notifier.send_text(chat, &reply).await;
}

/// On-demand check: the newest entry is re-sent on purpose, even when it
/// already went out as a notification. In a private chat the entry is
/// additionally broadcast to every other registered chat; in a group it
/// stays in that group.
async fn handle_check(msg: &Message, state: &AppState) {
    let chat = core_chat(&msg.chat);
    tracing::info!(chat_id = chat.0, "manual feed check requested");

    let entries = match fetch_feed(state).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "manual feed check failed");
            let _ = state
                .notifier
                .send_text(chat, &format!("Failed to fetch the feed: {e}"))
                .await;
            return;
        }
    };

    let Some(entry) = entries.into_iter().next() else {
        let _ = state.notifier.send_text(chat, "The feed has no entries.").await;
        return;
    };

    let image_url = match state.enricher.lead_image_for(&entry.link).await {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(error = %e, link = %entry.link, "lead image lookup failed");
            None
        }
    };

    register_chat(state, chat).await;
    let notification = Notification::from_entry(&entry, image_url);
    if let Err(e) = state.notifier.deliver(chat, &notification).await {
        tracing::warn!(chat_id = chat.0, error = %e, "delivery failed");
    }

    if !msg.chat.is_private() {
        return;
    }

    for other in state.registry.all().await {
        if other == chat {
            continue;
        }
        if let Err(e) = state.notifier.deliver(other, &notification).await {
            tracing::warn!(chat_id = other.0, error = %e, "broadcast delivery failed");
        }
    }
}

async fn handle_fetch(msg: &Message, state: &AppState) {
    let chat = core_chat(&msg.chat);

    let Some(site_url) = &state.cfg.site_url else {
        let _ = state.notifier.send_text(chat, "SITE_URL is not configured.").await;
        return;
    };

    match fetch_page_text(state, site_url).await {
        Ok(text) => {
            let _ = state
                .notifier
                .send_text(chat, &truncate_to_limit(text.trim(), state.cfg.message_limit))
                .await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "site fetch failed");
            let _ = state
                .notifier
                .send_text(chat, &format!("Failed to fetch site content: {e}"))
                .await;
        }
    }
}

async fn handle_status(msg: &Message, state: &AppState) {
    let chat = core_chat(&msg.chat);
    let registered = state.registry.contains(chat).await;
    let total = state.registry.len().await;
    let last_check = state.store.last_check().await;
    let last_check = if last_check.is_empty() {
        "never".to_string()
    } else {
        last_check
    };

    let reply = format!(
        "Status\n\nChat ID: {}\nChat type: {}\nRegistered: {}\nTotal chats: {}\nLast feed check: {}",
        chat.0,
        chat_type_label(&msg.chat),
        registered,
        total,
        last_check,
    );
    let _ = state.notifier.send_text(chat, &reply).await;
}

async fn handle_about(msg: &Message, state: &AppState) {
    let reply = format!(
        "Feed relay bot\n\nVersion: {}",
        env!("CARGO_PKG_VERSION")
    );
    let _ = state.notifier.send_text(core_chat(&msg.chat), &reply).await;
}

async fn fetch_feed(state: &AppState) -> Result<Vec<FeedEntry>> {
    let resp = state.session.get_ok(&state.cfg.feed_url).await?;
    let bytes = resp.bytes().await?;
    feed::parse(&bytes)
}

async fn fetch_page_text(state: &AppState, url: &str) -> Result<String> {
    let resp = state.session.get_ok(url).await?;
    let html = resp.text().await?;
    Ok(frb_core::extract::page_text(&html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_slash_and_bot_name() {
        assert_eq!(
            parse_command("/check@feed_relay_bot now"),
            ("check".to_string(), "now".to_string())
        );
        assert_eq!(parse_command("/Start"), ("start".to_string(), String::new()));
        assert_eq!(parse_command("  /about  "), ("about".to_string(), String::new()));
    }
}
