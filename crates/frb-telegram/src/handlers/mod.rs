//! Telegram update handlers.
//!
//! Every path that reveals a chat id feeds the subscriber registry:
//! group traffic, the bot being added to a group, forwarded group
//! messages in private chats, and the /start and /check commands.

use std::sync::Arc;

use teloxide::requests::ResponseResult;
use teloxide::types::{Chat, ForwardedFrom, Message};

use frb_core::domain::ChatId;

use crate::router::AppState;

mod commands;
mod membership;

pub use membership::handle_my_chat_member;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat = core_chat(&msg.chat);

    // Seeing any group traffic is enough to register the group.
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        register_chat(&state, chat).await;
    }

    // A group message forwarded into the bot's private chat registers the
    // origin group; covers groups the bot receives no updates from.
    if msg.chat.is_private() {
        if let Some(forward) = msg.forward() {
            if let ForwardedFrom::Chat(origin) = &forward.from {
                if origin.is_group() || origin.is_supergroup() {
                    register_chat(&state, core_chat(origin)).await;
                    let reply = format!(
                        "Group registered.\n\nChat ID: {}\nChat type: {}\n\nNew entries will be relayed there too.",
                        origin.id.0,
                        chat_type_label(origin),
                    );
                    let _ = state.notifier.send_text(chat, &reply).await;
                }
            }
        }
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(&msg, &state).await;
    }

    let _ = state
        .notifier
        .send_text(chat, "Sorry, I only handle commands. Try /start, /check or /status.")
        .await;
    Ok(())
}

/// The single discovery entry point: idempotent registration, persisting
/// the state snapshot only when the destination is genuinely new.
pub(crate) async fn register_chat(state: &AppState, chat: ChatId) {
    if state.registry.register(chat).await {
        tracing::info!(chat_id = chat.0, "chat added to notification list");
        if let Err(e) = state.store.snapshot(&state.known, &state.registry).await {
            tracing::warn!(chat_id = chat.0, error = %e, "failed to save state after registering chat");
        }
    }
}

pub(crate) fn core_chat(chat: &Chat) -> ChatId {
    ChatId(chat.id.0)
}

pub(crate) fn chat_type_label(chat: &Chat) -> &'static str {
    if chat.is_private() {
        "private"
    } else if chat.is_group() {
        "group"
    } else if chat.is_supergroup() {
        "supergroup"
    } else if chat.is_channel() {
        "channel"
    } else {
        "unknown"
    }
}
