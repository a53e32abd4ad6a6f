//! Telegram adapter (teloxide).
//!
//! Implements the `frb-core` Notifier port over the Telegram Bot API:
//! photo-with-caption notifications with a plain HTML-link fallback, and
//! the text sends used by the command handlers.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
};

use tokio::time::sleep;
use url::Url;

pub mod handlers;
pub mod limits;
pub mod router;

use frb_core::{
    domain::{ChatId, Notification},
    errors::Error,
    formatting::entry_anchor,
    ports::Notifier,
    Result,
};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Delivery(format!("telegram error: {e}"))
    }

    /// One retry honoring Telegram's flood-wait; everything else fails
    /// through to the caller.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    pub async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(())
    }

    pub async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), html.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, image: Url, caption: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_photo(Self::tg_chat(chat_id), InputFile::url(image.clone()))
                .caption(caption.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, destination: ChatId, notification: &Notification) -> Result<()> {
        let anchor = entry_anchor(&notification.link, &notification.title);

        if let Some(image) = &notification.image_url {
            match Url::parse(image) {
                Ok(url) => match self.send_photo(destination, url, &anchor).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!(
                            chat_id = destination.0,
                            error = %e,
                            "photo send failed, falling back to text"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(image = %image, error = %e, "unusable image URL, sending text");
                }
            }
        }

        self.send_html(destination, &anchor).await
    }
}
