//! The pipeline's notifier, backed by the Telegram Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;

use gatewatch_runtime::{Notifier, NotifyError};

/// Sends pipeline notifications through a Telegram bot.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    /// Wraps an existing bot handle.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| NotifyError(e.to_string()))?;
        Ok(())
    }
}
