//! Bot wiring: handler tree and dispatch loop.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::handlers::{handle_command, Command};
use crate::state::BotState;

/// The Gatewatch Telegram bot.
pub struct GateBot {
    bot: Bot,
    state: Arc<BotState>,
}

impl GateBot {
    /// Wraps a bot handle and shared state.
    pub fn new(bot: Bot, state: Arc<BotState>) -> Self {
        Self { bot, state }
    }

    /// Runs the dispatch loop until Ctrl-C.
    pub async fn run(self) {
        let state_for_commands = Arc::clone(&self.state);

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let state = Arc::clone(&state_for_commands);
                        async move { handle_command(bot, msg, cmd, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| {
                        msg.text().map(|t| t.starts_with('/')).unwrap_or(false)
                    })
                    .endpoint(|bot: Bot, msg: Message| async move {
                        if let Some(text) = msg.text() {
                            let cmd = text.split_whitespace().next().unwrap_or(text);
                            bot.send_message(
                                msg.chat.id,
                                format!("Unknown command: {cmd}\n\nUse /help to see available commands."),
                            )
                            .await?;
                        }
                        Ok(())
                    }),
            );

        info!("bot is running, send /start to begin");

        Dispatcher::builder(self.bot, handler)
            .default_handler(|upd| async move {
                warn!("unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}
