//! Telegram bot interface for Gatewatch.
//!
//! This crate puts a Telegram face on the polling pipeline: it delivers
//! gate notifications to parents and exposes a small admin console for
//! attendance summaries and pipeline control.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: bot token from @BotFather
//! - either `GATEWATCH_FEED_URL` (upstream feed source) or `DEVICE_HOST`
//!   plus `DEVICE_USER`/`DEVICE_PASSWORD` (direct device source)
//!
//! Optional:
//! - `GATEWATCH_DB`: database path (default: `attendance.db`)
//! - `GATEWATCH_POLL_INTERVAL_SECS`: poll interval (default: 5)
//! - `GATEWATCH_ADMIN_CODES`: comma-separated admin access codes
//! - `DEVICE_HTTP_PORT` / `DEVICE_HTTPS_PORT`: device ports (8000 / 443)
//! - `DEVICE_LOOKBACK_SECS`: first-fetch window (default: 300)
//!
//! # Commands
//!
//! - `/start`, `/help` - welcome and command list
//! - `/register <student_id> <name>` - subscribe to a student's events
//! - `/set <name|phone|student|language> <value>` - edit your profile
//! - `/toggle <entry|exit|late>` - flip one of your notification flags
//! - `/admin <code>` - authorize this chat for admin commands
//! - `/startpoll`, `/stoppoll` - control the pipeline (admin)
//! - `/today` - today's attendance summary (admin)
//! - `/history <student_id>` - one student's recent events (admin)

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod state;

pub use bot::GateBot;
pub use config::{BotConfig, SourceConfig};
pub use error::{Result, TelegramError};
pub use notifier::TelegramNotifier;
pub use state::BotState;
