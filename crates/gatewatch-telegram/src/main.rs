//! Gatewatch Telegram bot entry point.

use std::sync::Arc;

use clap::Parser;
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatewatch_device::{DeviceClient, EventSource, FeedClient};
use gatewatch_runtime::{Pipeline, PollerConfig};
use gatewatch_store::AttendanceStore;
use gatewatch_telegram::{BotConfig, BotState, GateBot, Result, SourceConfig, TelegramNotifier};

/// School gate notification bot.
#[derive(Parser, Debug)]
#[command(name = "gatewatch-telegram", version, about)]
struct Args {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "gatewatch=info,gatewatch_telegram=info,teloxide=warn",
        1 => "gatewatch=debug,gatewatch_telegram=debug,teloxide=info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    let config = BotConfig::from_env()?;

    // Store initialization is the only fatal failure path.
    let store = AttendanceStore::open(&config.db_path).await?;
    info!(db = %config.db_path.display(), "store opened");

    let source: Arc<dyn EventSource> = match &config.source {
        SourceConfig::Feed { url } => {
            info!(url = %url, "using upstream feed source");
            Arc::new(FeedClient::new(url.clone())?)
        }
        SourceConfig::Device(device) => {
            info!(host = %device.host, "using direct device source");
            Arc::new(DeviceClient::new(device.clone())?)
        }
    };

    let bot = Bot::new(&config.token);
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));

    let mut pipeline = Pipeline::new(
        store.clone(),
        source,
        notifier,
        PollerConfig::new().with_poll_interval(config.poll_interval),
    );
    pipeline.start()?;

    let state = Arc::new(BotState::new(store, pipeline, config.admin_codes.clone()));
    GateBot::new(bot, state).run().await;

    Ok(())
}
