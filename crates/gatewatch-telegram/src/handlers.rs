//! Command handlers for the Telegram bot.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use gatewatch_models::{
    summarize_day, AccessEvent, DaySummary, PrefKind, ProfileField, Student, StudentId, Subscriber,
};
use gatewatch_runtime::RuntimeError;
use gatewatch_store::StoreError;

use crate::state::BotState;

/// How far back `/history` looks.
const HISTORY_DAYS: i64 = 7;

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "Subscribe to a student's gate events: /register <student_id> <your name>")]
    Register(String),

    #[command(description = "Update your profile: /set <name|phone|student|language> <value>")]
    Set(String),

    #[command(description = "Flip a notification flag: /toggle <entry|exit|late>")]
    Toggle(String),

    #[command(description = "Authorize this chat for admin commands: /admin <code>")]
    Admin(String),

    #[command(description = "Start the polling pipeline (admin)")]
    StartPoll,

    #[command(description = "Stop the polling pipeline (admin)")]
    StopPoll,

    #[command(description = "Today's attendance summary (admin)")]
    Today,

    #[command(description = "A student's recent events: /history <student_id> (admin)")]
    History(String),
}

/// Dispatch a parsed command to its handler.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    info!(chat_id, command = ?cmd, "handling command");

    match cmd {
        Command::Start => handle_start(bot, msg).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Register(args) => handle_register(bot, msg, state, args).await,
        Command::Set(args) => handle_set(bot, msg, state, args).await,
        Command::Toggle(args) => handle_toggle(bot, msg, state, args).await,
        Command::Admin(code) => handle_admin(bot, msg, state, code).await,
        Command::StartPoll => handle_start_poll(bot, msg, state).await,
        Command::StopPoll => handle_stop_poll(bot, msg, state).await,
        Command::Today => handle_today(bot, msg, state).await,
        Command::History(args) => handle_history(bot, msg, state, args).await,
    }
}

async fn handle_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    let welcome = "Welcome to Gatewatch! \u{1F393}\n\n\
        I send you a message whenever your child passes the school gate.\n\n\
        Getting started:\n\
        1. /register <student_id> <your name>\n\
        2. /set phone <number> (optional)\n\
        3. /toggle entry or /toggle exit to mute a direction\n\n\
        Type /help for all commands.";
    bot.send_message(msg.chat.id, welcome).await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn handle_register(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    args: String,
) -> ResponseResult<()> {
    let Some((student_id, name)) = parse_register(&args) else {
        bot.send_message(msg.chat.id, "Usage: /register <student_id> <your name>")
            .await?;
        return Ok(());
    };

    let store = state.store();
    match store.student(&student_id).await {
        Ok(Some(student)) => {
            let sub = Subscriber::new(msg.chat.id.0, name, "", student_id, "en");
            if let Err(e) = store.upsert_subscriber(&sub).await {
                warn!(chat_id = msg.chat.id.0, error = %e, "failed to save subscriber");
                bot.send_message(msg.chat.id, "Internal error, please try again later.")
                    .await?;
                return Ok(());
            }
            bot.send_message(
                msg.chat.id,
                format!(
                    "You are now subscribed to gate events for {}.\n\
                     Use /set phone <number> to add a contact number.",
                    student.name
                ),
            )
            .await?;
        }
        Ok(None) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Student {} is not on the roster. Check the ID with the school office.",
                    student_id
                ),
            )
            .await?;
        }
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, error = %e, "roster lookup failed");
            bot.send_message(msg.chat.id, "Internal error, please try again later.")
                .await?;
        }
    }
    Ok(())
}

async fn handle_set(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    args: String,
) -> ResponseResult<()> {
    let Some((field, value)) = parse_set(&args) else {
        bot.send_message(
            msg.chat.id,
            "Usage: /set <name|phone|student|language> <value>",
        )
        .await?;
        return Ok(());
    };

    match state.store().set_profile_field(msg.chat.id.0, field, &value).await {
        Ok(()) => {
            bot.send_message(msg.chat.id, format!("Updated {}.", field.column()))
                .await?;
        }
        Err(StoreError::SubscriberNotFound(_)) => {
            bot.send_message(msg.chat.id, "You are not registered yet. Use /register first.")
                .await?;
        }
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, error = %e, "profile update failed");
            bot.send_message(msg.chat.id, "Internal error, please try again later.")
                .await?;
        }
    }
    Ok(())
}

async fn handle_toggle(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    args: String,
) -> ResponseResult<()> {
    let Some(pref) = PrefKind::parse(&args) else {
        bot.send_message(msg.chat.id, "Usage: /toggle <entry|exit|late>")
            .await?;
        return Ok(());
    };

    match state.store().toggle_pref(msg.chat.id.0, pref).await {
        Ok(enabled) => {
            let status = if enabled { "on" } else { "off" };
            bot.send_message(
                msg.chat.id,
                format!("{} notifications are now {}.", pref.column(), status),
            )
            .await?;
        }
        Err(StoreError::SubscriberNotFound(_)) => {
            bot.send_message(msg.chat.id, "You are not registered yet. Use /register first.")
                .await?;
        }
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, error = %e, "preference toggle failed");
            bot.send_message(msg.chat.id, "Internal error, please try again later.")
                .await?;
        }
    }
    Ok(())
}

async fn handle_admin(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    code: String,
) -> ResponseResult<()> {
    if state.authorize(msg.chat.id.0, &code).await {
        bot.send_message(msg.chat.id, "Admin commands unlocked for this chat.")
            .await?;
    } else {
        bot.send_message(msg.chat.id, "Invalid admin code.").await?;
    }
    Ok(())
}

/// Replies with a refusal and returns false for unauthorized chats.
async fn require_admin(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<bool> {
    if state.is_admin(msg.chat.id.0).await {
        return Ok(true);
    }
    bot.send_message(msg.chat.id, "Admin only. Use /admin <code> first.")
        .await?;
    Ok(false)
}

async fn handle_start_poll(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let mut pipeline = state.pipeline().lock().await;
    let reply = match pipeline.start() {
        Ok(()) => "Polling started.",
        Err(RuntimeError::AlreadyStarted) => "Polling is already running.",
        Err(e) => {
            warn!(error = %e, "pipeline start failed");
            "Could not start polling."
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_stop_poll(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let mut pipeline = state.pipeline().lock().await;
    let reply = match pipeline.shutdown().await {
        Ok(()) => "Polling stopped.",
        Err(e) => {
            warn!(error = %e, "pipeline shutdown failed");
            "Could not stop polling cleanly."
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_today(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let store = state.store();
    let (start, end) = day_bounds(Utc::now());

    let students = match store.students().await {
        Ok(students) => students,
        Err(e) => {
            warn!(error = %e, "roster query failed");
            bot.send_message(msg.chat.id, "Internal error, please try again later.")
                .await?;
            return Ok(());
        }
    };

    let mut rows = Vec::with_capacity(students.len());
    for student in students {
        match store.events_for_student(&student.student_id, start, end).await {
            Ok(events) => {
                let summary = summarize_day(&events);
                rows.push((student, summary));
            }
            Err(e) => {
                warn!(student_id = %student.student_id, error = %e, "event query failed");
                bot.send_message(msg.chat.id, "Internal error, please try again later.")
                    .await?;
                return Ok(());
            }
        }
    }

    bot.send_message(msg.chat.id, render_today(&rows)).await?;
    Ok(())
}

async fn handle_history(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    args: String,
) -> ResponseResult<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let id = args.trim();
    if id.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /history <student_id>")
            .await?;
        return Ok(());
    }
    let student_id = StudentId::from_string(id.to_owned());

    let store = state.store();
    let end = Utc::now();
    let start = end - ChronoDuration::days(HISTORY_DAYS);

    let student = match store.student(&student_id).await {
        Ok(Some(student)) => student,
        Ok(None) => {
            bot.send_message(msg.chat.id, format!("Student {} is not on the roster.", student_id))
                .await?;
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "roster lookup failed");
            bot.send_message(msg.chat.id, "Internal error, please try again later.")
                .await?;
            return Ok(());
        }
    };

    match store.events_for_student(&student_id, start, end).await {
        Ok(events) => {
            bot.send_message(msg.chat.id, render_history(&student, &events))
                .await?;
        }
        Err(e) => {
            warn!(error = %e, "event query failed");
            bot.send_message(msg.chat.id, "Internal error, please try again later.")
                .await?;
        }
    }
    Ok(())
}

/// UTC midnight-to-now bounds for "today".
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, now)
}

/// Splits `/register` arguments into student ID and subscriber name.
fn parse_register(args: &str) -> Option<(StudentId, String)> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let id = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().map(str::trim).filter(|s| !s.is_empty())?;
    Some((StudentId::from_string(id.to_owned()), name.to_owned()))
}

/// Splits `/set` arguments into a profile field and its new value.
fn parse_set(args: &str) -> Option<(ProfileField, String)> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let field = match parts.next()?.to_ascii_lowercase().as_str() {
        "name" => ProfileField::Name,
        "phone" => ProfileField::Phone,
        "student" => ProfileField::StudentId,
        "language" => ProfileField::Language,
        _ => return None,
    };
    let value = parts.next().map(str::trim).filter(|s| !s.is_empty())?;
    Some((field, value.to_owned()))
}

fn render_today(rows: &[(Student, DaySummary)]) -> String {
    if rows.is_empty() {
        return "No students on the roster.".to_owned();
    }
    let mut out = String::from("Today's attendance:\n");
    for (student, summary) in rows {
        let line = match (summary.first_entry, summary.last_exit) {
            (Some(first), Some(last)) => format!(
                "{} ({}): in {}, out {}",
                student.name,
                student.student_id,
                first.format("%H:%M:%S"),
                last.format("%H:%M:%S"),
            ),
            (Some(first), None) => format!(
                "{} ({}): in {}, still at school",
                student.name,
                student.student_id,
                first.format("%H:%M:%S"),
            ),
            (None, Some(last)) => format!(
                "{} ({}): out {}, no entry recorded",
                student.name,
                student.student_id,
                last.format("%H:%M:%S"),
            ),
            (None, None) => format!("{} ({}): no events", student.name, student.student_id),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn render_history(student: &Student, events: &[AccessEvent]) -> String {
    if events.is_empty() {
        return format!("No events for {} in the last {} days.", student.name, HISTORY_DAYS);
    }
    let mut out = format!("Events for {} ({}):\n", student.name, student.student_id);
    for event in events {
        out.push_str(&format!(
            "{} {}\n",
            event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            event.direction.display_label(),
        ));
    }
    out
}
