//! Fan-out of new events to subscribed parents.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use gatewatch_models::{AccessEvent, Student};
use gatewatch_store::AttendanceStore;

/// A failed delivery to one recipient.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct NotifyError(pub String);

/// The messaging transport the dispatcher emits through.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one message to one chat.
    async fn send(&self, chat_id: i64, text: &str) -> std::result::Result<(), NotifyError>;
}

/// Resolves subscribers for an event and sends each of them a message.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: AttendanceStore,
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over the given store and transport.
    pub fn new(store: AttendanceStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Dispatches one event to every interested subscriber.
    ///
    /// Delivery is best-effort and at-most-once per subscriber per call:
    /// a failure for one recipient is logged and does not stop the rest.
    /// Returns the number of successful sends.
    pub async fn dispatch(&self, event: &AccessEvent) -> gatewatch_store::Result<usize> {
        let student = match self.store.student(&event.student_id).await? {
            Some(student) => student,
            None => {
                debug!(student_id = %event.student_id, "event for student not in roster; no recipients");
                return Ok(0);
            }
        };

        let subscribers = self.store.subscribers_for(&event.student_id).await?;
        let text = format_notification(&student, event);

        let mut delivered = 0;
        for sub in subscribers {
            if !sub.prefs.allows(event.direction) {
                debug!(
                    chat_id = sub.chat_id,
                    direction = %event.direction,
                    "subscriber preference disabled; skipping"
                );
                continue;
            }
            match self.notifier.send(sub.chat_id, &text).await {
                Ok(()) => {
                    delivered += 1;
                    info!(
                        chat_id = sub.chat_id,
                        student_id = %event.student_id,
                        direction = %event.direction,
                        "notification sent"
                    );
                }
                Err(e) => {
                    warn!(chat_id = sub.chat_id, error = %e, "notification delivery failed");
                }
            }
        }
        Ok(delivered)
    }
}

/// Formats the parent-facing notification text.
fn format_notification(student: &Student, event: &AccessEvent) -> String {
    format!(
        "\u{1F393} {} ({})\n\u{23F0} {}\n\u{27A1} {}",
        student.name,
        student.student_id,
        event.occurred_at.format("%H:%M:%S"),
        event.direction.display_label(),
    )
}
