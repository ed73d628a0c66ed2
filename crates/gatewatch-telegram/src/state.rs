//! Shared state across bot handlers.

use std::collections::HashSet;

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use gatewatch_runtime::Pipeline;
use gatewatch_store::AttendanceStore;

/// State shared by all command handlers.
///
/// Owns the pipeline service object; handlers reach it through the mutex
/// rather than through any ambient global.
pub struct BotState {
    store: AttendanceStore,
    pipeline: Mutex<Pipeline>,
    /// Valid admin access codes. Empty disables the admin console.
    admin_codes: Vec<String>,
    /// Chats that have presented a valid code.
    admins: RwLock<HashSet<i64>>,
}

impl BotState {
    /// Creates the shared state.
    pub fn new(store: AttendanceStore, pipeline: Pipeline, admin_codes: Vec<String>) -> Self {
        Self {
            store,
            pipeline: Mutex::new(pipeline),
            admin_codes,
            admins: RwLock::new(HashSet::new()),
        }
    }

    /// A handle to the attendance store.
    pub fn store(&self) -> AttendanceStore {
        self.store.clone()
    }

    /// The pipeline, behind its handler-facing lock.
    pub fn pipeline(&self) -> &Mutex<Pipeline> {
        &self.pipeline
    }

    /// Validates an admin code and, on success, remembers the chat.
    pub async fn authorize(&self, chat_id: i64, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() || !self.admin_codes.iter().any(|c| c == code) {
            return false;
        }
        let mut admins = self.admins.write().await;
        if admins.insert(chat_id) {
            info!(chat_id, "chat authorized for admin commands");
        }
        true
    }

    /// Whether the chat has been authorized.
    pub async fn is_admin(&self, chat_id: i64) -> bool {
        self.admins.read().await.contains(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use gatewatch_device::{EventSource, Result as FetchResult};
    use gatewatch_models::AccessEvent;
    use gatewatch_runtime::{Notifier, NotifyError, PollerConfig};

    struct EmptySource;

    #[async_trait]
    impl EventSource for EmptySource {
        async fn fetch(&self, _since: Option<DateTime<Utc>>) -> FetchResult<Vec<AccessEvent>> {
            Ok(Vec::new())
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn send(&self, _chat_id: i64, _text: &str) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    async fn test_state(codes: Vec<String>) -> BotState {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        let pipeline = Pipeline::new(
            store.clone(),
            Arc::new(EmptySource),
            Arc::new(NullNotifier),
            PollerConfig::new().with_poll_interval(Duration::from_millis(10)),
        );
        BotState::new(store, pipeline, codes)
    }

    #[tokio::test]
    async fn test_authorize_with_valid_code() {
        let state = test_state(vec!["sesame".into()]).await;
        assert!(!state.is_admin(7).await);

        assert!(state.authorize(7, "sesame").await);
        assert!(state.is_admin(7).await);
        // Other chats stay unauthorized.
        assert!(!state.is_admin(8).await);
    }

    #[tokio::test]
    async fn test_authorize_rejects_bad_code() {
        let state = test_state(vec!["sesame".into()]).await;
        assert!(!state.authorize(7, "wrong").await);
        assert!(!state.authorize(7, "").await);
        assert!(!state.is_admin(7).await);
    }

    #[tokio::test]
    async fn test_no_codes_means_no_admins() {
        let state = test_state(Vec::new()).await;
        assert!(!state.authorize(7, "anything").await);
    }
}
