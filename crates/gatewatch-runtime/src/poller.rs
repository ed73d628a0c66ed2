//! The polling loop and its watermark.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, trace, warn};

use gatewatch_device::EventSource;
use gatewatch_store::AttendanceStore;

use crate::dispatcher::NotificationDispatcher;

/// Polls an event source and routes new events to the store and the
/// dispatcher.
///
/// The watermark is the highest `occurred_at` already processed. It only
/// ever advances (`max` with each event), so unordered fetch results
/// cannot regress it. It is not persisted; a restarted poller re-covers
/// the source's lookback window.
pub struct AccessPoller {
    /// Where events come from this instance.
    source: Arc<dyn EventSource>,
    /// Event log.
    store: AttendanceStore,
    /// Fan-out to subscribers.
    dispatcher: NotificationDispatcher,
    /// Shutdown signal receiver.
    shutdown: watch::Receiver<bool>,
    /// Time between fetch cycles.
    poll_interval: Duration,
    /// Highest event timestamp processed so far.
    watermark: Option<DateTime<Utc>>,
}

impl AccessPoller {
    /// Creates a new poller. The watermark starts empty, so the first
    /// fetch covers the source's full lookback window.
    pub fn new(
        source: Arc<dyn EventSource>,
        store: AttendanceStore,
        dispatcher: NotificationDispatcher,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
            shutdown,
            poll_interval,
            watermark: None,
        }
    }

    /// Current watermark.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// Run the polling loop until the shutdown signal.
    ///
    /// Cycles are strictly sequential: a tick is only consumed once the
    /// previous cycle has finished, so two fetches are never in flight.
    pub async fn run(&mut self) {
        let mut ticker = interval(self.poll_interval);

        debug!(
            poll_interval_ms = self.poll_interval.as_millis(),
            "starting access poller"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        debug!("poller received shutdown signal");
                        break;
                    }
                }
            }
        }

        debug!("access poller stopped");
    }

    /// One fetch cycle: fetch, dedup, persist, dispatch, advance.
    pub async fn poll_once(&mut self) {
        let batch = match self.source.fetch(self.watermark).await {
            Ok(batch) => batch,
            Err(e) => {
                // Transient: the watermark stays put and the next cycle retries.
                warn!(error = %e, "fetch failed; skipping cycle");
                return;
            }
        };

        if batch.is_empty() {
            trace!("no new events this cycle");
            return;
        }

        // Snapshot for dedup: events at or before this were processed in an
        // earlier cycle. Events inside this batch may share timestamps.
        let seen_up_to = self.watermark;
        let batch_len = batch.len();

        for event in batch {
            if seen_up_to.is_some_and(|w| event.occurred_at <= w) {
                trace!(
                    student_id = %event.student_id,
                    occurred_at = %event.occurred_at,
                    "already processed; skipping"
                );
                continue;
            }

            if let Err(e) = self.store.append_event(&event).await {
                // Leave the rest of the batch unprocessed; the watermark has
                // not passed these events, so the next cycle refetches them.
                error!(error = %e, "failed to persist event; abandoning batch");
                return;
            }

            if let Err(e) = self.dispatcher.dispatch(&event).await {
                warn!(error = %e, "dispatch failed for event");
            }

            self.watermark = Some(
                self.watermark
                    .map_or(event.occurred_at, |w| w.max(event.occurred_at)),
            );
        }

        trace!(batch_len, watermark = ?self.watermark, "cycle complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use gatewatch_device::{FetchError, Result as FetchResult};
    use gatewatch_models::{AccessEvent, Direction, Student, Subscriber};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::dispatcher::{Notifier, NotifyError};

    /// Returns pre-scripted batches, one per fetch.
    struct ScriptedSource {
        batches: Mutex<VecDeque<FetchResult<Vec<AccessEvent>>>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<FetchResult<Vec<AccessEvent>>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
            }
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn fetch(&self, _since: Option<DateTime<Utc>>) -> FetchResult<Vec<AccessEvent>> {
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Counts sends, never fails.
    #[derive(Default)]
    struct CountingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, chat_id: i64, text: &str) -> std::result::Result<(), NotifyError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, h, m, 0).unwrap()
    }

    fn event(h: u32, m: u32) -> AccessEvent {
        AccessEvent::new("20201234", Direction::Entry, at(h, m))
    }

    async fn seeded_store() -> AttendanceStore {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        store
            .upsert_student(&Student::new("20201234", "Aziz Karimov"))
            .await
            .unwrap();
        store
            .upsert_subscriber(&Subscriber::new(77, "Dilnoza", "+998", "20201234", "uz"))
            .await
            .unwrap();
        store
    }

    fn poller_with(
        source: Arc<dyn EventSource>,
        store: AttendanceStore,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> (AccessPoller, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let dispatcher = NotificationDispatcher::new(store.clone(), notifier);
        let poller = AccessPoller::new(source, store, dispatcher, interval, rx);
        (poller, tx)
    }

    #[tokio::test]
    async fn test_watermark_monotonic_across_unordered_batches() {
        let store = seeded_store().await;
        let source = Arc::new(ScriptedSource::new(vec![
            // Unordered within the batch.
            Ok(vec![event(9, 0), event(8, 0)]),
            // Entirely older than the watermark.
            Ok(vec![event(7, 30)]),
            Ok(vec![event(9, 30)]),
        ]));
        let notifier = Arc::new(CountingNotifier::default());
        let (mut poller, _tx) =
            poller_with(source, store, notifier, Duration::from_millis(10));

        poller.poll_once().await;
        assert_eq!(poller.watermark(), Some(at(9, 0)));

        poller.poll_once().await;
        // Older batch must not regress the watermark.
        assert_eq!(poller.watermark(), Some(at(9, 0)));

        poller.poll_once().await;
        assert_eq!(poller.watermark(), Some(at(9, 30)));
    }

    #[tokio::test]
    async fn test_dedup_skips_already_seen_events() {
        let store = seeded_store().await;
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![event(8, 15)]),
            // Source window overlaps: same event comes back.
            Ok(vec![event(8, 15)]),
        ]));
        let notifier = Arc::new(CountingNotifier::default());
        let (mut poller, _tx) =
            poller_with(source, store.clone(), notifier.clone(), Duration::from_millis(10));

        poller.poll_once().await;
        poller.poll_once().await;

        let stored = store.events_between(at(0, 0), at(23, 59)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_watermark() {
        let store = seeded_store().await;
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![event(8, 15)]),
            Err(FetchError::Transport("connection refused".into())),
        ]));
        let notifier = Arc::new(CountingNotifier::default());
        let (mut poller, _tx) =
            poller_with(source, store, notifier, Duration::from_millis(10));

        poller.poll_once().await;
        let before = poller.watermark();
        poller.poll_once().await;
        assert_eq!(poller.watermark(), before);
    }

    /// Fetch panics if a second call overlaps a running one; each fetch
    /// takes longer than the poll interval.
    struct OverlapGuardSource {
        in_flight: AtomicBool,
    }

    #[async_trait]
    impl EventSource for OverlapGuardSource {
        async fn fetch(&self, _since: Option<DateTime<Utc>>) -> FetchResult<Vec<AccessEvent>> {
            let was_in_flight = self.in_flight.swap(true, Ordering::SeqCst);
            assert!(!was_in_flight, "overlapping fetch detected");
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.store(false, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_single_flight_fetches() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        let source = Arc::new(OverlapGuardSource {
            in_flight: AtomicBool::new(false),
        });
        let notifier = Arc::new(CountingNotifier::default());
        // Interval far shorter than one fetch.
        let (mut poller, tx) =
            poller_with(source, store, notifier, Duration::from_millis(5));

        let handle = tokio::spawn(async move {
            poller.run().await;
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        // A panic inside fetch would surface as a join error here.
        let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(joined.expect("poller did not stop").is_ok());
    }

    #[tokio::test]
    async fn test_poller_stops_on_shutdown_signal() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        let source = Arc::new(ScriptedSource::new(vec![]));
        let notifier = Arc::new(CountingNotifier::default());
        let (mut poller, tx) =
            poller_with(source, store, notifier, Duration::from_millis(10));

        let handle = tokio::spawn(async move {
            poller.run().await;
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(500), handle).await;
        assert!(result.is_ok(), "poller should stop after shutdown signal");
    }
}
