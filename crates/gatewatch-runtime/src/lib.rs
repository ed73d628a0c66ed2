//! Polling pipeline for Gatewatch.
//!
//! This crate wires the ingestion path together:
//! - `AccessPoller` - repeatedly fetches from an [`EventSource`], advances
//!   a monotonic watermark, deduplicates, and persists new events
//! - `NotificationDispatcher` - fans each new event out to subscribed
//!   parents through a [`Notifier`]
//! - `Pipeline` - service object owning the poller task and its
//!   cancellation token
//!
//! # Example
//!
//! ```ignore
//! use gatewatch_runtime::{Pipeline, PollerConfig};
//! use gatewatch_store::AttendanceStore;
//! use std::sync::Arc;
//!
//! # async fn run(source: Arc<dyn gatewatch_device::EventSource>,
//! #              notifier: Arc<dyn gatewatch_runtime::Notifier>) {
//! let store = AttendanceStore::open("attendance.db").await.unwrap();
//! let mut pipeline = Pipeline::new(store, source, notifier, PollerConfig::default());
//! pipeline.start().unwrap();
//! // ...
//! pipeline.shutdown().await.unwrap();
//! # }
//! ```
//!
//! The watermark lives only in memory: a restart reprocesses the source's
//! lookback window and may re-notify for events inside it.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod poller;

pub use config::PollerConfig;
pub use dispatcher::{NotificationDispatcher, Notifier, NotifyError};
pub use error::{Result, RuntimeError};
pub use pipeline::Pipeline;
pub use poller::AccessPoller;
