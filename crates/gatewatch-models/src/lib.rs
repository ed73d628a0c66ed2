//! Core data models for Gatewatch.
//!
//! This crate provides the fundamental data types used throughout the
//! Gatewatch system: access events, the student roster, and notification
//! subscribers with their preference flags.

pub mod attendance;
pub mod event;
pub mod subscriber;

// Re-export main types
pub use attendance::{summarize_day, DaySummary};
pub use event::{AccessEvent, Direction, StudentId};
pub use subscriber::{NotificationPrefs, PrefKind, ProfileField, Student, Subscriber};
