//! Event sources for Gatewatch.
//!
//! Two implementations of [`EventSource`] are provided:
//! - [`DeviceClient`] pulls the access-control log straight from the gate
//!   device over its local ISAPI endpoint, falling back to the device's
//!   HTTPS port when the local transport fails.
//! - [`FeedClient`] consumes a relayed upstream feed keyed by a `since`
//!   cursor.
//!
//! Both return `Err` when no transport could be reached, so callers can
//! tell "no new events" apart from "fetch failed".

pub mod device;
pub mod error;
pub mod feed;
pub mod source;

pub use device::{DeviceClient, DeviceConfig};
pub use error::{FetchError, Result};
pub use feed::FeedClient;
pub use source::EventSource;
