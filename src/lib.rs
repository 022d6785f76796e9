//! Offline-capable client for church content: devotionals, sermons,
//! announcements, categories and analytics.
//!
//! Reads are cached and served from the cache while offline; writes made
//! while offline are queued and replayed once connectivity returns.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod logging;
pub mod sync;

pub use api::{ApiError, ApiResult};
pub use client::PulpitClient;
pub use config::Config;
pub use connectivity::ConnectivityState;
