//! # Card Registry Collector
//!
//! The analytics side of the card registry.
//!
//! | Module     | Purpose                                                         |
//! |------------|-----------------------------------------------------------------|
//! | [`sink`]   | `HttpSink`, a registry `NotificationSink` that POSTs to a collector |
//! | [`api`]    | Axum routes: ingest, card / account history, health             |
//! | [`db`]     | SQLite pool, migrations and queries                             |
//! | [`events`] | Wire envelope and the flattened row stored per notification     |
//! | [`config`] | Environment-driven settings for the service and the sink        |

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod sink;

pub use errors::{CollectorError, Result};
pub use sink::HttpSink;
