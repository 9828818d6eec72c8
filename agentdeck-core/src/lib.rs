//! # agentdeck-core
//!
//! Real-time event correlation and sync engine for a multi-agent dashboard.
//!
//! This library provides:
//! - A supervised live connection to the dashboard's event stream, with
//!   heartbeat replies and exponential-backoff reconnection
//! - Bounded, deduplicating stores for activities, tool-events and thoughts
//! - Agent liveness derived from tool-event recency
//! - Merging of REST history with live data, correlation of tool calls and
//!   thoughts to chat messages, and per-message step timelines
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows leaves-first:
//! - **Connection:** stream frames are decoded into typed envelopes
//! - **Stores:** each envelope lands in its store and in the activity feed
//! - **History:** REST pages are merged with store contents by id
//! - **Correlation:** merged events are attributed to messages by time window
//! - **Timeline:** attributed events become interleaved thought/tool steps
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentdeck_core::connection::{self, WsConnector};
//! use agentdeck_core::{Config, Stores};
//!
//! # async fn run() -> agentdeck_core::Result<()> {
//! let config = Config::load()?;
//! let stores = Stores::shared(&config.stores);
//!
//! let connector = WsConnector::new(config.server.stream_url());
//! let handle = connection::spawn(connector, stores.clone(), &config.connection);
//! handle.connect();
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::ApiClient;
pub use config::Config;
pub use connection::{ConnectionHandle, ConnectionStatus};
pub use correlate::{correlate, Correlation};
pub use error::{Error, Result};
pub use history::{merge_thoughts, MessageFeed, MessageHistory};
pub use liveness::LivenessOracle;
pub use store::{SharedStores, Stores};
pub use stream::Signal;
pub use timeline::{build_timeline, TimelineStep, TimelineSummary};
pub use types::*;

// Public modules
pub mod client;
pub mod config;
pub mod connection;
pub mod correlate;
pub mod error;
pub mod format;
pub mod history;
pub mod liveness;
pub mod logging;
pub mod store;
pub mod stream;
pub mod timeline;
pub mod types;
