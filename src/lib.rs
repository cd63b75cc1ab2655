//! # Request Logger
//!
//! A minimal HTTP request logger. Requests are captured as records with a
//! client IP, a timestamp and a small payload, kept in named collections
//! and checkpointed to a JSON snapshot after every mutation.
//!
//! ## Core Concepts
//!
//! - **Records**: One logged event with a store-wide unique id
//! - **Collections**: Named, insertion-ordered lists of records
//! - **Snapshot**: The JSON file holding every collection, rewritten atomically
//! - **Server**: axum routes feeding the store and rendering a dashboard
//!
//! ## Example
//!
//! ```ignore
//! use reqlog::{RecordInput, RecordStore, StoreConfig, PAGE};
//!
//! let store = RecordStore::load(StoreConfig::at("./data/logs.json"));
//!
//! let record = store.append(PAGE, RecordInput::new("203.0.113.5")
//!     .with_field("url", "https://example.org"));
//!
//! store.remove(PAGE, record.id);
//! ```

pub mod error;
pub mod records;
pub mod server;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use records::{Collection, DecodedSnapshot};
pub use server::{build_router, AppState, ClientIp, LoggerServer, ServerConfig, ServerError};
pub use store::{RecordStore, StoreConfig};
pub use types::*;
