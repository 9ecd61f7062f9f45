//! Embedded SQLite-backed stores for trade records, key-value pairs and
//! append-lists. Writes are staged in memory and committed in batches by a
//! background flusher; reads always observe the last committed transaction.

pub mod db;
pub mod engine;
pub mod error;
pub mod kv;
pub mod list;
pub mod queue;
pub mod tasks;
pub mod timer;
pub mod trades;

pub use error::StoreError;
pub use kv::{IntKeyBlobStore, KvStore, StringKeyValueStore};
pub use list::ListStore;
pub use trades::{RequestConfig, TradeStore};
