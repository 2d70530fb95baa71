//! Storage interface
//!
//! The store, payment ledger and account registry only depend on this trait,
//! so they run unchanged against SQLite in production and against
//! [`MemoryStorage`] in tests.
//!
//! Two kinds of data live behind it:
//! - documents: whole JSON values replaced on every write (`get`/`put`)
//! - logs: append-only JSON records read back in append order (`append`/`scan`)

use async_trait::async_trait;
use patak_common::Result;
use serde_json::Value;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Keys used by the metering service
pub mod keys {
    /// Document: short-lived reading log, swept by the broadcaster
    pub const LIVE_READINGS: &str = "live_readings";
    /// Document: raw house key -> latest summary
    pub const SUMMARY: &str = "summary";
    /// Document: all payments in submission order
    pub const PAYMENTS: &str = "payments";
    /// Document: house key -> account
    pub const ACCOUNTS: &str = "accounts";
    /// Log: durable reading history used for billing, never evicted.
    /// One log per house, see [`history_log`].
    pub const HISTORY: &str = "history";

    /// Name of the durable history log for one house
    pub fn history_log(house: &str) -> String {
        format!("{}:{}", HISTORY, house.trim().to_lowercase())
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a document; `None` when it has never been written
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace a document
    async fn put(&self, key: &str, value: &Value) -> Result<()>;

    /// Append one record to a log
    async fn append(&self, log: &str, record: &Value) -> Result<()>;

    /// All records of a log in append order
    async fn scan(&self, log: &str) -> Result<Vec<Value>>;
}
