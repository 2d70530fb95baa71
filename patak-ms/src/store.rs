//! Reading Store
//!
//! Holds the live reading log, the latest-value-per-house index and the house
//! accounts in memory, writing every change through to [`Storage`] before the
//! mutating call returns. The durable reading history is append-only and is
//! read straight from storage on demand.
//!
//! All mutations take the write half of one lock, which gives the single
//! writer the rest of the service assumes. Readers get cloned snapshots.

use chrono::{DateTime, Utc};
use patak_common::models::{Account, HouseSummary, Reading};
use patak_common::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::storage::{keys, Storage};

#[derive(Default)]
struct StoreState {
    live: Vec<Reading>,
    /// Keyed by the house key as stored; older data may hold mixed-case keys
    summary: BTreeMap<String, HouseSummary>,
    accounts: BTreeMap<String, Account>,
}

pub struct MeterStore {
    storage: Arc<dyn Storage>,
    state: RwLock<StoreState>,
}

impl MeterStore {
    /// Load persisted state
    ///
    /// Malformed entries are skipped with a warning instead of failing
    /// startup.
    pub async fn load(storage: Arc<dyn Storage>) -> Result<Self> {
        let live: Vec<Reading> = decode_list(storage.get(keys::LIVE_READINGS).await?, keys::LIVE_READINGS);
        let summary: BTreeMap<String, HouseSummary> =
            decode_map(storage.get(keys::SUMMARY).await?, keys::SUMMARY);
        let accounts: BTreeMap<String, Account> =
            decode_map(storage.get(keys::ACCOUNTS).await?, keys::ACCOUNTS);

        info!(
            "Reading store loaded: {} live readings, {} houses, {} accounts",
            live.len(),
            summary.len(),
            accounts.len()
        );

        Ok(Self {
            storage,
            state: RwLock::new(StoreState {
                live,
                summary,
                accounts,
            }),
        })
    }

    /// Shared handle to the backing storage
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    /// Record an accepted reading
    ///
    /// Appends to the durable history and the live log, replaces the house
    /// summary and opens an account for a house seen for the first time. Each
    /// in-memory document is replaced as soon as its own write succeeds, so
    /// memory never lags behind storage.
    pub async fn record(&self, reading: &Reading) -> Result<()> {
        let mut state = self.state.write().await;

        let mut live = state.live.clone();
        live.push(reading.clone());

        let mut summary = state.summary.clone();
        summary.entry(reading.house.clone()).or_default().apply(reading);

        let new_account = if state.accounts.contains_key(&reading.house) {
            None
        } else {
            Some(Account {
                house: reading.house.clone(),
                created_at: reading
                    .received_at
                    .clone()
                    .unwrap_or_else(|| reading.timestamp.clone()),
            })
        };

        self.storage
            .append(&keys::history_log(&reading.house), &serde_json::to_value(reading)?)
            .await?;
        self.storage
            .put(keys::LIVE_READINGS, &serde_json::to_value(&live)?)
            .await?;
        state.live = live;
        self.storage
            .put(keys::SUMMARY, &serde_json::to_value(&summary)?)
            .await?;
        state.summary = summary;

        if let Some(account) = new_account {
            let mut accounts = state.accounts.clone();
            info!("Opened account for house {} at {}", account.house, account.created_at);
            accounts.insert(account.house.clone(), account);
            self.storage
                .put(keys::ACCOUNTS, &serde_json::to_value(&accounts)?)
                .await?;
            state.accounts = accounts;
        }

        Ok(())
    }

    /// Copy of the latest-value index, raw keys included
    pub async fn summary_snapshot(&self) -> BTreeMap<String, HouseSummary> {
        self.state.read().await.summary.clone()
    }

    /// Latest summary stored under the normalized house key
    pub async fn latest_for(&self, house: &str) -> Option<HouseSummary> {
        self.state.read().await.summary.get(house).cloned()
    }

    /// Live-log readings for one house, oldest first
    pub async fn live_readings_for(&self, house: &str) -> Vec<Reading> {
        self.state
            .read()
            .await
            .live
            .iter()
            .filter(|r| same_house(&r.house, house))
            .cloned()
            .collect()
    }

    pub async fn live_len(&self) -> usize {
        self.state.read().await.live.len()
    }

    /// Durable history for one house in ingestion order
    pub async fn history_for(&self, house: &str) -> Result<Vec<Reading>> {
        let records = self.storage.scan(&keys::history_log(house)).await?;
        let mut readings = Vec::new();
        for record in records {
            match serde_json::from_value::<Reading>(record) {
                Ok(r) => readings.push(r),
                Err(e) => debug!("Skipping malformed history record: {}", e),
            }
        }
        Ok(readings)
    }

    pub async fn account_for(&self, house: &str) -> Option<Account> {
        self.state.read().await.accounts.get(house).cloned()
    }

    /// Drop live readings whose effective timestamp is at or before `cutoff`
    ///
    /// Readings without a parseable timestamp are dropped as well. The
    /// durable history is not touched. Returns the number of readings removed;
    /// storage is only written when something was removed.
    pub async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.write().await;

        let kept: Vec<Reading> = state
            .live
            .iter()
            .filter(|r| r.effective_timestamp().is_some_and(|ts| ts > cutoff))
            .cloned()
            .collect();

        let removed = state.live.len() - kept.len();
        if removed > 0 {
            self.storage
                .put(keys::LIVE_READINGS, &serde_json::to_value(&kept)?)
                .await?;
            state.live = kept;
        }
        Ok(removed)
    }
}

fn same_house(stored: &str, house: &str) -> bool {
    stored.to_lowercase() == house.to_lowercase()
}

/// Decode a stored list one entry at a time, skipping malformed entries
pub(crate) fn decode_list<T: DeserializeOwned>(value: Option<Value>, key: &str) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Skipping malformed entry in '{}': {}", key, e);
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("Expected a list under '{}', found {}", key, other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn decode_map<T: DeserializeOwned>(value: Option<Value>, key: &str) -> BTreeMap<String, T> {
    match value {
        Some(Value::Object(entries)) => entries
            .into_iter()
            .filter_map(|(k, v)| match serde_json::from_value(v) {
                Ok(v) => Some((k, v)),
                Err(e) => {
                    warn!("Skipping malformed entry '{}' in '{}': {}", k, key, e);
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("Expected an object under '{}', found {}", key, other);
            BTreeMap::new()
        }
        None => BTreeMap::new(),
    }
}
