//! In-memory storage for tests and ephemeral runs

use async_trait::async_trait;
use patak_common::Result;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::Storage;

#[derive(Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<String, Value>>,
    logs: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.documents.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        self.documents
            .lock()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn append(&self, log: &str, record: &Value) -> Result<()> {
        self.logs
            .lock()
            .await
            .entry(log.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn scan(&self, log: &str) -> Result<Vec<Value>> {
        Ok(self.logs.lock().await.get(log).cloned().unwrap_or_default())
    }
}
