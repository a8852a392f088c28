//! In-memory store for tests.

use super::FlyerStore;
use crate::error::Result;
use crate::models::FlyerRecord;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<FlyerRecord>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, id: &str) -> Option<FlyerRecord> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    /// Rewrite a record's creation time.
    pub fn backdate(&self, id: &str, created_at: DateTime<Utc>) {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| r.id == id) {
            row.created_at = created_at;
        }
    }
}

impl FlyerStore for MemoryStore {
    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|r| r.id == id))
    }

    async fn insert(&self, id: &str, source: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        rows.push(FlyerRecord {
            id: id.to_string(),
            source: source.to_string(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<FlyerRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.created_at >= since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_is_noop_for_existing_id() {
        let store = MemoryStore::default();
        assert!(store.insert("abc", "Delta Supermercados").await.unwrap());
        assert!(!store.insert("abc", "Roldão Atacadista").await.unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("abc").unwrap().source, "Delta Supermercados");
    }

    #[tokio::test]
    async fn test_retention_sweep_keeps_recent_rows() {
        let store = MemoryStore::default();
        store.insert("old", "Delta Supermercados").await.unwrap();
        store.insert("new", "Delta Supermercados").await.unwrap();
        store.backdate("old", Utc::now() - Duration::days(8));

        let cutoff = Utc::now() - Duration::days(7);
        assert_eq!(store.delete_older_than(cutoff).await.unwrap(), 1);
        assert!(!store.contains("old").await.unwrap());
        assert!(store.contains("new").await.unwrap());

        let recent = store.records_since(cutoff).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");
    }
}
