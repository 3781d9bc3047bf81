//! In-memory message store.
//!
//! Not persistent across restarts.

use super::record::ChatRecord;
use super::MessageStore;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    records: RwLock<Vec<ChatRecord>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl MessageStore for MemoryMessageStore {
    fn insert(&self, record: &ChatRecord) -> crate::Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    fn all(&self) -> crate::Result<Vec<ChatRecord>> {
        Ok(self.records.read().clone())
    }

    fn remove(&self, session_id: &str) -> crate::Result<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| record.session_id != session_id);
        Ok(before - records.len())
    }
}
