//! In-memory, mutex-guarded reference implementation of [`RecordsStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{InstallError, Result};
use crate::ports::{ModelConfigRecord, ModelRecordChanges, RecordsStore};

/// Keeps every model configuration record in a `HashMap` guarded by a single
/// mutex. Fine for the demo CLI and for tests; a real deployment backs this
/// with a database so records survive a restart.
#[derive(Default)]
pub struct InMemoryRecordsStore {
    records: Mutex<HashMap<String, ModelConfigRecord>>,
}

impl InMemoryRecordsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordsStore for InMemoryRecordsStore {
    fn add(&self, record: ModelConfigRecord) -> Result<()> {
        self.records.lock().unwrap().insert(record.key.clone(), record);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<ModelConfigRecord> {
        self.records
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| InstallError::UnknownModel(key.to_string()))
    }

    fn update(&self, key: &str, changes: ModelRecordChanges) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(key)
            .ok_or_else(|| InstallError::UnknownModel(key.to_string()))?;
        if let Some(path) = changes.path {
            record.path = path;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.records.lock().unwrap().remove(key);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<ModelConfigRecord>> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}
