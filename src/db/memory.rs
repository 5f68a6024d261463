use std::collections::BTreeMap;
use std::time::SystemTime;
use crate::db::state::{FunctionRecord, FunctionStore, StateChange};
use crate::error::Result;
use crate::sql::calculate_sql_hash;

/// In-process function state, for tests and for planning without a database
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, FunctionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_change(records: &mut BTreeMap<String, FunctionRecord>, change: &StateChange) {
    match change {
        StateChange::Upsert { function_name, app_label, normalized_sql } => {
            records.insert(function_name.clone(), FunctionRecord {
                function_name: function_name.clone(),
                sql_definition: normalized_sql.clone(),
                app_label: app_label.clone(),
                sql_hash: calculate_sql_hash(normalized_sql),
                updated_at: SystemTime::now(),
            });
        }
        StateChange::Delete { function_name } => {
            records.remove(function_name);
        }
    }
}

impl FunctionStore for MemoryStore {
    async fn get(&self, function_name: &str) -> Result<Option<FunctionRecord>> {
        Ok(self.records.get(function_name).cloned())
    }

    async fn upsert(&mut self, function_name: &str, app_label: &str, normalized_sql: &str) -> Result<()> {
        apply_change(&mut self.records, &StateChange::upsert(function_name, app_label, normalized_sql));
        Ok(())
    }

    async fn delete(&mut self, function_name: &str) -> Result<()> {
        self.records.remove(function_name);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<FunctionRecord>> {
        Ok(self.records.values().cloned().collect())
    }

    async fn apply(&mut self, changes: &[StateChange]) -> Result<()> {
        for change in changes {
            apply_change(&mut self.records, change);
        }
        Ok(())
    }
}
