use std::collections::HashSet;
use tracing::{debug, info};
use crate::db::state::{FunctionStore, StateChange};
use crate::error::Result;
use crate::registry::Registry;
use crate::sql::normalize_sql;

/// Summary of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub upserted: Vec<String>,
    pub removed: Vec<String>,
}

/// Make the store mirror the registry: every registered function is
/// upserted with its normalized SQL, every stored function that is no
/// longer registered is deleted. The store applies the whole batch or
/// nothing.
pub async fn sync_state<S: FunctionStore>(
    registry: &Registry,
    store: &mut S,
    default_app: Option<&str>,
) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    let mut changes = Vec::new();
    let mut registered = HashSet::new();

    for definition in registry.all() {
        let function_name = definition.function_name()?;
        let app_label = definition.resolve_app_label(default_app)?;

        changes.push(StateChange::upsert(&function_name, app_label, normalize_sql(&definition.sql)));
        registered.insert(function_name.clone());
        result.upserted.push(function_name);
    }

    for record in store.all().await? {
        if !registered.contains(&record.function_name) {
            debug!(function = %record.function_name, "Removing state for deleted function");
            changes.push(StateChange::delete(&record.function_name));
            result.removed.push(record.function_name);
        }
    }

    store.apply(&changes).await?;

    info!(
        upserted = result.upserted.len(),
        removed = result.removed.len(),
        "Function state synchronized"
    );

    Ok(result)
}
