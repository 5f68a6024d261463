use tokio_postgres::{Client, GenericClient};
use std::time::SystemTime;
use tracing::debug;
use crate::error::Result;
use crate::sql::calculate_sql_hash;

/// What was last migrated for one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub function_name: String,
    pub sql_definition: String,
    pub app_label: String,
    pub sql_hash: String,
    pub updated_at: SystemTime,
}

/// One change to the recorded state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Upsert {
        function_name: String,
        app_label: String,
        normalized_sql: String,
    },
    Delete {
        function_name: String,
    },
}

impl StateChange {
    pub fn upsert(
        function_name: impl Into<String>,
        app_label: impl Into<String>,
        normalized_sql: impl Into<String>,
    ) -> Self {
        StateChange::Upsert {
            function_name: function_name.into(),
            app_label: app_label.into(),
            normalized_sql: normalized_sql.into(),
        }
    }

    pub fn delete(function_name: impl Into<String>) -> Self {
        StateChange::Delete {
            function_name: function_name.into(),
        }
    }
}

/// Durable record of every function that has had a migration generated.
///
/// `all` must return records ordered by function name. `apply` must apply
/// every change or none of them.
#[allow(async_fn_in_trait)]
pub trait FunctionStore {
    async fn get(&self, function_name: &str) -> Result<Option<FunctionRecord>>;

    async fn upsert(&mut self, function_name: &str, app_label: &str, normalized_sql: &str) -> Result<()>;

    async fn delete(&mut self, function_name: &str) -> Result<()>;

    async fn all(&self) -> Result<Vec<FunctionRecord>>;

    async fn apply(&mut self, changes: &[StateChange]) -> Result<()>;
}

/// Function state kept in `pgfn.pgfn_functions`
pub struct PostgresStore<'a> {
    client: &'a mut Client,
}

impl<'a> PostgresStore<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        Self { client }
    }

    /// Create the state schema and table if they don't exist
    pub async fn initialize(&self) -> Result<()> {
        self.client.execute(
            r#"
            CREATE SCHEMA IF NOT EXISTS pgfn
            "#,
            &[],
        ).await?;

        self.client.execute(
            r#"
            CREATE TABLE IF NOT EXISTS pgfn.pgfn_functions (
                function_name TEXT PRIMARY KEY,
                sql_definition TEXT NOT NULL,
                app_label TEXT NOT NULL,
                sql_hash TEXT NOT NULL,
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
            &[],
        ).await?;

        self.client.execute(
            r#"
            CREATE INDEX IF NOT EXISTS idx_pgfn_functions_app_label
            ON pgfn.pgfn_functions (app_label)
            "#,
            &[],
        ).await?;

        Ok(())
    }

    fn record_from_row(row: &tokio_postgres::Row) -> FunctionRecord {
        FunctionRecord {
            function_name: row.get(0),
            sql_definition: row.get(1),
            app_label: row.get(2),
            sql_hash: row.get(3),
            updated_at: row.get(4),
        }
    }
}

impl FunctionStore for PostgresStore<'_> {
    async fn get(&self, function_name: &str) -> Result<Option<FunctionRecord>> {
        let rows = self.client.query(
            r#"
            SELECT function_name, sql_definition, app_label, sql_hash, updated_at
            FROM pgfn.pgfn_functions
            WHERE function_name = $1
            "#,
            &[&function_name],
        ).await?;

        Ok(rows.first().map(Self::record_from_row))
    }

    async fn all(&self) -> Result<Vec<FunctionRecord>> {
        let rows = self.client.query(
            r#"
            SELECT function_name, sql_definition, app_label, sql_hash, updated_at
            FROM pgfn.pgfn_functions
            ORDER BY function_name
            "#,
            &[],
        ).await?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    async fn upsert(&mut self, function_name: &str, app_label: &str, normalized_sql: &str) -> Result<()> {
        write_upsert(&*self.client, function_name, app_label, normalized_sql).await
    }

    async fn delete(&mut self, function_name: &str) -> Result<()> {
        write_delete(&*self.client, function_name).await
    }

    async fn apply(&mut self, changes: &[StateChange]) -> Result<()> {
        let transaction = self.client.transaction().await?;

        for change in changes {
            match change {
                StateChange::Upsert { function_name, app_label, normalized_sql } => {
                    write_upsert(&transaction, function_name, app_label, normalized_sql).await?;
                }
                StateChange::Delete { function_name } => {
                    write_delete(&transaction, function_name).await?;
                }
            }
        }

        transaction.commit().await?;
        Ok(())
    }
}

async fn write_upsert<C: GenericClient>(
    client: &C,
    function_name: &str,
    app_label: &str,
    normalized_sql: &str,
) -> Result<()> {
    let sql_hash = calculate_sql_hash(normalized_sql);
    debug!(function = function_name, app = app_label, hash = %sql_hash, "Storing function state");

    client.execute(
        r#"
        INSERT INTO pgfn.pgfn_functions (function_name, sql_definition, app_label, sql_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (function_name)
        DO UPDATE SET sql_definition = $2, app_label = $3, sql_hash = $4, updated_at = NOW()
        "#,
        &[&function_name, &normalized_sql, &app_label, &sql_hash],
    ).await?;

    Ok(())
}

async fn write_delete<C: GenericClient>(client: &C, function_name: &str) -> Result<()> {
    debug!(function = function_name, "Removing function state");

    client.execute(
        "DELETE FROM pgfn.pgfn_functions WHERE function_name = $1",
        &[&function_name],
    ).await?;

    Ok(())
}
