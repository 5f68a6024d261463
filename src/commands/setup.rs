use tracing::info;
use crate::config::PgfnConfig;
use crate::db::{connect_to_database, PostgresStore};
use crate::error::Result;

/// Create the `pgfn` schema and state table. Safe to run repeatedly.
pub async fn execute_setup(config: &PgfnConfig) -> Result<()> {
    let mut client = connect_to_database(&config.database_config()?).await?;
    PostgresStore::new(&mut client).initialize().await?;
    info!("Function state table is ready");
    Ok(())
}
