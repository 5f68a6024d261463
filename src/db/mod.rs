pub mod state;
pub mod memory;
pub mod connection;
pub mod sync;

pub use state::{FunctionStore, FunctionRecord, PostgresStore, StateChange};
pub use memory::MemoryStore;
pub use connection::{DatabaseConfig, connect_to_database, connect_with_url};
pub use sync::{sync_state, SyncResult};
