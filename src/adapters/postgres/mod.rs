//! PostgreSQL adapters.

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::{create_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use store::PgStore;
