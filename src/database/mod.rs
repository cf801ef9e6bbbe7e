pub mod manager;
pub mod migration;
pub mod models;

pub use manager::{
    ConnectionBackend, ConnectionManager, ConnectionStatus, DatabaseError, MySqlBackend, ProbeInfo, TrustConnection,
};
pub use migration::{run_migrations, MigrationError, MigrationScope};

/// True when the error is a MySQL duplicate-key violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
