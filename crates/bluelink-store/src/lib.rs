//! Durable stores for the orchestration core: events, changesets,
//! reconciliation results, cleanup operations and instance state.
//!
//! Every store is a typed trait with a `Pg*` implementation, the same split
//! the rest of this workspace uses so engines and tests can swap in
//! in-memory fakes without touching a real database.

pub mod changeset;
pub mod cleanup;
pub mod error;
pub mod event;
pub mod instance;
pub mod reconciliation;

pub use changeset::{ChangesetStore, PgChangesetStore};
pub use cleanup::{CleanupOperationStore, PgCleanupOperationStore};
pub use error::{DbError, DbResult};
pub use event::{EventStore, PgEventStore};
pub use instance::{InstanceStore, PgInstanceStore};
pub use reconciliation::{PgReconciliationResultStore, ReconciliationResultStore};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
