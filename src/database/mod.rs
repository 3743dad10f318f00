pub mod access_grant_repo;
pub mod activity_repo;
pub mod attendee_repo;
pub mod check_in_repo;
pub mod event_repo;
pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Opens the pool and applies the schema.
pub async fn connect(database_url: &str) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    schema::migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database, for tests and local experiments.
///
/// The connection never expires: dropping it would drop the database.
pub async fn connect_in_memory() -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    schema::migrate(&pool).await?;
    Ok(pool)
}
