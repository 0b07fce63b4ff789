//! Test database setup
#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// A fresh in-memory SQLite database with every table created.
///
/// Each connection to `sqlite::memory:` is its own database, so the pool is
/// pinned to a single connection.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    bgculture::db::create_schema(&db).await?;
    Ok(db)
}
