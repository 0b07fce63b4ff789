//! Database pool and schema bootstrap.

use crate::orm::*;
use once_cell::sync::OnceCell;
use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Returns the global connection pool.
/// Panics if `init_db` has not run.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool is not initialized")
}

/// Connects to the database and stores the pool globally.
pub async fn init_db(database_url: String) {
    let settings = crate::app_config::database();

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let pool = Database::connect(options)
        .await
        .expect("Failed to connect to database");

    if settings.create_schema {
        create_schema(&pool)
            .await
            .expect("Failed to create database schema");
    }

    if DB_POOL.set(pool).is_err() {
        log::warn!("init_db called more than once; keeping the first pool");
    }
}

fn table<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    stmt
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("uq_event_registrations_event_user")
            .table(event_registrations::Entity)
            .col(event_registrations::Column::EventId)
            .col(event_registrations::Column::UserId)
            .unique()
            .to_owned(),
        Index::create()
            .name("uq_votes_user_target")
            .table(votes::Entity)
            .col(votes::Column::UserId)
            .col(votes::Column::TargetType)
            .col(votes::Column::TargetId)
            .unique()
            .to_owned(),
        Index::create()
            .name("uq_community_members_community_user")
            .table(community_members::Entity)
            .col(community_members::Column::CommunityId)
            .col(community_members::Column::UserId)
            .unique()
            .to_owned(),
    ]
}

/// Creates every table and the composite unique indexes the domain relies on.
/// Tables are created in foreign key order.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = vec![
        table(&schema, profiles::Entity),
        table(&schema, communities::Entity),
        table(&schema, community_members::Entity),
        table(&schema, events::Entity),
        table(&schema, event_registrations::Entity),
        table(&schema, transactions::Entity),
        table(&schema, organizer_payouts::Entity),
        table(&schema, event_photos::Entity),
        table(&schema, discussions::Entity),
        table(&schema, discussion_comments::Entity),
        table(&schema, votes::Entity),
        table(&schema, password_reset_tokens::Entity),
        table(&schema, mod_log::Entity),
    ];

    for stmt in tables.iter() {
        db.execute(backend.build(stmt)).await?;
    }

    for stmt in unique_indexes().iter() {
        db.execute(backend.build(stmt)).await?;
    }

    log::info!("Database schema created");
    Ok(())
}
