//! Test fixtures for creating test data
#![allow(dead_code)]
#![allow(clippy::needless_update)]

use bgculture::events::{self, EventInput};
use bgculture::orm::profiles::{self, Role};
use bgculture::orm::transactions::{self, TransactionStatus};
use bgculture::orm::{event_registrations, events as event_rows};
use bgculture::permission::Actor;
use chrono::{Duration, Utc};
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};

pub const TEST_PASSWORD: &str = "correct horse battery";

/// Create a profile with the given role and [`TEST_PASSWORD`].
pub async fn create_profile(
    db: &DatabaseConnection,
    name: &str,
    role: Role,
) -> Result<profiles::Model, DbErr> {
    let password_hash = bgculture::session::hash_password(TEST_PASSWORD)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?;
    let now = Utc::now().naive_utc();

    profiles::ActiveModel {
        email: Set(format!("{}@example.in", name.to_lowercase())),
        password_hash: Set(password_hash),
        display_name: Set(name.to_string()),
        role: Set(role),
        city: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn create_actor(db: &DatabaseConnection, name: &str, role: Role) -> Result<Actor, DbErr> {
    Ok(Actor::from(&create_profile(db, name, role).await?))
}

/// Input for an event one week out.
pub fn event_input(title: &str, ticket_price: i64, max_attendees: Option<i32>) -> EventInput {
    let starts_at = Utc::now().naive_utc() + Duration::days(7);
    EventInput {
        title: title.to_string(),
        description: "Bring your favourite games.".to_string(),
        city: "Pune".to_string(),
        venue: "Dice & Chai".to_string(),
        starts_at,
        ends_at: Some(starts_at + Duration::hours(4)),
        ticket_price,
        max_attendees,
        community_id: None,
    }
}

/// An event created by `organizer` and approved by `super_admin`.
pub async fn create_listed_event(
    db: &DatabaseConnection,
    organizer: &Actor,
    super_admin: &Actor,
    ticket_price: i64,
    max_attendees: Option<i32>,
) -> event_rows::Model {
    let event = events::create_event(
        db,
        organizer,
        event_input("Catan night", ticket_price, max_attendees),
    )
    .await
    .expect("organizer can create events");
    events::approve_event(db, super_admin, event.id)
        .await
        .expect("super admin can approve events")
}

/// A completed ticket sale credited to `organizer_id`.
pub async fn create_completed_sale(
    db: &DatabaseConnection,
    event_id: i32,
    organizer_id: i32,
    payer_id: i32,
    amount: i64,
    platform_fee: i64,
) -> Result<transactions::Model, DbErr> {
    let now = Utc::now().naive_utc();
    transactions::ActiveModel {
        event_id: Set(event_id),
        registration_id: Set(None),
        organizer_id: Set(organizer_id),
        payer_id: Set(payer_id),
        amount: Set(amount),
        platform_fee: Set(platform_fee),
        status: Set(TransactionStatus::Completed),
        payment_reference: Set(Some("UPI-TEST".to_string())),
        created_at: Set(now),
        completed_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn reload_event(db: &DatabaseConnection, event_id: i32) -> event_rows::Model {
    event_rows::Entity::find_by_id(event_id)
        .one(db)
        .await
        .expect("query succeeds")
        .expect("event exists")
}

pub async fn registration_count(db: &DatabaseConnection, event_id: i32) -> usize {
    use sea_orm::{PaginatorTrait, QueryFilter};
    event_registrations::Entity::find()
        .filter(event_registrations::Column::EventId.eq(event_id))
        .count(db)
        .await
        .expect("query succeeds")
}
