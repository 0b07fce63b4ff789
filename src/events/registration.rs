//! Event registration with capacity enforced by the database.
//!
//! `events.confirmed_count` only moves through [`reserve_spot`] and
//! [`release_spot`], always inside the transaction that writes the
//! registration row.

use crate::app_config;
use crate::cache;
use crate::error::{ActionError, ActionResult};
use crate::orm::event_registrations::{self, RegistrationStatus};
use crate::orm::transactions::{self, TransactionStatus};
use crate::orm::{events, profiles};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr};

const EVENT_FULL: &str = "This event is full";

/// Platform share of a ticket payment, in paise.
pub fn platform_fee(amount: i64, fee_bps: i64) -> i64 {
    amount * fee_bps / 10_000
}

/// Takes one spot if the event has room. Returns false when it is full.
async fn reserve_spot<C: ConnectionTrait>(conn: &C, event_id: i32) -> Result<bool, DbErr> {
    let res = events::Entity::update_many()
        .col_expr(
            events::Column::ConfirmedCount,
            Expr::col(events::Column::ConfirmedCount).add(1),
        )
        .filter(events::Column::Id.eq(event_id))
        .filter(Expr::cust(
            "(max_attendees IS NULL OR confirmed_count < max_attendees)",
        ))
        .exec(conn)
        .await?;

    Ok(res.rows_affected == 1)
}

async fn release_spot<C: ConnectionTrait>(conn: &C, event_id: i32) -> Result<(), DbErr> {
    events::Entity::update_many()
        .col_expr(
            events::Column::ConfirmedCount,
            Expr::col(events::Column::ConfirmedCount).sub(1),
        )
        .filter(events::Column::Id.eq(event_id))
        .filter(events::Column::ConfirmedCount.gt(0))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn find_registration(
    db: &DatabaseConnection,
    event_id: i32,
    user_id: i32,
) -> ActionResult<Option<event_registrations::Model>> {
    Ok(event_registrations::Entity::find()
        .filter(event_registrations::Column::EventId.eq(event_id))
        .filter(event_registrations::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Free events confirm immediately. Paid events start in `pending_payment`
/// with a pending transaction until the organizer confirms the payment.
pub async fn register(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
) -> ActionResult<event_registrations::Model> {
    let txn = db.begin().await?;

    let event = events::Entity::find_by_id(event_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;

    if !event.is_listed() {
        return Err(ActionError::validation(
            "This event is not open for registration.",
        ));
    }
    if event.starts_at <= Utc::now().naive_utc() {
        return Err(ActionError::validation(
            "Registration has closed for this event.",
        ));
    }

    let existing = event_registrations::Entity::find()
        .filter(event_registrations::Column::EventId.eq(event_id))
        .filter(event_registrations::Column::UserId.eq(actor.id))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(ActionError::conflict(
            "You are already registered for this event",
        ));
    }

    let status = if event.is_free() {
        if !reserve_spot(&txn, event_id).await? {
            return Err(ActionError::conflict(EVENT_FULL));
        }
        RegistrationStatus::Confirmed
    } else {
        if matches!(event.spots_left(), Some(0)) {
            return Err(ActionError::conflict(EVENT_FULL));
        }
        RegistrationStatus::PendingPayment
    };

    let now = Utc::now().naive_utc();
    let registration = event_registrations::ActiveModel {
        event_id: Set(event_id),
        user_id: Set(actor.id),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if status == RegistrationStatus::PendingPayment {
        transactions::ActiveModel {
            event_id: Set(event_id),
            registration_id: Set(Some(registration.id)),
            organizer_id: Set(event.organizer_id),
            payer_id: Set(actor.id),
            amount: Set(event.ticket_price),
            platform_fee: Set(0),
            status: Set(TransactionStatus::Pending),
            payment_reference: Set(None),
            created_at: Set(now),
            completed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    log::info!(
        "User {} registered for event {} ({:?})",
        actor.id,
        event_id,
        status
    );
    cache::revalidate_event(event_id);
    Ok(registration)
}

/// Flips a `pending_payment` registration to confirmed. Returns false when
/// it is no longer pending, so a registration is confirmed at most once.
pub async fn claim_pending<C: ConnectionTrait>(conn: &C, registration_id: i32) -> Result<bool, DbErr> {
    let res = event_registrations::Entity::update_many()
        .col_expr(
            event_registrations::Column::Status,
            Expr::value(RegistrationStatus::Confirmed),
        )
        .col_expr(
            event_registrations::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(event_registrations::Column::Id.eq(registration_id))
        .filter(event_registrations::Column::Status.eq(RegistrationStatus::PendingPayment))
        .exec(conn)
        .await?;

    Ok(res.rows_affected == 1)
}

async fn find_registration_for_update<C: ConnectionTrait>(
    conn: &C,
    registration_id: i32,
) -> ActionResult<event_registrations::Model> {
    event_registrations::Entity::find_by_id(registration_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or(ActionError::NotFound("Registration"))
}

/// Marks a paid registration as confirmed and its transaction as completed.
pub async fn confirm_payment(
    db: &DatabaseConnection,
    actor: &Actor,
    registration_id: i32,
    payment_reference: Option<&str>,
) -> ActionResult<event_registrations::Model> {
    let txn = db.begin().await?;

    let registration = find_registration_for_update(&txn, registration_id).await?;
    let event = events::Entity::find_by_id(registration.event_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;

    authorize(
        actor,
        Action::ConfirmRegistration,
        &Resource::OwnedBy(event.organizer_id),
    )?;

    if registration.status == RegistrationStatus::Confirmed {
        return Ok(registration);
    }
    if !claim_pending(&txn, registration.id).await? {
        // Confirmed by a request that committed after our read.
        return find_registration_for_update(&txn, registration.id).await;
    }

    if !reserve_spot(&txn, event.id).await? {
        return Err(ActionError::conflict(EVENT_FULL));
    }

    let now = Utc::now().naive_utc();
    let registration = find_registration_for_update(&txn, registration.id).await?;

    let fee_bps = app_config::payouts().platform_fee_bps;
    let reference = payment_reference
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.to_string());

    let pending = transactions::Entity::find()
        .filter(transactions::Column::RegistrationId.eq(registration.id))
        .filter(transactions::Column::Status.eq(TransactionStatus::Pending))
        .one(&txn)
        .await?;

    match pending {
        Some(payment) => {
            let fee = platform_fee(payment.amount, fee_bps);
            let mut payment: transactions::ActiveModel = payment.into();
            payment.status = Set(TransactionStatus::Completed);
            payment.platform_fee = Set(fee);
            payment.payment_reference = Set(reference);
            payment.completed_at = Set(Some(now));
            payment.update(&txn).await?;
        }
        None => {
            transactions::ActiveModel {
                event_id: Set(event.id),
                registration_id: Set(Some(registration.id)),
                organizer_id: Set(event.organizer_id),
                payer_id: Set(registration.user_id),
                amount: Set(event.ticket_price),
                platform_fee: Set(platform_fee(event.ticket_price, fee_bps)),
                status: Set(TransactionStatus::Completed),
                payment_reference: Set(reference),
                created_at: Set(now),
                completed_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    log::info!(
        "User {} confirmed payment for registration {} on event {}",
        actor.id,
        registration.id,
        event.id
    );
    cache::revalidate_event(event.id);
    Ok(registration)
}

/// Withdraws the caller's own registration. Confirmed paid registrations
/// need the organizer, since money has changed hands.
pub async fn cancel_registration(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
) -> ActionResult<()> {
    let txn = db.begin().await?;

    let event = events::Entity::find_by_id(event_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;

    let registration = event_registrations::Entity::find()
        .filter(event_registrations::Column::EventId.eq(event_id))
        .filter(event_registrations::Column::UserId.eq(actor.id))
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Registration"))?;

    let confirmed = registration.status == RegistrationStatus::Confirmed;
    if confirmed && !event.is_free() {
        return Err(ActionError::validation(
            "Paid registrations cannot be cancelled here. Please contact the organizer.",
        ));
    }

    if !confirmed {
        transactions::Entity::update_many()
            .col_expr(
                transactions::Column::Status,
                Expr::value(TransactionStatus::Failed),
            )
            .filter(transactions::Column::RegistrationId.eq(registration.id))
            .filter(transactions::Column::Status.eq(TransactionStatus::Pending))
            .exec(&txn)
            .await?;
        transactions::Entity::update_many()
            .col_expr(transactions::Column::RegistrationId, Expr::value(Option::<i32>::None))
            .filter(transactions::Column::RegistrationId.eq(registration.id))
            .exec(&txn)
            .await?;
    }

    event_registrations::Entity::delete_by_id(registration.id)
        .exec(&txn)
        .await?;

    if confirmed {
        release_spot(&txn, event_id).await?;
    }

    txn.commit().await?;

    log::info!("User {} cancelled registration for event {}", actor.id, event_id);
    cache::revalidate_event(event_id);
    Ok(())
}

/// Registrations with the registrant's profile, for the organizer view.
pub async fn list_registrations(
    db: &DatabaseConnection,
    actor: &Actor,
    event: &events::Model,
) -> ActionResult<Vec<(event_registrations::Model, Option<profiles::Model>)>> {
    authorize(
        actor,
        Action::ViewRegistrations,
        &Resource::OwnedBy(event.organizer_id),
    )?;

    Ok(event_registrations::Entity::find()
        .filter(event_registrations::Column::EventId.eq(event.id))
        .find_also_related(profiles::Entity)
        .order_by_asc(event_registrations::Column::CreatedAt)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_fee_rounds_down() {
        assert_eq!(platform_fee(50_000, 500), 2_500);
        assert_eq!(platform_fee(999, 500), 49);
        assert_eq!(platform_fee(50_000, 0), 0);
    }
}
