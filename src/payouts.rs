//! Organizer earnings and payout requests.
//!
//! Balances are never stored. They are folded from the organizer's
//! completed transactions and payouts every time they are needed.

use crate::app_config;
use crate::error::{ActionError, ActionResult};
use crate::money::format_inr;
use crate::moderation::log_action;
use crate::orm::organizer_payouts::{self, PayoutStatus};
use crate::orm::profiles;
use crate::orm::transactions::{self, TransactionStatus};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr};

/// Amounts in paise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    /// Completed ticket sales net of platform fees.
    pub earned: i64,
    /// Completed payouts.
    pub paid_out: i64,
    /// Requested but not yet reviewed. Informational only.
    pub pending: i64,
    pub available: i64,
}

pub fn compute_balance(
    transactions: &[transactions::Model],
    payouts: &[organizer_payouts::Model],
) -> Balance {
    let earned = transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed)
        .map(|t| t.amount - t.platform_fee)
        .sum();

    let (paid_out, pending) = payouts.iter().fold((0, 0), |(paid, pending), p| match p.status {
        PayoutStatus::Completed => (paid + p.amount, pending),
        PayoutStatus::Pending => (paid, pending + p.amount),
        PayoutStatus::Rejected => (paid, pending),
    });

    Balance {
        earned,
        paid_out,
        pending,
        available: earned - paid_out,
    }
}

pub async fn balance<C: ConnectionTrait>(conn: &C, organizer_id: i32) -> Result<Balance, DbErr> {
    let transactions = transactions::Entity::find()
        .filter(transactions::Column::OrganizerId.eq(organizer_id))
        .filter(transactions::Column::Status.eq(TransactionStatus::Completed))
        .all(conn)
        .await?;
    let payouts = organizer_payouts::Entity::find()
        .filter(organizer_payouts::Column::OrganizerId.eq(organizer_id))
        .all(conn)
        .await?;

    Ok(compute_balance(&transactions, &payouts))
}

/// Checks a requested amount against the minimum and the available balance.
pub fn check_request(amount: i64, balance: &Balance, minimum: i64) -> ActionResult<()> {
    if amount < minimum {
        return Err(ActionError::validation(format!(
            "Minimum payout amount is {}",
            format_inr(minimum)
        )));
    }
    if amount > balance.available {
        return Err(ActionError::validation("Insufficient balance"));
    }
    Ok(())
}

pub async fn request_payout(
    db: &DatabaseConnection,
    actor: &Actor,
    amount: i64,
    payout_method: &str,
) -> ActionResult<organizer_payouts::Model> {
    authorize(actor, Action::RequestPayout, &Resource::Site)?;

    let payout_method = payout_method.trim();
    if payout_method.is_empty() {
        return Err(ActionError::validation("Please choose a payout method."));
    }

    let current = balance(db, actor.id).await?;
    check_request(amount, &current, app_config::payouts().minimum_amount)?;

    let payout = organizer_payouts::ActiveModel {
        organizer_id: Set(actor.id),
        amount: Set(amount),
        payout_method: Set(payout_method.to_string()),
        status: Set(PayoutStatus::Pending),
        rejection_reason: Set(None),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        requested_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!(
        "Organizer {} requested payout {} of {}",
        actor.id,
        payout.id,
        format_inr(amount)
    );
    Ok(payout)
}

/// Moves a pending payout to `next`. Returns false when the payout is no
/// longer pending, so only one review decision can ever land.
pub async fn settle_payout<C: ConnectionTrait>(
    conn: &C,
    payout_id: i32,
    next: PayoutStatus,
    reviewer_id: i32,
    reason: Option<&str>,
) -> Result<bool, DbErr> {
    let res = organizer_payouts::Entity::update_many()
        .col_expr(organizer_payouts::Column::Status, Expr::value(next))
        .col_expr(
            organizer_payouts::Column::RejectionReason,
            Expr::value(reason.map(|r| r.to_string())),
        )
        .col_expr(
            organizer_payouts::Column::ReviewedBy,
            Expr::value(Some(reviewer_id)),
        )
        .col_expr(
            organizer_payouts::Column::ReviewedAt,
            Expr::value(Some(Utc::now().naive_utc())),
        )
        .filter(organizer_payouts::Column::Id.eq(payout_id))
        .filter(organizer_payouts::Column::Status.eq(PayoutStatus::Pending))
        .exec(conn)
        .await?;

    Ok(res.rows_affected == 1)
}

async fn find_payout_for_update<C: ConnectionTrait>(
    conn: &C,
    payout_id: i32,
) -> ActionResult<organizer_payouts::Model> {
    organizer_payouts::Entity::find_by_id(payout_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or(ActionError::NotFound("Payout"))
}

fn already_reviewed() -> ActionError {
    ActionError::conflict("This payout was reviewed by someone else.")
}

pub async fn approve_payout(
    db: &DatabaseConnection,
    actor: &Actor,
    payout_id: i32,
) -> ActionResult<organizer_payouts::Model> {
    authorize(actor, Action::ReviewPayout, &Resource::Site)?;

    let txn = db.begin().await?;

    let payout = find_payout_for_update(&txn, payout_id).await?;

    match payout.status {
        PayoutStatus::Completed => return Ok(payout),
        PayoutStatus::Rejected => {
            return Err(ActionError::validation(
                "This payout has already been rejected.",
            ))
        }
        PayoutStatus::Pending => {}
    }

    // Approvals for one organizer queue on the profile row, so each balance
    // below includes every approval committed before it.
    profiles::Entity::find_by_id(payout.organizer_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Organizer"))?;

    let current = balance(&txn, payout.organizer_id).await?;
    if payout.amount > current.available {
        return Err(ActionError::validation("Insufficient balance"));
    }

    if !settle_payout(&txn, payout.id, PayoutStatus::Completed, actor.id, None).await? {
        return Err(already_reviewed());
    }
    log_action(&txn, actor.id, "approve_payout", "payout", payout.id, None).await?;

    let payout = find_payout_for_update(&txn, payout.id).await?;
    txn.commit().await?;

    log::info!("User {} approved payout {}", actor.id, payout.id);
    Ok(payout)
}

pub async fn reject_payout(
    db: &DatabaseConnection,
    actor: &Actor,
    payout_id: i32,
    reason: &str,
) -> ActionResult<organizer_payouts::Model> {
    authorize(actor, Action::ReviewPayout, &Resource::Site)?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ActionError::validation("A rejection reason is required."));
    }

    let txn = db.begin().await?;

    let payout = find_payout_for_update(&txn, payout_id).await?;

    match payout.status {
        PayoutStatus::Rejected => return Ok(payout),
        PayoutStatus::Completed => {
            return Err(ActionError::validation(
                "This payout has already been completed.",
            ))
        }
        PayoutStatus::Pending => {}
    }

    if !settle_payout(&txn, payout.id, PayoutStatus::Rejected, actor.id, Some(reason)).await? {
        return Err(already_reviewed());
    }
    log_action(&txn, actor.id, "reject_payout", "payout", payout.id, Some(reason)).await?;

    let payout = find_payout_for_update(&txn, payout.id).await?;
    txn.commit().await?;

    log::info!("User {} rejected payout {}", actor.id, payout.id);
    Ok(payout)
}

pub async fn list_for_organizer(
    db: &DatabaseConnection,
    organizer_id: i32,
) -> ActionResult<Vec<organizer_payouts::Model>> {
    Ok(organizer_payouts::Entity::find()
        .filter(organizer_payouts::Column::OrganizerId.eq(organizer_id))
        .order_by_desc(organizer_payouts::Column::RequestedAt)
        .all(db)
        .await?)
}

pub async fn list_pending(db: &DatabaseConnection) -> ActionResult<Vec<organizer_payouts::Model>> {
    Ok(organizer_payouts::Entity::find()
        .filter(organizer_payouts::Column::Status.eq(PayoutStatus::Pending))
        .order_by_asc(organizer_payouts::Column::RequestedAt)
        .all(db)
        .await?)
}
