//! Moderation log, role management and the admin dashboard.

use crate::error::{ActionError, ActionResult};
use crate::orm::profiles::{self, Role};
use crate::orm::{events, mod_log, organizer_payouts};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr};

const RECENT_LOG_ENTRIES: u64 = 25;

/// Writes one mod_log row. Called with the transaction of the change it records.
pub async fn log_action<C: ConnectionTrait>(
    conn: &C,
    moderator_id: i32,
    action: &str,
    target_type: &str,
    target_id: i32,
    reason: Option<&str>,
) -> Result<(), DbErr> {
    let entry = mod_log::ActiveModel {
        moderator_id: Set(Some(moderator_id)),
        action: Set(action.to_string()),
        target_type: Set(target_type.to_string()),
        target_id: Set(target_id),
        reason: Set(reason.map(|s| s.to_string())),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    mod_log::Entity::insert(entry).exec(conn).await?;
    Ok(())
}

pub async fn set_role(
    db: &DatabaseConnection,
    actor: &Actor,
    profile_id: i32,
    role: Role,
) -> ActionResult<profiles::Model> {
    authorize(actor, Action::ManageRoles, &Resource::Site)?;

    if profile_id == actor.id {
        return Err(ActionError::validation("You cannot change your own role."));
    }

    let txn = db.begin().await?;

    let profile = profiles::Entity::find_by_id(profile_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("User"))?;

    if profile.role == role {
        return Ok(profile);
    }

    let previous = profile.role;
    let mut active: profiles::ActiveModel = profile.into();
    active.role = Set(role);
    active.updated_at = Set(Utc::now().naive_utc());
    let profile = active.update(&txn).await?;

    let reason = format!("{} -> {}", previous, role);
    log_action(&txn, actor.id, "set_role", "profile", profile_id, Some(&reason)).await?;

    txn.commit().await?;

    log::info!(
        "User {} changed role of {} from {} to {}",
        actor.id,
        profile_id,
        previous,
        role
    );
    Ok(profile)
}

pub async fn list_users(db: &DatabaseConnection, actor: &Actor) -> ActionResult<Vec<profiles::Model>> {
    authorize(actor, Action::ManageRoles, &Resource::Site)?;

    Ok(profiles::Entity::find()
        .order_by_asc(profiles::Column::Id)
        .all(db)
        .await?)
}

pub struct AdminDashboard {
    pub pending_events: Vec<events::Model>,
    pub pending_payouts: Vec<organizer_payouts::Model>,
    pub recent_log: Vec<mod_log::Model>,
}

pub async fn admin_dashboard(db: &DatabaseConnection, actor: &Actor) -> ActionResult<AdminDashboard> {
    authorize(actor, Action::ViewAdminDashboard, &Resource::Site)?;

    let pending_events = crate::events::list_pending_moderation(db).await?;
    let pending_payouts = crate::payouts::list_pending(db).await?;
    let recent_log = mod_log::Entity::find()
        .order_by_desc(mod_log::Column::Id)
        .limit(RECENT_LOG_ENTRIES)
        .all(db)
        .await?;

    Ok(AdminDashboard {
        pending_events,
        pending_payouts,
        recent_log,
    })
}
