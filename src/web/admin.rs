//! Administration: event moderation, payout review and role management.

use crate::db::get_db_pool;
use crate::events;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::moderation;
use crate::money::format_inr;
use crate::orm::profiles::{self, Role};
use crate::payouts;
use crate::permission::{Action, Resource};
use crate::web::events::EventCard;
use crate::web::{format_datetime, html, render, see_other};
use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use sea_orm::{entity::*, query::*};
use serde::Deserialize;
use std::collections::HashMap;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_dashboard)
        .service(post_approve_event)
        .service(post_reject_event)
        .service(post_approve_payout)
        .service(post_reject_payout)
        .service(view_users)
        .service(post_set_role);
}

pub struct PendingPayout {
    pub id: i32,
    pub organizer: String,
    pub amount: String,
    pub method: String,
    pub requested_at: String,
}

pub struct LogRow {
    pub action: String,
    pub target: String,
    pub reason: String,
    pub moderator: String,
    pub created_at: String,
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct DashboardTemplate {
    client: ClientCtx,
    can_moderate_events: bool,
    pending_events: Vec<EventCard>,
    pending_payouts: Vec<PendingPayout>,
    recent_log: Vec<LogRow>,
}

pub struct RoleOption {
    pub value: &'static str,
    pub selected: bool,
}

pub struct UserRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub is_self: bool,
    pub options: Vec<RoleOption>,
}

const ROLES: [Role; 4] = [Role::User, Role::Organizer, Role::Admin, Role::SuperAdmin];

fn role_options(current: Role) -> Vec<RoleOption> {
    ROLES
        .iter()
        .map(|role| RoleOption {
            value: role.as_str(),
            selected: *role == current,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct UsersTemplate {
    client: ClientCtx,
    users: Vec<UserRow>,
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: String,
}

#[derive(Deserialize)]
struct RejectForm {
    reason: String,
    csrf_token: String,
}

#[derive(Deserialize)]
struct RoleForm {
    role: String,
    csrf_token: String,
}

/// Display names for a set of profile ids.
async fn display_names(ids: Vec<i32>) -> Result<HashMap<i32, String>, Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let names = profiles::Entity::find()
        .filter(profiles::Column::Id.is_in(ids))
        .all(get_db_pool())
        .await
        .map_err(crate::error::ActionError::from)?
        .into_iter()
        .map(|p| (p.id, p.display_name))
        .collect();
    Ok(names)
}

#[get("/admin")]
async fn view_dashboard(client: ClientCtx) -> Result<impl Responder, Error> {
    let actor = client.require_actor()?;
    let dashboard = moderation::admin_dashboard(get_db_pool(), &actor).await?;

    let mut ids: Vec<i32> = dashboard
        .pending_payouts
        .iter()
        .map(|p| p.organizer_id)
        .chain(dashboard.recent_log.iter().filter_map(|l| l.moderator_id))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    let names = display_names(ids).await?;
    let name_of = |id: i32| names.get(&id).cloned().unwrap_or_else(|| format!("#{}", id));

    let pending_payouts = dashboard
        .pending_payouts
        .into_iter()
        .map(|p| PendingPayout {
            id: p.id,
            organizer: name_of(p.organizer_id),
            amount: format_inr(p.amount),
            method: p.payout_method,
            requested_at: format_datetime(&p.requested_at),
        })
        .collect();

    let recent_log = dashboard
        .recent_log
        .into_iter()
        .map(|l| LogRow {
            target: format!("{} #{}", l.target_type, l.target_id),
            moderator: l.moderator_id.map(name_of).unwrap_or_default(),
            reason: l.reason.unwrap_or_default(),
            created_at: format_datetime(&l.created_at),
            action: l.action,
        })
        .collect();

    let body = render(&DashboardTemplate {
        can_moderate_events: client.can(Action::ModerateEvent, &Resource::Site),
        client,
        pending_events: dashboard.pending_events.iter().map(EventCard::from).collect(),
        pending_payouts,
        recent_log,
    })?;
    Ok(html(StatusCode::OK, body))
}

#[post("/admin/events/{id}/approve")]
async fn post_approve_event(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    events::approve_event(get_db_pool(), &actor, path.into_inner()).await?;
    Ok(see_other("/admin"))
}

#[post("/admin/events/{id}/reject")]
async fn post_reject_event(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<RejectForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    events::reject_event(get_db_pool(), &actor, path.into_inner(), &form.reason).await?;
    Ok(see_other("/admin"))
}

#[post("/admin/payouts/{id}/approve")]
async fn post_approve_payout(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    payouts::approve_payout(get_db_pool(), &actor, path.into_inner()).await?;
    Ok(see_other("/admin"))
}

#[post("/admin/payouts/{id}/reject")]
async fn post_reject_payout(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<RejectForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    payouts::reject_payout(get_db_pool(), &actor, path.into_inner(), &form.reason).await?;
    Ok(see_other("/admin"))
}

#[get("/admin/users")]
async fn view_users(client: ClientCtx) -> Result<impl Responder, Error> {
    let actor = client.require_actor()?;

    let users = moderation::list_users(get_db_pool(), &actor)
        .await?
        .into_iter()
        .map(|p| UserRow {
            id: p.id,
            is_self: p.id == actor.id,
            name: p.display_name,
            email: p.email,
            role: p.role.as_str(),
            options: role_options(p.role),
        })
        .collect();

    let body = render(&UsersTemplate { client, users })?;
    Ok(html(StatusCode::OK, body))
}

#[post("/admin/users/{id}/role")]
async fn post_set_role(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<RoleForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let role = Role::parse(&form.role)
        .ok_or_else(|| crate::error::ActionError::validation("Unknown role."))?;
    moderation::set_role(get_db_pool(), &actor, path.into_inner(), role).await?;
    Ok(see_other("/admin/users"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_options_select_current_role() {
        let options = role_options(Role::Admin);
        assert_eq!(options.len(), 4);
        let selected: Vec<&str> = options.iter().filter(|o| o.selected).map(|o| o.value).collect();
        assert_eq!(selected, vec!["admin"]);
    }
}
