//! Organizer dashboard: own events, registrations, photo review and payouts.

use crate::db::get_db_pool;
use crate::error::ActionError;
use crate::events::{self, registration};
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::money::{format_inr, parse_inr};
use crate::orm::event_photos::PhotoStatus;
use crate::orm::event_registrations::RegistrationStatus;
use crate::orm::organizer_payouts::{self, PayoutStatus};
use crate::payouts::{self, Balance};
use crate::permission::{authorize, Action, Resource};
use crate::web::events::EventCard;
use crate::web::{format_datetime, html, non_empty, render, see_other};
use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama::Template;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_dashboard)
        .service(view_event)
        .service(post_confirm_registration)
        .service(view_payouts)
        .service(post_request_payout);
}

/// Balance figures, formatted.
pub struct BalanceView {
    pub earned: String,
    pub paid_out: String,
    pub pending: String,
    pub available: String,
}

impl From<Balance> for BalanceView {
    fn from(balance: Balance) -> Self {
        Self {
            earned: format_inr(balance.earned),
            paid_out: format_inr(balance.paid_out),
            pending: format_inr(balance.pending),
            available: format_inr(balance.available),
        }
    }
}

#[derive(Template)]
#[template(path = "organizer/dashboard.html")]
struct DashboardTemplate {
    client: ClientCtx,
    events: Vec<EventCard>,
    balance: BalanceView,
}

pub struct RegistrationRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub confirmed: bool,
    pub registered_at: String,
}

pub struct ReviewPhoto {
    pub id: i32,
    pub caption: String,
    pub status: &'static str,
    pub can_approve: bool,
    pub can_reject: bool,
}

#[derive(Template)]
#[template(path = "organizer/event.html")]
struct EventTemplate {
    client: ClientCtx,
    event: EventCard,
    is_paid: bool,
    confirmed: i32,
    registrations: Vec<RegistrationRow>,
    photos: Vec<ReviewPhoto>,
}

pub struct PayoutRow {
    pub amount: String,
    pub method: String,
    pub status: &'static str,
    pub rejection_reason: String,
    pub requested_at: String,
}

#[derive(Template)]
#[template(path = "organizer/payouts.html")]
struct PayoutsTemplate {
    client: ClientCtx,
    balance: BalanceView,
    minimum: String,
    payouts: Vec<PayoutRow>,
    amount: String,
    method: String,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ConfirmForm {
    payment_reference: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
struct PayoutForm {
    amount: String,
    payout_method: String,
    csrf_token: String,
}

pub fn photo_status_label(status: PhotoStatus) -> &'static str {
    match status {
        PhotoStatus::Pending => "Pending",
        PhotoStatus::Approved => "Approved",
        PhotoStatus::Rejected => "Rejected",
    }
}

pub fn payout_status_label(status: PayoutStatus) -> &'static str {
    match status {
        PayoutStatus::Pending => "Pending",
        PayoutStatus::Completed => "Paid",
        PayoutStatus::Rejected => "Rejected",
    }
}

fn payout_row(payout: organizer_payouts::Model) -> PayoutRow {
    PayoutRow {
        amount: format_inr(payout.amount),
        method: payout.payout_method,
        status: payout_status_label(payout.status),
        rejection_reason: payout.rejection_reason.unwrap_or_default(),
        requested_at: format_datetime(&payout.requested_at),
    }
}

#[get("/organizer")]
async fn view_dashboard(client: ClientCtx) -> Result<impl Responder, Error> {
    let actor = client.require_actor()?;
    authorize(&actor, Action::ViewOrganizerDashboard, &Resource::Site)?;
    let db = get_db_pool();

    let events = events::list_by_organizer(db, actor.id)
        .await?
        .iter()
        .map(EventCard::from)
        .collect();
    let balance = payouts::balance(db, actor.id)
        .await
        .map_err(ActionError::from)?;

    let body = render(&DashboardTemplate {
        client,
        events,
        balance: balance.into(),
    })?;
    Ok(html(StatusCode::OK, body))
}

#[get("/organizer/events/{id}")]
async fn view_event(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    let actor = client.require_actor()?;
    let db = get_db_pool();
    let event = events::get_event(db, path.into_inner()).await?;

    let registrations = registration::list_registrations(db, &actor, &event)
        .await?
        .into_iter()
        .map(|(r, profile)| {
            let (name, email) = profile
                .map(|p| (p.display_name, p.email))
                .unwrap_or_default();
            RegistrationRow {
                id: r.id,
                name,
                email,
                confirmed: r.status == RegistrationStatus::Confirmed,
                registered_at: format_datetime(&r.created_at),
            }
        })
        .collect();

    let photos = crate::photos::list_for_review(db, &actor, &event)
        .await?
        .into_iter()
        .map(|p| ReviewPhoto {
            id: p.id,
            caption: p.caption.unwrap_or_default(),
            status: photo_status_label(p.status),
            can_approve: crate::photos::photo_transition(p.status, true).is_some(),
            can_reject: crate::photos::photo_transition(p.status, false).is_some(),
        })
        .collect();

    let body = render(&EventTemplate {
        client,
        event: EventCard::from(&event),
        is_paid: !event.is_free(),
        confirmed: event.confirmed_count,
        registrations,
        photos,
    })?;
    Ok(html(StatusCode::OK, body))
}

#[post("/organizer/registrations/{id}/confirm")]
async fn post_confirm_registration(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<ConfirmForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let registration = registration::confirm_payment(
        get_db_pool(),
        &actor,
        path.into_inner(),
        non_empty(&form.payment_reference),
    )
    .await?;
    Ok(see_other(&format!(
        "/organizer/events/{}",
        registration.event_id
    )))
}

async fn payouts_page(
    client: ClientCtx,
    status: StatusCode,
    amount: String,
    method: String,
    error: Option<String>,
) -> Result<HttpResponse, Error> {
    let actor = client.require_actor()?;
    authorize(&actor, Action::RequestPayout, &Resource::Site)?;
    let db = get_db_pool();

    let balance = payouts::balance(db, actor.id)
        .await
        .map_err(ActionError::from)?;
    let history = payouts::list_for_organizer(db, actor.id)
        .await?
        .into_iter()
        .map(payout_row)
        .collect();

    let body = render(&PayoutsTemplate {
        client,
        balance: balance.into(),
        minimum: format_inr(crate::app_config::payouts().minimum_amount),
        payouts: history,
        amount,
        method,
        error,
    })?;
    Ok(html(status, body))
}

#[get("/organizer/payouts")]
async fn view_payouts(client: ClientCtx) -> Result<impl Responder, Error> {
    payouts_page(client, StatusCode::OK, String::new(), String::new(), None).await
}

#[post("/organizer/payouts")]
async fn post_request_payout(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<PayoutForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let result = match parse_inr(&form.amount) {
        Some(amount) => {
            payouts::request_payout(get_db_pool(), &actor, amount, &form.payout_method).await
        }
        None => Err(ActionError::validation("Please enter a valid amount.")),
    };

    match result {
        Ok(_) => Ok(see_other("/organizer/payouts")),
        Err(err @ ActionError::Validation(_)) => {
            let form = form.into_inner();
            payouts_page(
                client,
                err.status_code(),
                form.amount,
                form.payout_method,
                Some(err.message()),
            )
            .await
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_view_formats_rupees() {
        let view = BalanceView::from(Balance {
            earned: 150_000,
            paid_out: 50_000,
            pending: 20_000,
            available: 100_000,
        });
        assert_eq!(view.earned, "₹1,500.00");
        assert_eq!(view.available, "₹1,000.00");
        assert_eq!(view.pending, "₹200.00");
    }
}
