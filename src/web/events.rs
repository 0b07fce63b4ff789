use crate::cache;
use crate::db::get_db_pool;
use crate::error::ActionError;
use crate::events::{self, registration, EventInput};
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::money::{format_inr, parse_inr, PAISE_PER_RUPEE};
use crate::orm::event_registrations::RegistrationStatus;
use crate::orm::events::{EventStatus, Model as Event, ModerationStatus};
use crate::orm::profiles;
use crate::permission::{Action, Resource};
use crate::web::{
    cached_for_guest, format_datetime, format_datetime_input, html, non_empty, parse_datetime_input,
    render, render_public, see_other,
};
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama::Template;
use sea_orm::EntityTrait;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_events)
        .service(view_create_event)
        .service(post_create_event)
        .service(view_event)
        .service(view_edit_event)
        .service(post_edit_event)
        .service(post_cancel_event)
        .service(post_register)
        .service(post_cancel_registration);
}

/// An event as shown in lists.
pub struct EventCard {
    pub id: i32,
    pub title: String,
    pub city: String,
    pub venue: String,
    pub starts_at: String,
    pub price: String,
    pub spots_left: Option<i32>,
    pub status: &'static str,
    pub moderation: &'static str,
}

pub fn price_label(paise: i64) -> String {
    if paise == 0 {
        "Free".to_string()
    } else {
        format_inr(paise)
    }
}

pub fn status_label(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Draft => "Draft",
        EventStatus::Published => "Published",
        EventStatus::Cancelled => "Cancelled",
    }
}

pub fn moderation_label(status: ModerationStatus) -> &'static str {
    match status {
        ModerationStatus::Pending => "Pending review",
        ModerationStatus::Approved => "Approved",
        ModerationStatus::Rejected => "Rejected",
    }
}

impl From<&Event> for EventCard {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            city: event.city.clone(),
            venue: event.venue.clone(),
            starts_at: format_datetime(&event.starts_at),
            price: price_label(event.ticket_price),
            spots_left: event.spots_left(),
            status: status_label(event.status),
            moderation: moderation_label(event.moderation_status),
        }
    }
}

#[derive(Template)]
#[template(path = "events/list.html")]
struct EventListTemplate<'a> {
    client: ClientCtx,
    city: &'a str,
    events: Vec<EventCard>,
}

pub struct PhotoThumb {
    pub id: i32,
    pub caption: String,
}

#[derive(Template)]
#[template(path = "events/view.html")]
struct EventViewTemplate {
    client: ClientCtx,
    event: EventCard,
    description: String,
    ends_at: Option<String>,
    organizer: String,
    rejection_reason: Option<String>,
    is_listed: bool,
    is_cancelled: bool,
    can_manage: bool,
    /// Any registration, confirmed or awaiting payment.
    registered: bool,
    payment_pending: bool,
    can_upload: bool,
    max_caption_len: usize,
    photos: Vec<PhotoThumb>,
}

#[derive(Template)]
#[template(path = "events/form.html")]
struct EventFormTemplate {
    client: ClientCtx,
    action: String,
    heading: &'static str,
    form: EventForm,
    error: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub city: String,
    pub venue: String,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub ticket_price: Option<String>,
    pub max_attendees: Option<String>,
    pub community_id: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

impl EventForm {
    fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            city: event.city.clone(),
            venue: event.venue.clone(),
            starts_at: format_datetime_input(&event.starts_at),
            ends_at: event.ends_at.as_ref().map(format_datetime_input),
            ticket_price: Some(format!(
                "{}.{:02}",
                event.ticket_price / PAISE_PER_RUPEE,
                event.ticket_price % PAISE_PER_RUPEE
            )),
            max_attendees: event.max_attendees.map(|m| m.to_string()),
            community_id: event.community_id.map(|c| c.to_string()),
            csrf_token: String::new(),
        }
    }

    /// Parses the raw fields. Range checks happen in [`EventInput::check`].
    pub fn to_input(&self) -> Result<EventInput, ActionError> {
        let starts_at = parse_datetime_input(&self.starts_at)
            .ok_or_else(|| ActionError::validation("Please enter a valid start time."))?;
        let ends_at = match non_empty(&self.ends_at) {
            Some(raw) => Some(
                parse_datetime_input(raw)
                    .ok_or_else(|| ActionError::validation("Please enter a valid end time."))?,
            ),
            None => None,
        };
        let ticket_price = match non_empty(&self.ticket_price) {
            Some(raw) => parse_inr(raw)
                .ok_or_else(|| ActionError::validation("Please enter a valid ticket price."))?,
            None => 0,
        };
        let max_attendees = match non_empty(&self.max_attendees) {
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                ActionError::validation("Maximum attendees must be a whole number.")
            })?),
            None => None,
        };
        let community_id = match non_empty(&self.community_id) {
            Some(raw) => Some(
                raw.parse::<i32>()
                    .map_err(|_| ActionError::validation("Unknown community."))?,
            ),
            None => None,
        };

        Ok(EventInput {
            title: self.title.clone(),
            description: self.description.clone(),
            city: self.city.clone(),
            venue: self.venue.clone(),
            starts_at,
            ends_at,
            ticket_price,
            max_attendees,
            community_id,
        })
    }
}

#[derive(Deserialize)]
struct ListQuery {
    city: Option<String>,
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: String,
}

#[get("/events")]
async fn view_events(client: ClientCtx, query: web::Query<ListQuery>) -> Result<impl Responder, Error> {
    let city = non_empty(&query.city).unwrap_or("");
    // Only the unfiltered list is cached.
    if city.is_empty() {
        if let Some(page) = cached_for_guest(&client, &cache::events_index()) {
            return Ok(page);
        }
    }

    let events = events::list_published(get_db_pool(), Some(city))
        .await?
        .iter()
        .map(EventCard::from)
        .collect();

    let tmpl = EventListTemplate {
        client: client.clone(),
        city,
        events,
    };
    if city.is_empty() {
        render_public(&client, cache::events_index(), &tmpl)
    } else {
        Ok(html(actix_web::http::StatusCode::OK, render(&tmpl)?))
    }
}

#[get("/events/create")]
async fn view_create_event(client: ClientCtx) -> Result<impl Responder, Error> {
    let actor = client.require_actor()?;
    crate::permission::authorize(&actor, Action::CreateEvent, &Resource::Site)?;

    let body = render(&EventFormTemplate {
        client,
        action: "/events/create".to_string(),
        heading: "Create an event",
        form: EventForm::default(),
        error: None,
    })?;
    Ok(html(actix_web::http::StatusCode::OK, body))
}

#[post("/events/create")]
async fn post_create_event(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<EventForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let result = match form.to_input() {
        Ok(input) => events::create_event(get_db_pool(), &actor, input).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(event) => Ok(see_other(&format!("/organizer/events/{}", event.id))),
        Err(err @ ActionError::Validation(_)) => {
            let body = render(&EventFormTemplate {
                client,
                action: "/events/create".to_string(),
                heading: "Create an event",
                form: form.into_inner(),
                error: Some(err.message()),
            })?;
            Ok(html(err.status_code(), body))
        }
        Err(err) => Err(err.into()),
    }
}

#[get("/events/{id}")]
async fn view_event(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    let event_id = path.into_inner();
    let page_path = cache::event_page(event_id);
    if let Some(page) = cached_for_guest(&client, &page_path) {
        return Ok(page);
    }

    let db = get_db_pool();
    let actor = client.actor();
    let event = events::get_visible_event(db, actor.as_ref(), event_id).await?;

    let organizer = profiles::Entity::find_by_id(event.organizer_id)
        .one(db)
        .await
        .map_err(ActionError::from)?
        .map(|p| p.display_name)
        .unwrap_or_default();

    let can_manage = client.can(Action::EditEvent, &Resource::OwnedBy(event.organizer_id));
    let registration = match client.get_id() {
        Some(user_id) => registration::find_registration(db, event.id, user_id)
            .await?
            .map(|r| r.status),
        None => None,
    };
    let can_upload = can_manage || registration == Some(RegistrationStatus::Confirmed);

    let photos = crate::photos::list_approved(db, event.id)
        .await?
        .into_iter()
        .map(|p| PhotoThumb {
            id: p.id,
            caption: p.caption.unwrap_or_default(),
        })
        .collect();

    let tmpl = EventViewTemplate {
        client: client.clone(),
        event: EventCard::from(&event),
        description: event.description.clone(),
        ends_at: event.ends_at.as_ref().map(format_datetime),
        organizer,
        rejection_reason: event.rejection_reason.clone(),
        is_listed: event.is_listed(),
        is_cancelled: event.status == EventStatus::Cancelled,
        can_manage,
        registered: registration.is_some(),
        payment_pending: registration == Some(RegistrationStatus::PendingPayment),
        can_upload,
        max_caption_len: crate::photos::MAX_CAPTION_LEN,
        photos,
    };

    render_public(&client, page_path, &tmpl)
}

#[get("/events/{id}/edit")]
async fn view_edit_event(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    let actor = client.require_actor()?;
    let event = events::get_event(get_db_pool(), path.into_inner()).await?;
    crate::permission::authorize(&actor, Action::EditEvent, &Resource::OwnedBy(event.organizer_id))?;

    let body = render(&EventFormTemplate {
        client,
        action: format!("/events/{}/edit", event.id),
        heading: "Edit event",
        form: EventForm::from_event(&event),
        error: None,
    })?;
    Ok(html(actix_web::http::StatusCode::OK, body))
}

#[post("/events/{id}/edit")]
async fn post_edit_event(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<EventForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;
    let event_id = path.into_inner();

    let result = match form.to_input() {
        Ok(input) => events::update_event(get_db_pool(), &actor, event_id, input).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(event) => Ok(see_other(&format!("/events/{}", event.id))),
        Err(err @ ActionError::Validation(_)) => {
            let body = render(&EventFormTemplate {
                client,
                action: format!("/events/{}/edit", event_id),
                heading: "Edit event",
                form: form.into_inner(),
                error: Some(err.message()),
            })?;
            Ok(html(err.status_code(), body))
        }
        Err(err) => Err(err.into()),
    }
}

#[post("/events/{id}/cancel")]
async fn post_cancel_event(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let event = events::cancel_event(get_db_pool(), &actor, path.into_inner()).await?;
    Ok(see_other(&format!("/events/{}", event.id)))
}

#[post("/events/{id}/register")]
async fn post_register(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;
    let event_id = path.into_inner();

    registration::register(get_db_pool(), &actor, event_id).await?;
    Ok(see_other(&format!("/events/{}", event_id)))
}

#[post("/events/{id}/cancel-registration")]
async fn post_cancel_registration(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;
    let event_id = path.into_inner();

    registration::cancel_registration(get_db_pool(), &actor, event_id).await?;
    Ok(see_other(&format!("/events/{}", event_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EventForm {
        EventForm {
            title: "Terraforming Mars league".to_string(),
            description: "Round 3".to_string(),
            city: "Mumbai".to_string(),
            venue: "Meeple Hub".to_string(),
            starts_at: "2026-12-05T17:00".to_string(),
            ends_at: Some(String::new()),
            ticket_price: Some("1,200.50".to_string()),
            max_attendees: Some("12".to_string()),
            community_id: None,
            csrf_token: String::new(),
        }
    }

    #[test]
    fn test_form_parses_into_input() {
        let input = form().to_input().unwrap();
        assert_eq!(input.ticket_price, 120_050);
        assert_eq!(input.max_attendees, Some(12));
        assert_eq!(input.ends_at, None);
        assert_eq!(format_datetime_input(&input.starts_at), "2026-12-05T17:00");
    }

    #[test]
    fn test_blank_price_is_free() {
        let mut f = form();
        f.ticket_price = Some("  ".to_string());
        assert_eq!(f.to_input().unwrap().ticket_price, 0);
        assert_eq!(price_label(0), "Free");
    }

    #[test]
    fn test_upload_form_caption_limit_matches_server() {
        let tmpl = EventViewTemplate {
            client: ClientCtx::default(),
            event: EventCard {
                id: 7,
                title: "Catan night".to_string(),
                city: "Pune".to_string(),
                venue: "Dice & Chai".to_string(),
                starts_at: "Sat, 05 Dec 2026 17:00".to_string(),
                price: price_label(0),
                spots_left: None,
                status: "published",
                moderation: "approved",
            },
            description: String::new(),
            ends_at: None,
            organizer: "Asha".to_string(),
            rejection_reason: None,
            is_listed: true,
            is_cancelled: false,
            can_manage: false,
            registered: true,
            payment_pending: false,
            can_upload: true,
            max_caption_len: crate::photos::MAX_CAPTION_LEN,
            photos: Vec::new(),
        };

        let html = tmpl.render().unwrap();
        let expected = format!(r#"name="caption" maxlength="{}""#, crate::photos::MAX_CAPTION_LEN);
        assert!(html.contains(&expected));
    }

    #[test]
    fn test_bad_fields_are_validation_errors() {
        let mut f = form();
        f.max_attendees = Some("lots".to_string());
        assert!(matches!(f.to_input(), Err(ActionError::Validation(_))));

        let mut f = form();
        f.starts_at = "next friday".to_string();
        assert!(matches!(f.to_input(), Err(ActionError::Validation(_))));
    }
}
