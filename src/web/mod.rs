pub mod admin;
pub mod communities;
pub mod discussions;
pub mod error;
pub mod events;
pub mod index;
pub mod login;
pub mod logout;
pub mod organizer;
pub mod password_reset;
pub mod photos;
pub mod signup;

use crate::cache;
use crate::middleware::ClientCtx;
use actix_web::http::header::{self, ContentType};
use actix_web::{Error, HttpResponse};
use askama::Template;
use chrono::NaiveDateTime;

/// Configures the web app by adding services from each web file.
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Route resolution stops at the first match, so literal segments such as
    // /events/create are registered before /events/{id}.
    index::configure(conf);
    login::configure(conf);
    signup::configure(conf);
    logout::configure(conf);
    password_reset::configure(conf);
    events::configure(conf);
    photos::configure(conf);
    discussions::configure(conf);
    communities::configure(conf);
    organizer::configure(conf);
    admin::configure(conf);
}

/// 303 redirect after a successful form post.
pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn html(status: actix_web::http::StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header(ContentType::html())
        .body(body)
}

pub fn render<T: Template>(tmpl: &T) -> Result<String, Error> {
    tmpl.render().map_err(|e| {
        log::error!("Template render failed: {}", e);
        actix_web::error::ErrorInternalServerError("Template error")
    })
}

/// Guests get the cached copy of public pages when there is one.
pub fn cached_for_guest(client: &ClientCtx, path: &str) -> Option<HttpResponse> {
    if client.is_user() {
        return None;
    }
    cache::get_page(path).map(|body| html(actix_web::http::StatusCode::OK, body))
}

/// Renders a public page, caching the result when the viewer is a guest.
pub fn render_public<T: Template>(client: &ClientCtx, path: String, tmpl: &T) -> Result<HttpResponse, Error> {
    let body = render(tmpl)?;
    if !client.is_user() {
        cache::put_page(path, body.clone());
    }
    Ok(html(actix_web::http::StatusCode::OK, body))
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%a, %d %b %Y %H:%M").to_string()
}

/// Value for an `<input type="datetime-local">`.
pub fn format_datetime_input(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M").to_string()
}

pub fn parse_datetime_input(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Empty form fields become None.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
