//! Forgotten password flow.

use crate::auth;
use crate::db::get_db_pool;
use crate::email;
use crate::error::ActionError;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::web::{html, render};
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama::Template;
use askama_actix::TemplateToResponse;
use serde::Deserialize;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_forgot_password)
        .service(post_forgot_password)
        .service(view_reset_password)
        .service(post_reset_password);
}

#[derive(Template)]
#[template(path = "forgot_password.html")]
struct ForgotPasswordTemplate {
    client: ClientCtx,
    error: Option<String>,
    sent: bool,
}

#[derive(Template)]
#[template(path = "reset_password.html")]
struct ResetPasswordTemplate {
    client: ClientCtx,
    token: String,
    error: Option<String>,
    done: bool,
}

#[derive(Deserialize, Validate)]
struct ForgotForm {
    #[validate(email)]
    email: String,
    csrf_token: String,
}

#[derive(Deserialize)]
struct ResetQuery {
    token: Option<String>,
}

#[derive(Deserialize, Validate)]
struct ResetForm {
    token: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    password_confirm: String,
    csrf_token: String,
}

#[get("/forgot-password")]
async fn view_forgot_password(client: ClientCtx) -> impl Responder {
    ForgotPasswordTemplate {
        client,
        error: None,
        sent: false,
    }
    .to_response()
}

/// Responds the same way whether or not the email has an account.
#[post("/forgot-password")]
async fn post_forgot_password(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<ForgotForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;

    if let Err(e) = form.validate() {
        let err = ActionError::from(e);
        let body = render(&ForgotPasswordTemplate {
            client,
            error: Some(err.message()),
            sent: false,
        })?;
        return Ok(html(err.status_code(), body));
    }

    if let Some((profile, token)) = auth::request_password_reset(get_db_pool(), &form.email).await? {
        let message = email::password_reset_email(&profile.email, &profile.display_name, &token);
        if let Err(e) = email::send_email(&message).await {
            log::error!("Failed to send password reset email to user {}: {}", profile.id, e);
        }
    }

    let body = render(&ForgotPasswordTemplate {
        client,
        error: None,
        sent: true,
    })?;
    Ok(html(actix_web::http::StatusCode::OK, body))
}

#[get("/reset-password")]
async fn view_reset_password(client: ClientCtx, query: web::Query<ResetQuery>) -> impl Responder {
    ResetPasswordTemplate {
        client,
        token: query.into_inner().token.unwrap_or_default(),
        error: None,
        done: false,
    }
    .to_response()
}

#[post("/reset-password")]
async fn post_reset_password(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<ResetForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;

    let result = match form.validate() {
        Err(e) => Err(ActionError::from(e)),
        Ok(()) if form.password != form.password_confirm => {
            Err(ActionError::validation("Passwords do not match."))
        }
        Ok(()) => auth::reset_password(get_db_pool(), &form.token, &form.password)
            .await
            .map(|_| ()),
    };

    let (status, error, done) = match result {
        Ok(()) => (actix_web::http::StatusCode::OK, None, true),
        Err(err @ ActionError::Validation(_)) => (err.status_code(), Some(err.message()), false),
        Err(err) => return Err(err.into()),
    };

    let body = render(&ResetPasswordTemplate {
        client,
        token: form.token.clone(),
        error,
        done,
    })?;
    Ok(html(status, body))
}
