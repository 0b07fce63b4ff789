use crate::auth;
use crate::db::get_db_pool;
use crate::error::ActionError;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::session;
use crate::web::{html, render, see_other};
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama::Template;
use askama_actix::TemplateToResponse;
use serde::Deserialize;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_signup).service(post_signup);
}

#[derive(Template)]
#[template(path = "signup.html")]
struct SignupTemplate<'a> {
    client: ClientCtx,
    email: &'a str,
    display_name: &'a str,
    error: Option<String>,
}

#[derive(Deserialize, Validate)]
struct FormData {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(min = 8, max = 128))]
    password_confirm: String,
    #[validate(length(min = 1, max = 80))]
    display_name: String,
    csrf_token: String,
}

#[get("/signup")]
async fn view_signup(client: ClientCtx) -> impl Responder {
    if client.is_user() {
        return see_other("/");
    }

    SignupTemplate {
        client,
        email: "",
        display_name: "",
        error: None,
    }
    .to_response()
}

#[post("/signup")]
async fn post_signup(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;

    let result = match form.validate() {
        Err(e) => Err(ActionError::from(e)),
        Ok(()) if form.password != form.password_confirm => {
            Err(ActionError::validation("Passwords do not match."))
        }
        Ok(()) => {
            auth::sign_up(get_db_pool(), &form.email, &form.password, &form.display_name).await
        }
    };

    match result {
        Ok(profile) => {
            session::start_session(&cookies, profile.id)?;
            Ok(see_other("/"))
        }
        Err(err @ (ActionError::Validation(_) | ActionError::Conflict(_))) => {
            let body = render(&SignupTemplate {
                client,
                email: form.email.trim(),
                display_name: form.display_name.trim(),
                error: Some(err.message()),
            })?;
            Ok(html(err.status_code(), body))
        }
        Err(err) => Err(err.into()),
    }
}
