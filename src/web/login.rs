use crate::auth;
use crate::db::get_db_pool;
use crate::error::ActionError;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::session;
use crate::web::{html, render, see_other};
use actix_web::{get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_login).service(post_login);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub client: ClientCtx,
    pub email: &'a str,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct FormData {
    email: String,
    password: String,
    csrf_token: String,
}

#[get("/login")]
pub async fn view_login(client: ClientCtx) -> impl Responder {
    if client.is_user() {
        return see_other("/");
    }

    LoginTemplate {
        client,
        email: "",
        error: None,
    }
    .to_response()
}

#[post("/login")]
pub async fn post_login(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;

    match auth::sign_in(get_db_pool(), &form.email, &form.password).await {
        Ok(profile) => {
            session::start_session(&cookies, profile.id)?;
            Ok(see_other("/"))
        }
        Err(err @ ActionError::InvalidCredentials) => {
            let body = render(&LoginTemplate {
                client,
                email: form.email.trim(),
                error: Some(err.message()),
            })?;
            Ok(html(actix_web::http::StatusCode::UNAUTHORIZED, body))
        }
        Err(err) => Err(err.into()),
    }
}
