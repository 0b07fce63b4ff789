use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::session::end_session;
use crate::web::see_other;
use actix_web::{get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_logout).service(post_logout);
}

#[derive(Template)]
#[template(path = "logout.html")]
struct LogoutTemplate {
    client: ClientCtx,
}

#[derive(Deserialize)]
struct FormData {
    csrf_token: String,
}

/// Confirmation page. Signing out itself is a POST.
#[get("/logout")]
async fn view_logout(client: ClientCtx) -> impl Responder {
    if !client.is_user() {
        return see_other("/");
    }
    LogoutTemplate { client }.to_response()
}

#[post("/logout")]
async fn post_logout(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;

    if let Some(id) = client.get_id() {
        log::info!("User {} signed out", id);
    }
    end_session(&cookies);

    Ok(see_other("/"))
}
