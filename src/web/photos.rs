use crate::app_config;
use crate::db::get_db_pool;
use crate::error::ActionError;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::orm::event_photos::PhotoStatus;
use crate::permission::{Action, Resource};
use crate::photos;
use crate::storage::StorageBackend;
use crate::web::see_other;
use actix_multipart::Multipart;
use actix_web::http::header::{self, CacheControl, CacheDirective};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_upload_photo)
        .service(view_photo)
        .service(view_photo_file)
        .service(post_approve_photo)
        .service(post_reject_photo);
}

#[derive(Template)]
#[template(path = "photos/view.html")]
struct PhotoTemplate {
    client: ClientCtx,
    id: i32,
    event_id: i32,
    event_title: String,
    caption: String,
    status: &'static str,
    can_moderate: bool,
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: String,
}

fn status_label(status: PhotoStatus) -> &'static str {
    match status {
        PhotoStatus::Pending => "Pending review",
        PhotoStatus::Approved => "Approved",
        PhotoStatus::Rejected => "Rejected",
    }
}

/// Type the browser declared for the file part. upload_photo checks it
/// against the file's leading bytes.
fn upload_content_type(declared: Option<&str>) -> String {
    declared
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Reads one multipart field, refusing to buffer more than `limit` bytes.
async fn read_field(field: &mut actix_multipart::Field, limit: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|_| error::ErrorBadRequest("Read error"))?;
        if buf.len() + chunk.len() > limit {
            return Err(ActionError::validation(format!(
                "Photos must be {} MB or smaller.",
                limit / (1024 * 1024)
            ))
            .into());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

#[post("/events/{id}/photos")]
async fn post_upload_photo(
    client: ClientCtx,
    cookies: actix_session::Session,
    storage: web::Data<dyn StorageBackend>,
    path: web::Path<i32>,
    mut multipart: Multipart,
) -> Result<HttpResponse, Error> {
    let actor = client.require_actor()?;
    let event_id = path.into_inner();
    let config = app_config::uploads();

    let mut csrf_token: Option<String> = None;
    let mut caption: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;
    let mut declared_type: Option<String> = None;

    while let Ok(Some(mut field)) = multipart.try_next().await {
        let field_name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_string();

        match field_name.as_str() {
            "csrf_token" => {
                let buf = read_field(&mut field, 256).await?;
                csrf_token = Some(String::from_utf8_lossy(&buf).to_string());
            }
            "caption" => {
                let buf = read_field(&mut field, 4096).await?;
                caption = Some(String::from_utf8_lossy(&buf).to_string());
            }
            "photo" => {
                declared_type = field.content_type().map(|m| m.essence_str().to_string());
                data = Some(read_field(&mut field, config.max_photo_bytes).await?);
            }
            _ => {}
        }
    }

    validate_csrf_token(&cookies, csrf_token.as_deref().unwrap_or(""))?;

    let data = data.unwrap_or_default();
    let content_type = upload_content_type(declared_type.as_deref());

    photos::upload_photo(
        get_db_pool(),
        storage.get_ref(),
        &config,
        &actor,
        event_id,
        &content_type,
        data,
        caption.as_deref(),
    )
    .await?;

    Ok(see_other(&format!("/events/{}", event_id)))
}

#[get("/photos/{id}")]
async fn view_photo(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    let actor = client.actor();
    let (photo, event) = photos::get_photo(get_db_pool(), actor.as_ref(), path.into_inner()).await?;
    let can_moderate = client.can(Action::ModeratePhoto, &Resource::OwnedBy(event.organizer_id));

    Ok(PhotoTemplate {
        client,
        id: photo.id,
        event_id: event.id,
        event_title: event.title,
        caption: photo.caption.unwrap_or_default(),
        status: status_label(photo.status),
        can_moderate,
    }
    .to_response())
}

#[get("/photos/{id}/file")]
async fn view_photo_file(
    client: ClientCtx,
    storage: web::Data<dyn StorageBackend>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let actor = client.actor();
    let (photo, object) =
        photos::open_photo(get_db_pool(), storage.get_ref(), actor.as_ref(), path.into_inner())
            .await?;

    let cache_control = if photo.status == PhotoStatus::Approved {
        CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(86_400)])
    } else {
        CacheControl(vec![CacheDirective::Private, CacheDirective::NoStore])
    };

    let mut response = HttpResponse::Ok();
    response
        .insert_header((header::CONTENT_TYPE, photo.content_type.as_str()))
        .insert_header(cache_control);
    if let Some(len) = object.content_length {
        response.no_chunking(len as u64);
    }

    Ok(response.streaming(object.body))
}

async fn moderate(
    client: ClientCtx,
    cookies: actix_session::Session,
    photo_id: i32,
    csrf_token: &str,
    approve: bool,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, csrf_token)?;
    let actor = client.require_actor()?;

    let photo = photos::moderate_photo(get_db_pool(), &actor, photo_id, approve).await?;
    Ok(see_other(&format!("/organizer/events/{}", photo.event_id)))
}

#[post("/photos/{id}/approve")]
async fn post_approve_photo(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    moderate(client, cookies, path.into_inner(), &form.csrf_token, true).await
}

#[post("/photos/{id}/reject")]
async fn post_reject_photo(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    moderate(client, cookies, path.into_inner(), &form.csrf_token, false).await
}
