//! Event photo uploads, moderation and access control.

use crate::app_config::UploadConfig;
use crate::cache;
use crate::error::{ActionError, ActionResult};
use crate::moderation::log_action;
use crate::orm::event_photos::{self, PhotoStatus};
use crate::orm::event_registrations::{self, RegistrationStatus};
use crate::orm::events;
use crate::permission::{self, authorize, Action, Actor, Resource};
use crate::storage::{StorageBackend, StorageObject};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};

pub const MAX_CAPTION_LEN: usize = 300;

/// File extension for an accepted image type.
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Image type from the file's leading bytes.
pub fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Validates an upload and returns the extension its storage key gets.
pub fn check_upload(
    content_type: &str,
    data: &[u8],
    config: &UploadConfig,
) -> ActionResult<&'static str> {
    if data.is_empty() {
        return Err(ActionError::validation("Please choose a photo to upload."));
    }
    if data.len() > config.max_photo_bytes {
        return Err(ActionError::validation(format!(
            "Photos must be {} MB or smaller.",
            config.max_photo_bytes / (1024 * 1024)
        )));
    }
    if !config.allowed_types.iter().any(|t| t == content_type) {
        return Err(ActionError::validation(
            "Only JPEG, PNG, WebP and GIF images are allowed.",
        ));
    }
    if sniff_image_type(data) != Some(content_type) {
        return Err(ActionError::validation(
            "The file does not look like the image type it claims to be.",
        ));
    }

    extension_for(content_type)
        .ok_or_else(|| ActionError::validation("Only JPEG, PNG, WebP and GIF images are allowed."))
}

/// Next status for a moderation decision. None when it is already there.
pub fn photo_transition(current: PhotoStatus, approve: bool) -> Option<PhotoStatus> {
    match (current, approve) {
        (PhotoStatus::Approved, true) | (PhotoStatus::Rejected, false) => None,
        (_, true) => Some(PhotoStatus::Approved),
        (_, false) => Some(PhotoStatus::Rejected),
    }
}

/// Approved photos are public. Pending and rejected ones are visible to the
/// uploader, the event organizer and admins.
pub fn can_view(viewer: Option<&Actor>, photo: &event_photos::Model, event: &events::Model) -> bool {
    if photo.status == PhotoStatus::Approved {
        return true;
    }
    match viewer {
        Some(actor) => {
            actor.id == photo.uploader_id
                || permission::can(actor, Action::ModeratePhoto, &Resource::OwnedBy(event.organizer_id))
        }
        None => false,
    }
}

async fn is_confirmed_attendee(
    db: &DatabaseConnection,
    event_id: i32,
    user_id: i32,
) -> ActionResult<bool> {
    let count = event_registrations::Entity::find()
        .filter(event_registrations::Column::EventId.eq(event_id))
        .filter(event_registrations::Column::UserId.eq(user_id))
        .filter(event_registrations::Column::Status.eq(RegistrationStatus::Confirmed))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn upload_photo(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    config: &UploadConfig,
    actor: &Actor,
    event_id: i32,
    content_type: &str,
    data: Vec<u8>,
    caption: Option<&str>,
) -> ActionResult<event_photos::Model> {
    authorize(actor, Action::UploadPhoto, &Resource::Site)?;

    let event = events::Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;

    let is_host = permission::can(actor, Action::EditEvent, &Resource::OwnedBy(event.organizer_id));
    if !is_host && !is_confirmed_attendee(db, event_id, actor.id).await? {
        return Err(ActionError::unauthorized(
            "Only confirmed attendees can upload photos for this event.",
        ));
    }

    let caption = caption
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());
    if matches!(&caption, Some(c) if c.chars().count() > MAX_CAPTION_LEN) {
        return Err(ActionError::validation(format!(
            "Captions cannot be longer than {} characters.",
            MAX_CAPTION_LEN
        )));
    }

    let ext = check_upload(content_type, &data, config)?;
    let storage_key = format!("{}.{}", uuid::Uuid::new_v4().simple(), ext);
    let byte_size = data.len() as i64;

    // The row goes in first. A failed store rolls it back, so no row ever
    // points at a missing object.
    let txn = db.begin().await?;

    let photo = event_photos::ActiveModel {
        event_id: Set(event_id),
        uploader_id: Set(actor.id),
        storage_key: Set(storage_key.clone()),
        content_type: Set(content_type.to_string()),
        byte_size: Set(byte_size),
        caption: Set(caption),
        status: Set(PhotoStatus::Pending),
        reviewed_by: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    storage.put_object(&storage_key, data, content_type).await?;
    txn.commit().await?;

    log::info!(
        "User {} uploaded photo {} for event {}",
        actor.id,
        photo.id,
        event_id
    );
    Ok(photo)
}

pub async fn moderate_photo(
    db: &DatabaseConnection,
    actor: &Actor,
    photo_id: i32,
    approve: bool,
) -> ActionResult<event_photos::Model> {
    let txn = db.begin().await?;

    let (photo, event) = event_photos::Entity::find_by_id(photo_id)
        .find_also_related(events::Entity)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Photo"))?;
    let event = event.ok_or(ActionError::NotFound("Event"))?;

    authorize(actor, Action::ModeratePhoto, &Resource::OwnedBy(event.organizer_id))?;

    let status = match photo_transition(photo.status, approve) {
        Some(status) => status,
        None => return Ok(photo),
    };

    let mut active: event_photos::ActiveModel = photo.into();
    active.status = Set(status);
    active.reviewed_by = Set(Some(actor.id));
    let photo = active.update(&txn).await?;

    let action = if approve { "approve_photo" } else { "reject_photo" };
    log_action(&txn, actor.id, action, "photo", photo.id, None).await?;

    txn.commit().await?;

    log::info!("User {} ran {} on photo {}", actor.id, action, photo.id);
    cache::revalidate(&cache::event_page(event.id));
    Ok(photo)
}

pub async fn list_approved(
    db: &DatabaseConnection,
    event_id: i32,
) -> ActionResult<Vec<event_photos::Model>> {
    Ok(event_photos::Entity::find()
        .filter(event_photos::Column::EventId.eq(event_id))
        .filter(event_photos::Column::Status.eq(PhotoStatus::Approved))
        .order_by_asc(event_photos::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Every photo of an event, for its organizer or an admin.
pub async fn list_for_review(
    db: &DatabaseConnection,
    actor: &Actor,
    event: &events::Model,
) -> ActionResult<Vec<event_photos::Model>> {
    authorize(actor, Action::ModeratePhoto, &Resource::OwnedBy(event.organizer_id))?;

    Ok(event_photos::Entity::find()
        .filter(event_photos::Column::EventId.eq(event.id))
        .order_by_asc(event_photos::Column::Status)
        .order_by_desc(event_photos::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Loads a photo row the viewer may see.
pub async fn get_photo(
    db: &DatabaseConnection,
    viewer: Option<&Actor>,
    photo_id: i32,
) -> ActionResult<(event_photos::Model, events::Model)> {
    let (photo, event) = event_photos::Entity::find_by_id(photo_id)
        .find_also_related(events::Entity)
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("Photo"))?;
    let event = event.ok_or(ActionError::NotFound("Photo"))?;

    if can_view(viewer, &photo, &event) {
        Ok((photo, event))
    } else {
        Err(ActionError::NotFound("Photo"))
    }
}

/// Opens the stored bytes of a photo the viewer may see.
pub async fn open_photo(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    viewer: Option<&Actor>,
    photo_id: i32,
) -> ActionResult<(event_photos::Model, StorageObject)> {
    let (photo, _) = get_photo(db, viewer, photo_id).await?;
    let object = storage.get_object(&photo.storage_key).await?;
    Ok((photo, object))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(PNG), Some("image/png"));
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(b"GIF89a..."), Some("image/gif"));
        assert_eq!(sniff_image_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_type(b"<svg></svg>"), None);
    }

    #[test]
    fn test_check_upload() {
        let config = UploadConfig::default();
        assert_eq!(check_upload("image/png", PNG, &config).unwrap(), "png");

        // Declared type must match the content.
        assert!(check_upload("image/jpeg", PNG, &config).is_err());
        assert!(check_upload("image/svg+xml", b"<svg/>", &config).is_err());
        assert!(check_upload("image/png", b"", &config).is_err());
    }

    #[test]
    fn test_check_upload_size_limit() {
        let config = UploadConfig::default();
        let mut big = PNG.to_vec();
        big.resize(config.max_photo_bytes + 1, 0);
        let err = check_upload("image/png", &big, &config).unwrap_err();
        assert_eq!(err.message(), "Photos must be 5 MB or smaller.");

        big.truncate(config.max_photo_bytes);
        assert!(check_upload("image/png", &big, &config).is_ok());
    }

    #[test]
    fn test_photo_transition() {
        assert_eq!(photo_transition(PhotoStatus::Pending, true), Some(PhotoStatus::Approved));
        assert_eq!(photo_transition(PhotoStatus::Rejected, true), Some(PhotoStatus::Approved));
        assert_eq!(photo_transition(PhotoStatus::Approved, false), Some(PhotoStatus::Rejected));
        assert_eq!(photo_transition(PhotoStatus::Approved, true), None);
        assert_eq!(photo_transition(PhotoStatus::Rejected, false), None);
    }
}
