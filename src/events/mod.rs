//! Events: creation, editing, listing and super-admin moderation.

pub mod registration;

use crate::cache;
use crate::error::{ActionError, ActionResult};
use crate::moderation::log_action;
use crate::orm::events::{self, EventStatus, ModerationStatus};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, DatabaseConnection};

/// Validated fields of the create and edit forms.
#[derive(Clone, Debug)]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub city: String,
    pub venue: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    /// Paise. Zero for free events.
    pub ticket_price: i64,
    pub max_attendees: Option<i32>,
    pub community_id: Option<i32>,
}

impl EventInput {
    pub fn check(&self) -> ActionResult<()> {
        let title = self.title.trim();
        if title.len() < 3 || title.len() > 200 {
            return Err(ActionError::validation(
                "Title must be between 3 and 200 characters.",
            ));
        }
        if self.city.trim().is_empty() || self.venue.trim().is_empty() {
            return Err(ActionError::validation("City and venue are required."));
        }
        if self.ticket_price < 0 {
            return Err(ActionError::validation("Ticket price cannot be negative."));
        }
        if matches!(self.max_attendees, Some(max) if max < 1) {
            return Err(ActionError::validation(
                "Maximum attendees must be at least 1.",
            ));
        }
        if matches!(self.ends_at, Some(ends_at) if ends_at <= self.starts_at) {
            return Err(ActionError::validation(
                "The event must end after it starts.",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Target state of a moderation decision. `Ok(None)` means the event is
/// already in the requested state.
pub fn moderation_transition(
    event: &events::Model,
    decision: Decision,
) -> ActionResult<Option<(EventStatus, ModerationStatus)>> {
    match decision {
        Decision::Approve => {
            if event.status == EventStatus::Cancelled {
                return Err(ActionError::validation(
                    "Cancelled events cannot be approved.",
                ));
            }
            match event.moderation_status {
                ModerationStatus::Approved => Ok(None),
                ModerationStatus::Pending | ModerationStatus::Rejected => {
                    Ok(Some((EventStatus::Published, ModerationStatus::Approved)))
                }
            }
        }
        Decision::Reject => match event.moderation_status {
            ModerationStatus::Rejected => Ok(None),
            ModerationStatus::Approved => Err(ActionError::validation(
                "Approved events cannot be rejected.",
            )),
            ModerationStatus::Pending => {
                let status = match event.status {
                    EventStatus::Cancelled => EventStatus::Cancelled,
                    _ => EventStatus::Draft,
                };
                Ok(Some((status, ModerationStatus::Rejected)))
            }
        },
    }
}

pub async fn get_event(db: &DatabaseConnection, event_id: i32) -> ActionResult<events::Model> {
    events::Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("Event"))
}

/// Listed events are public. Drafts, pending and rejected events are only
/// shown to their organizer and admins.
pub async fn get_visible_event(
    db: &DatabaseConnection,
    viewer: Option<&Actor>,
    event_id: i32,
) -> ActionResult<events::Model> {
    let event = get_event(db, event_id).await?;
    if event.is_listed() || event.status == EventStatus::Cancelled {
        return Ok(event);
    }

    let may_see = viewer
        .map(|actor| {
            crate::permission::can(actor, Action::EditEvent, &Resource::OwnedBy(event.organizer_id))
        })
        .unwrap_or(false);

    if may_see {
        Ok(event)
    } else {
        Err(ActionError::NotFound("Event"))
    }
}

pub async fn create_event(
    db: &DatabaseConnection,
    actor: &Actor,
    input: EventInput,
) -> ActionResult<events::Model> {
    authorize(actor, Action::CreateEvent, &Resource::Site)?;
    input.check()?;

    let now = Utc::now().naive_utc();
    let event = events::ActiveModel {
        organizer_id: Set(actor.id),
        community_id: Set(input.community_id),
        title: Set(input.title.trim().to_string()),
        description: Set(input.description),
        city: Set(input.city.trim().to_string()),
        venue: Set(input.venue.trim().to_string()),
        starts_at: Set(input.starts_at),
        ends_at: Set(input.ends_at),
        ticket_price: Set(input.ticket_price),
        max_attendees: Set(input.max_attendees),
        confirmed_count: Set(0),
        status: Set(EventStatus::Draft),
        moderation_status: Set(ModerationStatus::Pending),
        rejection_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("User {} created event {}", actor.id, event.id);
    Ok(event)
}

pub async fn update_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
    input: EventInput,
) -> ActionResult<events::Model> {
    input.check()?;

    let txn = db.begin().await?;

    let event = events::Entity::find_by_id(event_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;
    authorize(actor, Action::EditEvent, &Resource::OwnedBy(event.organizer_id))?;

    if event.status == EventStatus::Cancelled {
        return Err(ActionError::validation("Cancelled events cannot be edited."));
    }
    if let Some(max) = input.max_attendees {
        if max < event.confirmed_count {
            return Err(ActionError::validation(format!(
                "Capacity cannot be lower than the {} confirmed attendees.",
                event.confirmed_count
            )));
        }
    }

    let mut active: events::ActiveModel = event.into();
    active.title = Set(input.title.trim().to_string());
    active.description = Set(input.description);
    active.city = Set(input.city.trim().to_string());
    active.venue = Set(input.venue.trim().to_string());
    active.starts_at = Set(input.starts_at);
    active.ends_at = Set(input.ends_at);
    active.ticket_price = Set(input.ticket_price);
    active.max_attendees = Set(input.max_attendees);
    active.community_id = Set(input.community_id);
    active.updated_at = Set(Utc::now().naive_utc());
    let event = active.update(&txn).await?;

    txn.commit().await?;

    log::info!("User {} updated event {}", actor.id, event.id);
    cache::revalidate_event(event.id);
    Ok(event)
}

pub async fn cancel_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
) -> ActionResult<events::Model> {
    let event = get_event(db, event_id).await?;
    authorize(actor, Action::CancelEvent, &Resource::OwnedBy(event.organizer_id))?;

    if event.status == EventStatus::Cancelled {
        return Ok(event);
    }

    let mut active: events::ActiveModel = event.into();
    active.status = Set(EventStatus::Cancelled);
    active.updated_at = Set(Utc::now().naive_utc());
    let event = active.update(db).await?;

    log::info!("User {} cancelled event {}", actor.id, event.id);
    cache::revalidate_event(event.id);
    Ok(event)
}

pub async fn approve_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
) -> ActionResult<events::Model> {
    moderate_event(db, actor, event_id, Decision::Approve, None).await
}

pub async fn reject_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
    reason: &str,
) -> ActionResult<events::Model> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ActionError::validation("A rejection reason is required."));
    }
    moderate_event(db, actor, event_id, Decision::Reject, Some(reason)).await
}

async fn moderate_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
    decision: Decision,
    reason: Option<&str>,
) -> ActionResult<events::Model> {
    authorize(actor, Action::ModerateEvent, &Resource::Site)?;

    let txn = db.begin().await?;

    let event = events::Entity::find_by_id(event_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;

    let (status, moderation_status) = match moderation_transition(&event, decision)? {
        Some(next) => next,
        None => return Ok(event),
    };

    let mut active: events::ActiveModel = event.into();
    active.status = Set(status);
    active.moderation_status = Set(moderation_status);
    active.rejection_reason = Set(reason.map(|r| r.to_string()));
    active.updated_at = Set(Utc::now().naive_utc());
    let event = active.update(&txn).await?;

    let action = match decision {
        Decision::Approve => "approve_event",
        Decision::Reject => "reject_event",
    };
    log_action(&txn, actor.id, action, "event", event.id, reason).await?;

    txn.commit().await?;

    log::info!("User {} ran {} on event {}", actor.id, action, event.id);
    cache::revalidate_event(event.id);
    Ok(event)
}

/// Upcoming published and approved events, soonest first.
pub async fn list_published(
    db: &DatabaseConnection,
    city: Option<&str>,
) -> ActionResult<Vec<events::Model>> {
    let mut query = events::Entity::find()
        .filter(events::Column::Status.eq(EventStatus::Published))
        .filter(events::Column::ModerationStatus.eq(ModerationStatus::Approved))
        .filter(events::Column::StartsAt.gte(Utc::now().naive_utc()));

    if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
        query = query.filter(events::Column::City.eq(city));
    }

    Ok(query
        .order_by_asc(events::Column::StartsAt)
        .all(db)
        .await?)
}

/// Events waiting for a moderation decision, oldest first.
pub async fn list_pending_moderation(
    db: &DatabaseConnection,
) -> ActionResult<Vec<events::Model>> {
    Ok(events::Entity::find()
        .filter(events::Column::ModerationStatus.eq(ModerationStatus::Pending))
        .filter(events::Column::Status.ne(EventStatus::Cancelled))
        .order_by_asc(events::Column::CreatedAt)
        .all(db)
        .await?)
}

pub async fn list_by_organizer(
    db: &DatabaseConnection,
    organizer_id: i32,
) -> ActionResult<Vec<events::Model>> {
    Ok(events::Entity::find()
        .filter(events::Column::OrganizerId.eq(organizer_id))
        .order_by_desc(events::Column::StartsAt)
        .all(db)
        .await?)
}

pub async fn list_by_community(
    db: &DatabaseConnection,
    community_id: i32,
) -> ActionResult<Vec<events::Model>> {
    Ok(events::Entity::find()
        .filter(events::Column::CommunityId.eq(community_id))
        .filter(events::Column::Status.eq(EventStatus::Published))
        .filter(events::Column::ModerationStatus.eq(ModerationStatus::Approved))
        .order_by_asc(events::Column::StartsAt)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(status: EventStatus, moderation_status: ModerationStatus) -> events::Model {
        let now = Utc::now().naive_utc();
        events::Model {
            id: 1,
            organizer_id: 2,
            community_id: None,
            title: "Catan night".to_string(),
            description: String::new(),
            city: "Pune".to_string(),
            venue: "Dice Cafe".to_string(),
            starts_at: now + Duration::days(7),
            ends_at: None,
            ticket_price: 0,
            max_attendees: None,
            confirmed_count: 0,
            status,
            moderation_status,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_approve_from_pending_or_rejected() {
        let next = moderation_transition(
            &event(EventStatus::Draft, ModerationStatus::Pending),
            Decision::Approve,
        )
        .unwrap();
        assert_eq!(next, Some((EventStatus::Published, ModerationStatus::Approved)));

        let next = moderation_transition(
            &event(EventStatus::Draft, ModerationStatus::Rejected),
            Decision::Approve,
        )
        .unwrap();
        assert_eq!(next, Some((EventStatus::Published, ModerationStatus::Approved)));
    }

    #[test]
    fn test_repeated_decisions_are_noops() {
        let approved = event(EventStatus::Published, ModerationStatus::Approved);
        assert_eq!(moderation_transition(&approved, Decision::Approve).unwrap(), None);

        let rejected = event(EventStatus::Draft, ModerationStatus::Rejected);
        assert_eq!(moderation_transition(&rejected, Decision::Reject).unwrap(), None);
    }

    #[test]
    fn test_refused_transitions() {
        let approved = event(EventStatus::Published, ModerationStatus::Approved);
        assert!(moderation_transition(&approved, Decision::Reject).is_err());

        let cancelled = event(EventStatus::Cancelled, ModerationStatus::Pending);
        assert!(moderation_transition(&cancelled, Decision::Approve).is_err());
    }

    #[test]
    fn test_reject_sends_back_to_draft() {
        let next = moderation_transition(
            &event(EventStatus::Draft, ModerationStatus::Pending),
            Decision::Reject,
        )
        .unwrap();
        assert_eq!(next, Some((EventStatus::Draft, ModerationStatus::Rejected)));
    }

    #[test]
    fn test_input_check() {
        let now = Utc::now().naive_utc();
        let mut input = EventInput {
            title: "Gloomhaven campaign".to_string(),
            description: String::new(),
            city: "Bengaluru".to_string(),
            venue: "Board Room".to_string(),
            starts_at: now,
            ends_at: Some(now + Duration::hours(4)),
            ticket_price: 25_000,
            max_attendees: Some(8),
            community_id: None,
        };
        assert!(input.check().is_ok());

        input.ends_at = Some(now - Duration::hours(1));
        assert!(input.check().is_err());

        input.ends_at = None;
        input.max_attendees = Some(0);
        assert!(input.check().is_err());
    }
}
