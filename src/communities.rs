//! City and interest communities with open membership.

use crate::cache;
use crate::error::{ActionError, ActionResult};
use crate::orm::{communities, community_members, discussions, events};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{entity::*, query::*, DatabaseConnection};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug regex is valid"));

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= 64 && SLUG_RE.is_match(slug)
}

pub async fn create_community(
    db: &DatabaseConnection,
    actor: &Actor,
    slug: &str,
    name: &str,
    description: &str,
    city: Option<&str>,
) -> ActionResult<communities::Model> {
    authorize(actor, Action::CreateCommunity, &Resource::Site)?;

    let slug = slug.trim();
    if !is_valid_slug(slug) {
        return Err(ActionError::validation(
            "Slugs use lowercase letters, digits and single dashes.",
        ));
    }
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ActionError::validation(
            "Name must be between 1 and 100 characters.",
        ));
    }

    let txn = db.begin().await?;

    let taken = communities::Entity::find()
        .filter(communities::Column::Slug.eq(slug))
        .count(&txn)
        .await?;
    if taken > 0 {
        return Err(ActionError::conflict("That community URL is already taken."));
    }

    let now = Utc::now().naive_utc();
    let community = communities::ActiveModel {
        slug: Set(slug.to_string()),
        name: Set(name.to_string()),
        description: Set(description.trim().to_string()),
        city: Set(city.map(str::trim).filter(|c| !c.is_empty()).map(|c| c.to_string())),
        owner_id: Set(actor.id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    community_members::ActiveModel {
        community_id: Set(community.id),
        user_id: Set(actor.id),
        joined_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    log::info!("User {} created community {}", actor.id, community.slug);
    cache::revalidate(&cache::communities_index());
    Ok(community)
}

pub async fn get_by_slug(db: &DatabaseConnection, slug: &str) -> ActionResult<communities::Model> {
    communities::Entity::find()
        .filter(communities::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("Community"))
}

pub async fn list_communities(db: &DatabaseConnection) -> ActionResult<Vec<communities::Model>> {
    Ok(communities::Entity::find()
        .order_by_asc(communities::Column::Name)
        .all(db)
        .await?)
}

pub async fn is_member(db: &DatabaseConnection, community_id: i32, user_id: i32) -> ActionResult<bool> {
    let count = community_members::Entity::find()
        .filter(community_members::Column::CommunityId.eq(community_id))
        .filter(community_members::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn member_count(db: &DatabaseConnection, community_id: i32) -> ActionResult<usize> {
    Ok(community_members::Entity::find()
        .filter(community_members::Column::CommunityId.eq(community_id))
        .count(db)
        .await?)
}

/// Joining twice is a no-op.
pub async fn join(db: &DatabaseConnection, actor: &Actor, slug: &str) -> ActionResult<communities::Model> {
    let community = get_by_slug(db, slug).await?;

    if !is_member(db, community.id, actor.id).await? {
        community_members::ActiveModel {
            community_id: Set(community.id),
            user_id: Set(actor.id),
            joined_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        log::info!("User {} joined community {}", actor.id, community.slug);
        cache::revalidate(&cache::community_page(&community.slug));
    }

    Ok(community)
}

/// Leaving a community you are not in is a no-op. Owners cannot leave.
pub async fn leave(db: &DatabaseConnection, actor: &Actor, slug: &str) -> ActionResult<communities::Model> {
    let community = get_by_slug(db, slug).await?;

    if community.owner_id == actor.id {
        return Err(ActionError::validation(
            "The owner cannot leave their own community.",
        ));
    }

    let res = community_members::Entity::delete_many()
        .filter(community_members::Column::CommunityId.eq(community.id))
        .filter(community_members::Column::UserId.eq(actor.id))
        .exec(db)
        .await?;

    if res.rows_affected > 0 {
        log::info!("User {} left community {}", actor.id, community.slug);
        cache::revalidate(&cache::community_page(&community.slug));
    }

    Ok(community)
}

pub struct CommunityPage {
    pub community: communities::Model,
    pub members: usize,
    pub events: Vec<events::Model>,
    pub discussions: Vec<discussions::Model>,
}

/// A community with its published events and its discussions.
pub async fn community_page(db: &DatabaseConnection, slug: &str) -> ActionResult<CommunityPage> {
    let community = get_by_slug(db, slug).await?;
    let members = member_count(db, community.id).await?;
    let events = crate::events::list_by_community(db, community.id).await?;
    let discussions = discussions::Entity::find()
        .filter(discussions::Column::CommunityId.eq(community.id))
        .order_by_desc(discussions::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(CommunityPage {
        community,
        members,
        events,
        discussions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs() {
        assert!(is_valid_slug("pune-boardgamers"));
        assert!(is_valid_slug("blr2024"));
        assert!(!is_valid_slug("Pune"));
        assert!(!is_valid_slug("double--dash"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("spaces here"));
    }
}
