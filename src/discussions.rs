//! Discussions, threaded comments and best-answer marking.

use crate::cache;
use crate::error::{ActionError, ActionResult};
use crate::orm::{communities, discussion_comments, discussions, profiles};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection};

const MAX_CONTENT_LEN: usize = 10_000;

fn check_content(content: &str) -> ActionResult<()> {
    let len = content.trim().chars().count();
    if len == 0 {
        return Err(ActionError::validation("Content cannot be empty."));
    }
    if len > MAX_CONTENT_LEN {
        return Err(ActionError::validation(format!(
            "Content cannot be longer than {} characters.",
            MAX_CONTENT_LEN
        )));
    }
    Ok(())
}

pub async fn create_discussion(
    db: &DatabaseConnection,
    actor: &Actor,
    community_id: Option<i32>,
    title: &str,
    content: &str,
) -> ActionResult<discussions::Model> {
    authorize(actor, Action::CreateDiscussion, &Resource::Site)?;

    let title = title.trim();
    let title_len = title.chars().count();
    if !(3..=200).contains(&title_len) {
        return Err(ActionError::validation(
            "Title must be between 3 and 200 characters.",
        ));
    }
    check_content(content)?;

    let community = match community_id {
        Some(community_id) => Some(
            communities::Entity::find_by_id(community_id)
                .one(db)
                .await?
                .ok_or(ActionError::NotFound("Community"))?,
        ),
        None => None,
    };

    let now = Utc::now().naive_utc();
    let discussion = discussions::ActiveModel {
        community_id: Set(community_id),
        author_id: Set(actor.id),
        title: Set(title.to_string()),
        content: Set(content.trim().to_string()),
        upvotes: Set(0),
        downvotes: Set(0),
        comment_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("User {} started discussion {}", actor.id, discussion.id);
    cache::revalidate_all([cache::home(), cache::discussions_index()]);
    if let Some(community) = community {
        cache::revalidate(&cache::community_page(&community.slug));
    }
    Ok(discussion)
}

pub async fn add_comment(
    db: &DatabaseConnection,
    actor: &Actor,
    discussion_id: i32,
    parent_id: Option<i32>,
    content: &str,
) -> ActionResult<discussion_comments::Model> {
    authorize(actor, Action::Comment, &Resource::Site)?;
    check_content(content)?;

    let txn = db.begin().await?;

    discussions::Entity::find_by_id(discussion_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Discussion"))?;

    if let Some(parent_id) = parent_id {
        let parent = discussion_comments::Entity::find_by_id(parent_id)
            .one(&txn)
            .await?
            .ok_or(ActionError::NotFound("Comment"))?;
        if parent.discussion_id != discussion_id {
            return Err(ActionError::validation(
                "You can only reply to comments in the same discussion.",
            ));
        }
    }

    let comment = discussion_comments::ActiveModel {
        discussion_id: Set(discussion_id),
        author_id: Set(actor.id),
        parent_id: Set(parent_id),
        content: Set(content.trim().to_string()),
        upvotes: Set(0),
        downvotes: Set(0),
        is_best_answer: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    discussions::Entity::update_many()
        .col_expr(
            discussions::Column::CommentCount,
            Expr::col(discussions::Column::CommentCount).add(1),
        )
        .filter(discussions::Column::Id.eq(discussion_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    log::info!(
        "User {} commented {} on discussion {}",
        actor.id,
        comment.id,
        discussion_id
    );
    cache::revalidate_discussion(discussion_id);
    Ok(comment)
}

/// Flags `comment_id` as the accepted answer, clearing any other. Marking
/// the current best answer again clears it. Returns the best answer after
/// the call.
pub async fn mark_best_answer(
    db: &DatabaseConnection,
    actor: &Actor,
    discussion_id: i32,
    comment_id: i32,
) -> ActionResult<Option<i32>> {
    let txn = db.begin().await?;

    let discussion = discussions::Entity::find_by_id(discussion_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Discussion"))?;
    authorize(
        actor,
        Action::MarkBestAnswer,
        &Resource::OwnedBy(discussion.author_id),
    )?;

    let comment = discussion_comments::Entity::find_by_id(comment_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("Comment"))?;
    if comment.discussion_id != discussion_id {
        return Err(ActionError::validation(
            "That comment belongs to a different discussion.",
        ));
    }

    let was_best = comment.is_best_answer;

    discussion_comments::Entity::update_many()
        .col_expr(discussion_comments::Column::IsBestAnswer, Expr::value(false))
        .filter(discussion_comments::Column::DiscussionId.eq(discussion_id))
        .filter(discussion_comments::Column::IsBestAnswer.eq(true))
        .exec(&txn)
        .await?;

    let best = if was_best {
        None
    } else {
        let mut active: discussion_comments::ActiveModel = comment.into();
        active.is_best_answer = Set(true);
        active.update(&txn).await?;
        Some(comment_id)
    };

    txn.commit().await?;

    log::info!(
        "User {} set best answer of discussion {} to {:?}",
        actor.id,
        discussion_id,
        best
    );
    cache::revalidate_discussion(discussion_id);
    Ok(best)
}

pub async fn get_comment(
    db: &DatabaseConnection,
    comment_id: i32,
) -> ActionResult<discussion_comments::Model> {
    discussion_comments::Entity::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("Comment"))
}

/// Newest first, optionally limited to one community.
pub async fn list_discussions(
    db: &DatabaseConnection,
    community_id: Option<i32>,
) -> ActionResult<Vec<(discussions::Model, Option<profiles::Model>)>> {
    let mut query = discussions::Entity::find();
    if let Some(community_id) = community_id {
        query = query.filter(discussions::Column::CommunityId.eq(community_id));
    }

    Ok(query
        .find_also_related(profiles::Entity)
        .order_by_desc(discussions::Column::CreatedAt)
        .all(db)
        .await?)
}

pub struct DiscussionThread {
    pub discussion: discussions::Model,
    pub author: Option<profiles::Model>,
    /// Best answer first, then oldest first.
    pub comments: Vec<(discussion_comments::Model, Option<profiles::Model>)>,
}

pub async fn get_discussion(db: &DatabaseConnection, discussion_id: i32) -> ActionResult<DiscussionThread> {
    let (discussion, author) = discussions::Entity::find_by_id(discussion_id)
        .find_also_related(profiles::Entity)
        .one(db)
        .await?
        .ok_or(ActionError::NotFound("Discussion"))?;

    let comments = discussion_comments::Entity::find()
        .filter(discussion_comments::Column::DiscussionId.eq(discussion_id))
        .find_also_related(profiles::Entity)
        .order_by_desc(discussion_comments::Column::IsBestAnswer)
        .order_by_asc(discussion_comments::Column::CreatedAt)
        .order_by_asc(discussion_comments::Column::Id)
        .all(db)
        .await?;

    Ok(DiscussionThread {
        discussion,
        author,
        comments,
    })
}
