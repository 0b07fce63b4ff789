//! Up/down votes on discussions and comments.
//!
//! Each (user, target) has at most one vote row. The row change and the
//! matching counter adjustment on the target are written in one transaction.

use crate::cache;
use crate::error::{ActionError, ActionResult};
use crate::orm::votes::{self, VoteTarget, VoteType};
use crate::orm::{discussion_comments, discussions};
use crate::permission::{authorize, Action, Actor, Resource};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr};

/// Effect of one vote request on a (user, target) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// The user's vote afterwards. None when toggled off.
    pub next: Option<VoteType>,
    pub up_delta: i32,
    pub down_delta: i32,
}

fn delta(vote: VoteType, by: i32) -> (i32, i32) {
    match vote {
        VoteType::Up => (by, 0),
        VoteType::Down => (0, by),
    }
}

/// Repeating the current vote removes it. A different vote replaces it.
pub fn transition(existing: Option<VoteType>, requested: VoteType) -> Transition {
    match existing {
        None => {
            let (up_delta, down_delta) = delta(requested, 1);
            Transition {
                next: Some(requested),
                up_delta,
                down_delta,
            }
        }
        Some(current) if current == requested => {
            let (up_delta, down_delta) = delta(current, -1);
            Transition {
                next: None,
                up_delta,
                down_delta,
            }
        }
        Some(current) => {
            let (up_off, down_off) = delta(current, -1);
            let (up_on, down_on) = delta(requested, 1);
            Transition {
                next: Some(requested),
                up_delta: up_off + up_on,
                down_delta: down_off + down_on,
            }
        }
    }
}

/// State after a vote, for re-rendering the vote buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Discussion the target belongs to.
    pub discussion_id: i32,
    pub state: Option<VoteType>,
    pub upvotes: i32,
    pub downvotes: i32,
}

pub async fn cast_vote(
    db: &DatabaseConnection,
    actor: &Actor,
    target: VoteTarget,
    target_id: i32,
    requested: VoteType,
) -> ActionResult<VoteOutcome> {
    authorize(actor, Action::Vote, &Resource::Site)?;

    let txn = db.begin().await?;

    // Locking the target queues concurrent votes on it behind this one.
    let discussion_id = match target {
        VoteTarget::Discussion => discussions::Entity::find_by_id(target_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(ActionError::NotFound("Discussion"))?
            .id,
        VoteTarget::Comment => {
            discussion_comments::Entity::find_by_id(target_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or(ActionError::NotFound("Comment"))?
                .discussion_id
        }
    };

    let existing = votes::Entity::find()
        .filter(votes::Column::UserId.eq(actor.id))
        .filter(votes::Column::TargetType.eq(target))
        .filter(votes::Column::TargetId.eq(target_id))
        .one(&txn)
        .await?;

    let applied = apply_vote(&txn, actor.id, target, target_id, existing.as_ref(), requested).await?;
    let (step, upvotes, downvotes) = match applied {
        Some(applied) => applied,
        None => {
            return Err(ActionError::conflict(
                "Your vote changed while this one was saving. Please try again.",
            ))
        }
    };

    txn.commit().await?;

    log::info!(
        "User {} voted {:?} on {:?} {} (now {:?})",
        actor.id,
        requested,
        target,
        target_id,
        step.next
    );
    cache::revalidate_discussion(discussion_id);

    Ok(VoteOutcome {
        discussion_id,
        state: step.next,
        upvotes,
        downvotes,
    })
}

/// Writes the vote row for `requested` on top of `existing`, then moves the
/// target's counters by the transition and returns them.
///
/// Returns None and leaves the counters alone when the stored vote no longer
/// matches `existing`.
pub async fn apply_vote<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    target: VoteTarget,
    target_id: i32,
    existing: Option<&votes::Model>,
    requested: VoteType,
) -> Result<Option<(Transition, i32, i32)>, DbErr> {
    let step = transition(existing.map(|v| v.vote_type), requested);
    let now = Utc::now().naive_utc();

    let written = match (existing, step.next) {
        (None, Some(vote_type)) => {
            // A racing first vote trips the unique index instead.
            votes::ActiveModel {
                user_id: Set(user_id),
                target_type: Set(target),
                target_id: Set(target_id),
                vote_type: Set(vote_type),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            true
        }
        (Some(vote), Some(vote_type)) => {
            votes::Entity::update_many()
                .col_expr(votes::Column::VoteType, Expr::value(vote_type))
                .col_expr(votes::Column::UpdatedAt, Expr::value(now))
                .filter(votes::Column::Id.eq(vote.id))
                .filter(votes::Column::VoteType.eq(vote.vote_type))
                .exec(conn)
                .await?
                .rows_affected
                == 1
        }
        (Some(vote), None) => {
            votes::Entity::delete_many()
                .filter(votes::Column::Id.eq(vote.id))
                .filter(votes::Column::VoteType.eq(vote.vote_type))
                .exec(conn)
                .await?
                .rows_affected
                == 1
        }
        (None, None) => true,
    };

    if !written {
        return Ok(None);
    }

    let (upvotes, downvotes) = apply_counters(conn, target, target_id, &step).await?;
    Ok(Some((step, upvotes, downvotes)))
}

async fn apply_counters<C: ConnectionTrait>(
    conn: &C,
    target: VoteTarget,
    target_id: i32,
    step: &Transition,
) -> Result<(i32, i32), DbErr> {
    match target {
        VoteTarget::Discussion => {
            discussions::Entity::update_many()
                .col_expr(
                    discussions::Column::Upvotes,
                    Expr::col(discussions::Column::Upvotes).add(step.up_delta),
                )
                .col_expr(
                    discussions::Column::Downvotes,
                    Expr::col(discussions::Column::Downvotes).add(step.down_delta),
                )
                .filter(discussions::Column::Id.eq(target_id))
                .exec(conn)
                .await?;

            let discussion = discussions::Entity::find_by_id(target_id)
                .one(conn)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(format!("discussion {}", target_id)))?;
            Ok((discussion.upvotes, discussion.downvotes))
        }
        VoteTarget::Comment => {
            discussion_comments::Entity::update_many()
                .col_expr(
                    discussion_comments::Column::Upvotes,
                    Expr::col(discussion_comments::Column::Upvotes).add(step.up_delta),
                )
                .col_expr(
                    discussion_comments::Column::Downvotes,
                    Expr::col(discussion_comments::Column::Downvotes).add(step.down_delta),
                )
                .filter(discussion_comments::Column::Id.eq(target_id))
                .exec(conn)
                .await?;

            let comment = discussion_comments::Entity::find_by_id(target_id)
                .one(conn)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(format!("comment {}", target_id)))?;
            Ok((comment.upvotes, comment.downvotes))
        }
    }
}

/// The viewer's votes on a discussion and its comments.
pub async fn votes_for_discussion(
    db: &DatabaseConnection,
    user_id: i32,
    discussion_id: i32,
    comment_ids: &[i32],
) -> ActionResult<Vec<votes::Model>> {
    let mut condition = Condition::any().add(
        Condition::all()
            .add(votes::Column::TargetType.eq(VoteTarget::Discussion))
            .add(votes::Column::TargetId.eq(discussion_id)),
    );
    if !comment_ids.is_empty() {
        condition = condition.add(
            Condition::all()
                .add(votes::Column::TargetType.eq(VoteTarget::Comment))
                .add(votes::Column::TargetId.is_in(comment_ids.to_vec())),
        );
    }

    Ok(votes::Entity::find()
        .filter(votes::Column::UserId.eq(user_id))
        .filter(condition)
        .all(db)
        .await?)
}
