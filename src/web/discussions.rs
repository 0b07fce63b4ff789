use crate::cache;
use crate::communities;
use crate::db::get_db_pool;
use crate::discussions;
use crate::error::ActionError;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::orm::votes::{VoteTarget, VoteType};
use crate::votes;
use crate::web::{
    cached_for_guest, format_datetime, html, non_empty, render, render_public, see_other,
};
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama::Template;
use serde::Deserialize;
use std::collections::HashMap;

/// Replies deeper than this are drawn at this depth.
const MAX_DEPTH: usize = 6;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_discussions)
        .service(view_new_discussion)
        .service(post_new_discussion)
        .service(view_discussion)
        .service(post_comment)
        .service(post_vote)
        .service(post_best_answer);
}

pub struct DiscussionRow {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub score: i32,
    pub comment_count: i32,
    pub created_at: String,
}

#[derive(Template)]
#[template(path = "discussions/list.html")]
struct DiscussionListTemplate {
    client: ClientCtx,
    discussions: Vec<DiscussionRow>,
}

#[derive(Template)]
#[template(path = "discussions/new.html")]
struct NewDiscussionTemplate {
    client: ClientCtx,
    community: String,
    title: String,
    content: String,
    error: Option<String>,
}

pub struct CommentView {
    pub id: i32,
    pub author: String,
    pub content: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub is_best_answer: bool,
    pub depth: usize,
    pub parent_id: Option<i32>,
    pub my_vote: &'static str,
    pub created_at: String,
}

#[derive(Template)]
#[template(path = "discussions/view.html")]
struct DiscussionTemplate {
    client: ClientCtx,
    id: i32,
    title: String,
    content: String,
    author: String,
    upvotes: i32,
    downvotes: i32,
    my_vote: &'static str,
    is_author: bool,
    created_at: String,
    comments: Vec<CommentView>,
}

#[derive(Deserialize)]
struct NewDiscussionForm {
    title: String,
    content: String,
    /// Community slug.
    community: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
struct NewDiscussionQuery {
    community: Option<String>,
}

#[derive(Deserialize)]
struct CommentForm {
    content: String,
    parent_id: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
struct VoteForm {
    target_type: VoteTarget,
    target_id: i32,
    vote_type: VoteType,
    csrf_token: String,
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: String,
}

fn vote_label(vote: Option<VoteType>) -> &'static str {
    match vote {
        Some(VoteType::Up) => "up",
        Some(VoteType::Down) => "down",
        None => "",
    }
}

/// Depth of each comment in its reply chain.
fn comment_depths(parents: &HashMap<i32, Option<i32>>) -> HashMap<i32, usize> {
    parents
        .keys()
        .map(|&id| {
            let mut depth = 0;
            let mut current = parents.get(&id).copied().flatten();
            while let Some(parent) = current {
                depth += 1;
                if depth >= MAX_DEPTH {
                    break;
                }
                current = parents.get(&parent).copied().flatten();
            }
            (id, depth)
        })
        .collect()
}

#[get("/discussions")]
async fn view_discussions(client: ClientCtx) -> Result<impl Responder, Error> {
    if let Some(page) = cached_for_guest(&client, &cache::discussions_index()) {
        return Ok(page);
    }

    let discussions = discussions::list_discussions(get_db_pool(), None)
        .await?
        .into_iter()
        .map(|(d, author)| DiscussionRow {
            id: d.id,
            score: d.score(),
            title: d.title,
            author: author.map(|a| a.display_name).unwrap_or_default(),
            comment_count: d.comment_count,
            created_at: format_datetime(&d.created_at),
        })
        .collect();

    render_public(
        &client,
        cache::discussions_index(),
        &DiscussionListTemplate {
            client: client.clone(),
            discussions,
        },
    )
}

#[get("/discussions/new")]
async fn view_new_discussion(
    client: ClientCtx,
    query: web::Query<NewDiscussionQuery>,
) -> Result<impl Responder, Error> {
    client.require_actor()?;

    let body = render(&NewDiscussionTemplate {
        client,
        community: query.into_inner().community.unwrap_or_default(),
        title: String::new(),
        content: String::new(),
        error: None,
    })?;
    Ok(html(actix_web::http::StatusCode::OK, body))
}

#[post("/discussions/new")]
async fn post_new_discussion(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<NewDiscussionForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;
    let db = get_db_pool();

    let community_id = match non_empty(&form.community) {
        Some(slug) => Some(communities::get_by_slug(db, slug).await?.id),
        None => None,
    };

    match discussions::create_discussion(db, &actor, community_id, &form.title, &form.content).await {
        Ok(discussion) => Ok(see_other(&format!("/discussions/{}", discussion.id))),
        Err(err @ ActionError::Validation(_)) => {
            let body = render(&NewDiscussionTemplate {
                client,
                community: form.community.clone().unwrap_or_default(),
                title: form.title.clone(),
                content: form.content.clone(),
                error: Some(err.message()),
            })?;
            Ok(html(err.status_code(), body))
        }
        Err(err) => Err(err.into()),
    }
}

#[get("/discussions/{id}")]
async fn view_discussion(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    let discussion_id = path.into_inner();
    let page_path = cache::discussion_page(discussion_id);
    if let Some(page) = cached_for_guest(&client, &page_path) {
        return Ok(page);
    }

    let db = get_db_pool();
    let thread = discussions::get_discussion(db, discussion_id).await?;

    let comment_ids: Vec<i32> = thread.comments.iter().map(|(c, _)| c.id).collect();
    let my_votes: HashMap<(VoteTarget, i32), VoteType> = match client.get_id() {
        Some(user_id) => votes::votes_for_discussion(db, user_id, discussion_id, &comment_ids)
            .await?
            .into_iter()
            .map(|v| ((v.target_type, v.target_id), v.vote_type))
            .collect(),
        None => HashMap::new(),
    };

    let parents: HashMap<i32, Option<i32>> = thread
        .comments
        .iter()
        .map(|(c, _)| (c.id, c.parent_id))
        .collect();
    let depths = comment_depths(&parents);

    let comments = thread
        .comments
        .into_iter()
        .map(|(c, author)| CommentView {
            id: c.id,
            author: author.map(|a| a.display_name).unwrap_or_default(),
            upvotes: c.upvotes,
            downvotes: c.downvotes,
            is_best_answer: c.is_best_answer,
            depth: depths.get(&c.id).copied().unwrap_or(0),
            parent_id: c.parent_id,
            my_vote: vote_label(my_votes.get(&(VoteTarget::Comment, c.id)).copied()),
            created_at: format_datetime(&c.created_at),
            content: c.content,
        })
        .collect();

    let discussion = thread.discussion;
    let tmpl = DiscussionTemplate {
        is_author: client.get_id() == Some(discussion.author_id),
        my_vote: vote_label(my_votes.get(&(VoteTarget::Discussion, discussion.id)).copied()),
        client: client.clone(),
        id: discussion.id,
        author: thread.author.map(|a| a.display_name).unwrap_or_default(),
        upvotes: discussion.upvotes,
        downvotes: discussion.downvotes,
        created_at: format_datetime(&discussion.created_at),
        title: discussion.title,
        content: discussion.content,
        comments,
    };

    render_public(&client, page_path, &tmpl)
}

#[post("/discussions/{id}/comments")]
async fn post_comment(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;
    let discussion_id = path.into_inner();

    let parent_id = match non_empty(&form.parent_id) {
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| ActionError::NotFound("Comment"))?,
        ),
        None => None,
    };

    let comment =
        discussions::add_comment(get_db_pool(), &actor, discussion_id, parent_id, &form.content)
            .await?;
    Ok(see_other(&format!(
        "/discussions/{}#comment-{}",
        discussion_id, comment.id
    )))
}

#[post("/votes")]
async fn post_vote(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<VoteForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let outcome = votes::cast_vote(
        get_db_pool(),
        &actor,
        form.target_type,
        form.target_id,
        form.vote_type,
    )
    .await?;

    let anchor = match form.target_type {
        VoteTarget::Discussion => String::new(),
        VoteTarget::Comment => format!("#comment-{}", form.target_id),
    };
    Ok(see_other(&format!(
        "/discussions/{}{}",
        outcome.discussion_id, anchor
    )))
}

#[post("/comments/{id}/best-answer")]
async fn post_best_answer(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;
    let db = get_db_pool();

    let comment = discussions::get_comment(db, path.into_inner()).await?;
    discussions::mark_best_answer(db, &actor, comment.discussion_id, comment.id).await?;

    Ok(see_other(&format!(
        "/discussions/{}#comment-{}",
        comment.discussion_id, comment.id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_depths() {
        let parents: HashMap<i32, Option<i32>> =
            [(1, None), (2, Some(1)), (3, Some(2)), (4, None)].into_iter().collect();
        let depths = comment_depths(&parents);
        assert_eq!(depths[&1], 0);
        assert_eq!(depths[&2], 1);
        assert_eq!(depths[&3], 2);
        assert_eq!(depths[&4], 0);
    }

    #[test]
    fn test_depth_is_capped() {
        let mut parents: HashMap<i32, Option<i32>> = HashMap::new();
        parents.insert(0, None);
        for id in 1..20 {
            parents.insert(id, Some(id - 1));
        }
        assert_eq!(comment_depths(&parents)[&19], MAX_DEPTH);
    }
}
