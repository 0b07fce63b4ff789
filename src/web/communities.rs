use crate::cache;
use crate::communities;
use crate::db::get_db_pool;
use crate::error::ActionError;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::permission::{Action, Resource};
use crate::web::events::EventCard;
use crate::web::{cached_for_guest, html, non_empty, render, render_public, see_other};
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama::Template;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_communities)
        .service(post_create_community)
        .service(view_community)
        .service(post_join)
        .service(post_leave);
}

pub struct CommunityRow {
    pub slug: String,
    pub name: String,
    pub city: String,
}

#[derive(Default, Deserialize)]
struct CommunityForm {
    slug: String,
    name: String,
    description: String,
    city: Option<String>,
    #[serde(default)]
    csrf_token: String,
}

#[derive(Template)]
#[template(path = "communities/list.html")]
struct CommunityListTemplate {
    client: ClientCtx,
    communities: Vec<CommunityRow>,
    can_create: bool,
    form: CommunityForm,
    error: Option<String>,
}

pub struct DiscussionSummary {
    pub id: i32,
    pub title: String,
    pub comment_count: i32,
}

#[derive(Template)]
#[template(path = "communities/view.html")]
struct CommunityTemplate {
    client: ClientCtx,
    slug: String,
    name: String,
    description: String,
    city: String,
    members: usize,
    is_member: bool,
    is_owner: bool,
    events: Vec<EventCard>,
    discussions: Vec<DiscussionSummary>,
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: String,
}

async fn community_rows() -> Result<Vec<CommunityRow>, ActionError> {
    Ok(communities::list_communities(get_db_pool())
        .await?
        .into_iter()
        .map(|c| CommunityRow {
            slug: c.slug,
            name: c.name,
            city: c.city.unwrap_or_default(),
        })
        .collect())
}

#[get("/communities")]
async fn view_communities(client: ClientCtx) -> Result<impl Responder, Error> {
    if let Some(page) = cached_for_guest(&client, &cache::communities_index()) {
        return Ok(page);
    }

    let tmpl = CommunityListTemplate {
        can_create: client.can(Action::CreateCommunity, &Resource::Site),
        client: client.clone(),
        communities: community_rows().await?,
        form: CommunityForm::default(),
        error: None,
    };
    render_public(&client, cache::communities_index(), &tmpl)
}

#[post("/communities")]
async fn post_create_community(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<CommunityForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let result = communities::create_community(
        get_db_pool(),
        &actor,
        &form.slug,
        &form.name,
        &form.description,
        non_empty(&form.city),
    )
    .await;

    match result {
        Ok(community) => Ok(see_other(&format!("/communities/{}", community.slug))),
        Err(err @ (ActionError::Validation(_) | ActionError::Conflict(_))) => {
            let body = render(&CommunityListTemplate {
                can_create: true,
                client,
                communities: community_rows().await?,
                form: form.into_inner(),
                error: Some(err.message()),
            })?;
            Ok(html(err.status_code(), body))
        }
        Err(err) => Err(err.into()),
    }
}

#[get("/communities/{slug}")]
async fn view_community(client: ClientCtx, path: web::Path<String>) -> Result<impl Responder, Error> {
    let slug = path.into_inner();
    let page_path = cache::community_page(&slug);
    if let Some(page) = cached_for_guest(&client, &page_path) {
        return Ok(page);
    }

    let db = get_db_pool();
    let page = communities::community_page(db, &slug).await?;
    let community = page.community;

    let is_member = match client.get_id() {
        Some(user_id) => communities::is_member(db, community.id, user_id).await?,
        None => false,
    };

    let tmpl = CommunityTemplate {
        is_owner: client.get_id() == Some(community.owner_id),
        client: client.clone(),
        slug: community.slug,
        name: community.name,
        description: community.description,
        city: community.city.unwrap_or_default(),
        members: page.members,
        is_member,
        events: page.events.iter().map(EventCard::from).collect(),
        discussions: page
            .discussions
            .into_iter()
            .map(|d| DiscussionSummary {
                id: d.id,
                title: d.title,
                comment_count: d.comment_count,
            })
            .collect(),
    };

    render_public(&client, page_path, &tmpl)
}

#[post("/communities/{slug}/join")]
async fn post_join(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<String>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let community = communities::join(get_db_pool(), &actor, &path.into_inner()).await?;
    Ok(see_other(&format!("/communities/{}", community.slug)))
}

#[post("/communities/{slug}/leave")]
async fn post_leave(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<String>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;
    let actor = client.require_actor()?;

    let community = communities::leave(get_db_pool(), &actor, &path.into_inner()).await?;
    Ok(see_other(&format!("/communities/{}", community.slug)))
}
