use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::web::events::EventCard;
use crate::cache;
use crate::web::{cached_for_guest, render_public};
use actix_web::{get, Error, Responder};
use askama::Template;

const HOME_EVENTS: usize = 6;
const HOME_DISCUSSIONS: usize = 5;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

pub struct DiscussionLink {
    pub id: i32,
    pub title: String,
    pub comment_count: i32,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    client: ClientCtx,
    events: Vec<EventCard>,
    discussions: Vec<DiscussionLink>,
}

#[get("/")]
async fn view_index(client: ClientCtx) -> Result<impl Responder, Error> {
    if let Some(page) = cached_for_guest(&client, &cache::home()) {
        return Ok(page);
    }

    let db = get_db_pool();
    let events = crate::events::list_published(db, None)
        .await?
        .iter()
        .take(HOME_EVENTS)
        .map(EventCard::from)
        .collect();
    let discussions = crate::discussions::list_discussions(db, None)
        .await?
        .into_iter()
        .take(HOME_DISCUSSIONS)
        .map(|(d, _)| DiscussionLink {
            id: d.id,
            title: d.title,
            comment_count: d.comment_count,
        })
        .collect();

    render_public(
        &client,
        cache::home(),
        &IndexTemplate {
            client: client.clone(),
            events,
            discussions,
        },
    )
}
