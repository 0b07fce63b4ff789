//! In-memory page cache for guest-rendered HTML.
//! Uses moka for TTL-based caching with LRU eviction.
//!
//! Mutations call [`revalidate`] for every page whose content they change,
//! so the next read renders from the database again.

use moka::sync::Cache;
use once_cell::sync::Lazy;
use std::time::Duration;

static PAGE_CACHE: Lazy<Cache<String, String>> = Lazy::new(|| {
    let settings = crate::app_config::cache();
    Cache::builder()
        .time_to_live(Duration::from_secs(settings.page_ttl_seconds))
        .max_capacity(settings.max_pages)
        .build()
});

pub fn home() -> String {
    "/".to_string()
}

pub fn events_index() -> String {
    "/events".to_string()
}

pub fn event_page(event_id: i32) -> String {
    format!("/events/{}", event_id)
}

pub fn discussions_index() -> String {
    "/discussions".to_string()
}

pub fn discussion_page(discussion_id: i32) -> String {
    format!("/discussions/{}", discussion_id)
}

pub fn communities_index() -> String {
    "/communities".to_string()
}

pub fn community_page(slug: &str) -> String {
    format!("/communities/{}", slug)
}

/// Returns cached HTML for `path`.
pub fn get_page(path: &str) -> Option<String> {
    PAGE_CACHE.get(path)
}

pub fn put_page(path: String, html: String) {
    PAGE_CACHE.insert(path, html);
}

/// Drops the cached copy of `path`.
pub fn revalidate(path: &str) {
    log::debug!("Revalidating {}", path);
    PAGE_CACHE.invalidate(path);
}

pub fn revalidate_all<I, S>(paths: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for path in paths {
        revalidate(path.as_ref());
    }
}

/// Pages that list or show an event.
pub fn revalidate_event(event_id: i32) {
    revalidate_all([home(), events_index(), event_page(event_id)]);
}

/// Pages that list or show a discussion.
pub fn revalidate_discussion(discussion_id: i32) {
    revalidate_all([home(), discussions_index(), discussion_page(discussion_id)]);
}
