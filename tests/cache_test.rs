/// Integration tests for public page revalidation after writes
mod common;
use serial_test::serial;

use bgculture::cache;
use bgculture::discussions;
use bgculture::events::{self, registration};
use bgculture::orm::profiles::Role;
use bgculture::orm::votes::{VoteTarget, VoteType};
use bgculture::votes::cast_vote;
use common::{database::*, fixtures::*};

fn prime(path: String) {
    cache::put_page(path.clone(), "<html>stale</html>".to_string());
    assert!(cache::get_page(&path).is_some());
}

#[actix_rt::test]
#[serial]
async fn test_approving_event_drops_cached_pages() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = events::create_event(&db, &organizer, event_input("Azul evening", 0, Some(8)))
        .await
        .unwrap();

    prime(cache::home());
    prime(cache::events_index());
    prime(cache::event_page(event.id));

    events::approve_event(&db, &super_admin, event.id).await.unwrap();

    assert!(cache::get_page(&cache::home()).is_none());
    assert!(cache::get_page(&cache::events_index()).is_none());
    assert!(cache::get_page(&cache::event_page(event.id)).is_none());
}

#[actix_rt::test]
#[serial]
async fn test_registration_drops_cached_event_page() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 0, Some(8)).await;
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    prime(cache::event_page(event.id));
    // Pages for other events stay put.
    prime(cache::event_page(event.id + 1));

    registration::register(&db, &player, event.id).await.unwrap();

    assert!(cache::get_page(&cache::event_page(event.id)).is_none());
    assert!(cache::get_page(&cache::event_page(event.id + 1)).is_some());
    cache::revalidate(&cache::event_page(event.id + 1));
}

#[actix_rt::test]
#[serial]
async fn test_vote_drops_cached_discussion_page() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let voter = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "Best two-player game?", "Go.")
        .await
        .unwrap();

    prime(cache::discussions_index());
    prime(cache::discussion_page(discussion.id));

    cast_vote(&db, &voter, VoteTarget::Discussion, discussion.id, VoteType::Up)
        .await
        .unwrap();

    assert!(cache::get_page(&cache::discussions_index()).is_none());
    assert!(cache::get_page(&cache::discussion_page(discussion.id)).is_none());
}

#[actix_rt::test]
#[serial]
async fn test_comment_drops_cached_discussion_page() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "House rules", "Share yours.")
        .await
        .unwrap();

    prime(cache::discussion_page(discussion.id));

    discussions::add_comment(&db, &author, discussion.id, None, "No trading on turn one.")
        .await
        .unwrap();

    assert!(cache::get_page(&cache::discussion_page(discussion.id)).is_none());
}
