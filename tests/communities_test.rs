/// Integration tests for communities and membership
mod common;
use serial_test::serial;

use bgculture::communities;
use bgculture::error::ActionError;
use bgculture::events;
use bgculture::orm::profiles::Role;
use common::{database::*, fixtures::*};

#[actix_rt::test]
#[serial]
async fn test_create_community_makes_owner_a_member() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();

    let community = communities::create_community(
        &db,
        &organizer,
        "pune-boardgamers",
        "Pune Boardgamers",
        "Weekly meetups around Koregaon Park.",
        Some("Pune"),
    )
    .await
    .unwrap();

    assert_eq!(community.owner_id, organizer.id);
    assert!(communities::is_member(&db, community.id, organizer.id).await.unwrap());
    assert_eq!(communities::member_count(&db, community.id).await.unwrap(), 1);

    let result = communities::create_community(&db, &organizer, "pune-boardgamers", "Again", "", None).await;
    assert!(matches!(result, Err(ActionError::Conflict(_))));

    let result = communities::create_community(&db, &organizer, "Bad Slug", "Bad", "", None).await;
    assert!(matches!(result, Err(ActionError::Validation(_))));
}

#[actix_rt::test]
#[serial]
async fn test_users_cannot_create_communities() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let user = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let result = communities::create_community(&db, &user, "ravis-table", "Ravi's table", "", None).await;
    assert!(matches!(result, Err(ActionError::Unauthorized(_))));
}

#[actix_rt::test]
#[serial]
async fn test_join_and_leave_are_idempotent() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let community = communities::create_community(&db, &organizer, "blr-euros", "Bangalore Euros", "", None)
        .await
        .unwrap();

    communities::join(&db, &player, "blr-euros").await.unwrap();
    communities::join(&db, &player, "blr-euros").await.unwrap();
    assert_eq!(communities::member_count(&db, community.id).await.unwrap(), 2);

    communities::leave(&db, &player, "blr-euros").await.unwrap();
    communities::leave(&db, &player, "blr-euros").await.unwrap();
    assert_eq!(communities::member_count(&db, community.id).await.unwrap(), 1);
    assert!(!communities::is_member(&db, community.id, player.id).await.unwrap());
}

#[actix_rt::test]
#[serial]
async fn test_owner_cannot_leave() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    communities::create_community(&db, &organizer, "delhi-dice", "Delhi Dice", "", None)
        .await
        .unwrap();

    let result = communities::leave(&db, &organizer, "delhi-dice").await;
    assert!(matches!(result, Err(ActionError::Validation(_))));
}

#[actix_rt::test]
#[serial]
async fn test_community_page_lists_listed_events_and_discussions() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let community = communities::create_community(&db, &organizer, "mumbai-meeples", "Mumbai Meeples", "", None)
        .await
        .unwrap();

    let mut input = event_input("Listed meetup", 0, None);
    input.community_id = Some(community.id);
    let listed = events::create_event(&db, &organizer, input).await.unwrap();
    events::approve_event(&db, &super_admin, listed.id).await.unwrap();

    let mut input = event_input("Still pending", 0, None);
    input.community_id = Some(community.id);
    events::create_event(&db, &organizer, input).await.unwrap();

    bgculture::discussions::create_discussion(&db, &organizer, Some(community.id), "Next month's theme", "Ideas?")
        .await
        .unwrap();

    let page = communities::community_page(&db, "mumbai-meeples").await.unwrap();
    assert_eq!(page.community.id, community.id);
    assert_eq!(page.members, 1);
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].id, listed.id);
    assert_eq!(page.discussions.len(), 1);

    assert!(matches!(
        communities::community_page(&db, "nope").await,
        Err(ActionError::NotFound(_))
    ));
}
