/// Integration tests for role management and the admin dashboard
mod common;
use serial_test::serial;

use bgculture::error::ActionError;
use bgculture::events;
use bgculture::moderation;
use bgculture::orm::mod_log;
use bgculture::orm::profiles::{self, Role};
use common::{database::*, fixtures::*};
use sea_orm::entity::*;

#[actix_rt::test]
#[serial]
async fn test_super_admin_promotes_user() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let user = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let updated = moderation::set_role(&db, &super_admin, user.id, Role::Organizer)
        .await
        .unwrap();
    assert_eq!(updated.role, Role::Organizer);

    let stored = profiles::Entity::find_by_id(user.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Organizer);

    let log = mod_log::Entity::find().all(&db).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, "set_role");
    assert_eq!(log[0].target_id, user.id);
    assert_eq!(log[0].moderator_id, Some(super_admin.id));
    assert_eq!(log[0].reason.as_deref(), Some("user -> organizer"));
}

#[actix_rt::test]
#[serial]
async fn test_unchanged_role_is_not_logged() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let user = create_actor(&db, "Ravi", Role::User).await.unwrap();

    moderation::set_role(&db, &super_admin, user.id, Role::User)
        .await
        .unwrap();

    assert_eq!(mod_log::Entity::find().all(&db).await.unwrap().len(), 0);
}

#[actix_rt::test]
#[serial]
async fn test_role_changes_are_restricted() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let admin = create_actor(&db, "Kabir", Role::Admin).await.unwrap();
    let user = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let own = moderation::set_role(&db, &super_admin, super_admin.id, Role::User).await;
    assert!(matches!(own, Err(ActionError::Validation(_))));

    let by_admin = moderation::set_role(&db, &admin, user.id, Role::Admin).await;
    assert!(matches!(by_admin, Err(ActionError::Unauthorized(_))));

    let missing = moderation::set_role(&db, &super_admin, 9_999, Role::Admin).await;
    assert!(matches!(missing, Err(ActionError::NotFound(_))));

    assert!(moderation::list_users(&db, &admin).await.is_err());
    assert_eq!(moderation::list_users(&db, &super_admin).await.unwrap().len(), 3);
}

#[actix_rt::test]
#[serial]
async fn test_admin_dashboard_shows_pending_work() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let admin = create_actor(&db, "Kabir", Role::Admin).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();

    let pending = events::create_event(&db, &organizer, event_input("Waiting", 0, None))
        .await
        .unwrap();
    let approved = events::create_event(&db, &organizer, event_input("Approved", 0, None))
        .await
        .unwrap();
    events::approve_event(&db, &super_admin, approved.id).await.unwrap();

    let dashboard = moderation::admin_dashboard(&db, &admin).await.unwrap();
    assert_eq!(dashboard.pending_events.len(), 1);
    assert_eq!(dashboard.pending_events[0].id, pending.id);
    assert!(dashboard.pending_payouts.is_empty());
    assert_eq!(dashboard.recent_log.len(), 1);

    let result = moderation::admin_dashboard(&db, &organizer).await;
    assert!(matches!(result, Err(ActionError::Unauthorized(_))));
}
