/// Integration tests for event registration and capacity
mod common;
use serial_test::serial;

use bgculture::error::ActionError;
use bgculture::events::registration;
use bgculture::orm::event_registrations::RegistrationStatus;
use bgculture::orm::profiles::Role;
use bgculture::orm::transactions::{self, TransactionStatus};
use bgculture::payouts;
use common::{database::*, fixtures::*};
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
#[serial]
async fn test_free_event_confirms_until_full() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 0, Some(2)).await;

    let first = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let second = create_actor(&db, "Neha", Role::User).await.unwrap();
    let third = create_actor(&db, "Tara", Role::User).await.unwrap();

    let reg = registration::register(&db, &first, event.id).await.unwrap();
    assert_eq!(reg.status, RegistrationStatus::Confirmed);
    registration::register(&db, &second, event.id).await.unwrap();

    let result = registration::register(&db, &third, event.id).await;
    assert!(matches!(result, Err(ActionError::Conflict(ref msg)) if msg == "This event is full"));

    let event = reload_event(&db, event.id).await;
    assert_eq!(event.confirmed_count, 2);
    assert_eq!(registration_count(&db, event.id).await, 2);
}

#[actix_rt::test]
#[serial]
async fn test_duplicate_registration_is_a_conflict() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 0, None).await;
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    registration::register(&db, &player, event.id).await.unwrap();
    let result = registration::register(&db, &player, event.id).await;

    assert!(matches!(
        result,
        Err(ActionError::Conflict(ref msg)) if msg == "You are already registered for this event"
    ));
    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 1);
}

#[actix_rt::test]
#[serial]
async fn test_unlisted_events_refuse_registration() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let event = bgculture::events::create_event(&db, &organizer, event_input("Draft night", 0, None))
        .await
        .unwrap();

    let result = registration::register(&db, &player, event.id).await;
    assert!(matches!(result, Err(ActionError::Validation(_))));
}

#[actix_rt::test]
#[serial]
async fn test_paid_registration_waits_for_confirmation() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 50_000, Some(10)).await;
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let reg = registration::register(&db, &player, event.id).await.unwrap();
    assert_eq!(reg.status, RegistrationStatus::PendingPayment);
    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 0);

    // Players cannot confirm their own payment.
    let result = registration::confirm_payment(&db, &player, reg.id, None).await;
    assert!(matches!(result, Err(ActionError::Unauthorized(_))));

    let confirmed = registration::confirm_payment(&db, &organizer, reg.id, Some("UPI-98231"))
        .await
        .unwrap();
    assert_eq!(confirmed.status, RegistrationStatus::Confirmed);
    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 1);

    // Confirming twice changes nothing.
    registration::confirm_payment(&db, &organizer, reg.id, Some("UPI-98231"))
        .await
        .unwrap();
    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 1);

    let payments = transactions::Entity::find()
        .filter(transactions::Column::EventId.eq(event.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, TransactionStatus::Completed);
    assert_eq!(payments[0].payment_reference.as_deref(), Some("UPI-98231"));

    let fee_bps = bgculture::app_config::payouts().platform_fee_bps;
    let fee = registration::platform_fee(50_000, fee_bps);
    assert_eq!(payments[0].platform_fee, fee);

    let balance = payouts::balance(&db, organizer.id).await.unwrap();
    assert_eq!(balance.earned, 50_000 - fee);
}

#[actix_rt::test]
#[serial]
async fn test_paid_confirmation_respects_capacity() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 20_000, Some(1)).await;

    let first = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let second = create_actor(&db, "Neha", Role::User).await.unwrap();

    let a = registration::register(&db, &first, event.id).await.unwrap();
    let b = registration::register(&db, &second, event.id).await.unwrap();

    registration::confirm_payment(&db, &organizer, a.id, None).await.unwrap();
    let result = registration::confirm_payment(&db, &organizer, b.id, None).await;
    assert!(matches!(result, Err(ActionError::Conflict(_))));

    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 1);
}

#[actix_rt::test]
#[serial]
async fn test_cancel_free_registration_releases_spot() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 0, Some(1)).await;

    let first = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let second = create_actor(&db, "Neha", Role::User).await.unwrap();

    registration::register(&db, &first, event.id).await.unwrap();
    registration::cancel_registration(&db, &first, event.id).await.unwrap();
    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 0);

    registration::register(&db, &second, event.id)
        .await
        .expect("the released spot can be taken");
}

#[actix_rt::test]
#[serial]
async fn test_confirmed_paid_registration_cannot_be_self_cancelled() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 30_000, None).await;
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let reg = registration::register(&db, &player, event.id).await.unwrap();
    registration::confirm_payment(&db, &organizer, reg.id, None).await.unwrap();

    let result = registration::cancel_registration(&db, &player, event.id).await;
    assert!(matches!(result, Err(ActionError::Validation(_))));
    assert_eq!(registration_count(&db, event.id).await, 1);
}

#[actix_rt::test]
#[serial]
async fn test_cancel_unpaid_registration_fails_its_transaction() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 30_000, None).await;
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    registration::register(&db, &player, event.id).await.unwrap();
    registration::cancel_registration(&db, &player, event.id).await.unwrap();

    assert_eq!(registration_count(&db, event.id).await, 0);
    let payment = transactions::Entity::find()
        .filter(transactions::Column::EventId.eq(event.id))
        .one(&db)
        .await
        .unwrap()
        .expect("the transaction is kept");
    assert_eq!(payment.status, TransactionStatus::Failed);
    assert!(payment.registration_id.is_none());
}

#[actix_rt::test]
#[serial]
async fn test_double_submitted_confirmation_counts_once() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 50_000, Some(10)).await;
    let player = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let reg = registration::register(&db, &player, event.id).await.unwrap();
    registration::confirm_payment(&db, &organizer, reg.id, None)
        .await
        .unwrap();

    // A second confirmation that read the row while it was still pending
    // cannot take it again.
    assert!(!registration::claim_pending(&db, reg.id).await.unwrap());

    let again = registration::confirm_payment(&db, &organizer, reg.id, None)
        .await
        .unwrap();
    assert_eq!(again.status, RegistrationStatus::Confirmed);
    assert_eq!(reload_event(&db, event.id).await.confirmed_count, 1);

    let completed = transactions::Entity::find()
        .filter(transactions::Column::EventId.eq(event.id))
        .filter(transactions::Column::Status.eq(TransactionStatus::Completed))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(completed, 1);

    let fee = registration::platform_fee(50_000, bgculture::app_config::payouts().platform_fee_bps);
    let balance = payouts::balance(&db, organizer.id).await.unwrap();
    assert_eq!(balance.earned, 50_000 - fee);
}

#[actix_rt::test]
#[serial]
async fn test_full_event_leaves_registration_pending() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let organizer = create_actor(&db, "Asha", Role::Organizer).await.unwrap();
    let super_admin = create_actor(&db, "Meera", Role::SuperAdmin).await.unwrap();
    let event = create_listed_event(&db, &organizer, &super_admin, 20_000, Some(1)).await;

    let first = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let second = create_actor(&db, "Neha", Role::User).await.unwrap();
    let a = registration::register(&db, &first, event.id).await.unwrap();
    let b = registration::register(&db, &second, event.id).await.unwrap();

    registration::confirm_payment(&db, &organizer, a.id, None).await.unwrap();
    assert!(registration::confirm_payment(&db, &organizer, b.id, None).await.is_err());

    // The refused confirmation rolled back its status change.
    let b = registration::find_registration(&db, event.id, second.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.status, RegistrationStatus::PendingPayment);
    assert!(registration::claim_pending(&db, b.id).await.unwrap());
}
