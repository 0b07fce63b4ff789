/// Integration tests for discussion and comment voting
mod common;
use serial_test::serial;

use bgculture::discussions;
use bgculture::orm::profiles::Role;
use bgculture::orm::votes::{self as vote_rows, VoteTarget, VoteType};
use bgculture::votes::{self, cast_vote};
use common::{database::*, fixtures::*};
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
#[serial]
async fn test_double_upvote_toggles_off() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let voter = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "Best gateway games?", "Go.")
        .await
        .unwrap();

    let first = cast_vote(&db, &voter, VoteTarget::Discussion, discussion.id, VoteType::Up)
        .await
        .unwrap();
    assert_eq!(first.state, Some(VoteType::Up));
    assert_eq!((first.upvotes, first.downvotes), (1, 0));
    assert_eq!(first.discussion_id, discussion.id);

    let second = cast_vote(&db, &voter, VoteTarget::Discussion, discussion.id, VoteType::Up)
        .await
        .unwrap();
    assert_eq!(second.state, None);
    assert_eq!((second.upvotes, second.downvotes), (0, 0));

    let rows = vote_rows::Entity::find().count(&db).await.unwrap();
    assert_eq!(rows, 0);
}

#[actix_rt::test]
#[serial]
async fn test_switching_vote_moves_both_counters() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let voter = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "Rules question", "Can I?")
        .await
        .unwrap();
    let comment = discussions::add_comment(&db, &author, discussion.id, None, "Yes you can.")
        .await
        .unwrap();

    cast_vote(&db, &voter, VoteTarget::Comment, comment.id, VoteType::Up)
        .await
        .unwrap();
    let switched = cast_vote(&db, &voter, VoteTarget::Comment, comment.id, VoteType::Down)
        .await
        .unwrap();

    assert_eq!(switched.state, Some(VoteType::Down));
    assert_eq!((switched.upvotes, switched.downvotes), (0, 1));
    assert_eq!(switched.discussion_id, discussion.id);

    let votes = bgculture::votes::votes_for_discussion(&db, voter.id, discussion.id, &[comment.id])
        .await
        .unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].target_type, VoteTarget::Comment);
    assert_eq!(votes[0].vote_type, VoteType::Down);
}

#[actix_rt::test]
#[serial]
async fn test_votes_from_different_users_add_up() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "Favourite worker placement", "Discuss.")
        .await
        .unwrap();

    for (name, vote) in [("Ravi", VoteType::Up), ("Neha", VoteType::Up), ("Tara", VoteType::Down)] {
        let voter = create_actor(&db, name, Role::User).await.unwrap();
        cast_vote(&db, &voter, VoteTarget::Discussion, discussion.id, vote)
            .await
            .unwrap();
    }

    let thread = discussions::get_discussion(&db, discussion.id).await.unwrap();
    assert_eq!(thread.discussion.upvotes, 2);
    assert_eq!(thread.discussion.downvotes, 1);
    assert_eq!(thread.discussion.score(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_vote_on_missing_target_is_not_found() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let voter = create_actor(&db, "Ravi", Role::User).await.unwrap();

    let result = cast_vote(&db, &voter, VoteTarget::Comment, 999, VoteType::Up).await;
    assert!(matches!(result, Err(bgculture::error::ActionError::NotFound(_))));
}

#[actix_rt::test]
#[serial]
async fn test_stale_repeat_vote_does_not_count_twice() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let voter = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "Catan or Carcassonne?", "Pick one.")
        .await
        .unwrap();

    cast_vote(&db, &voter, VoteTarget::Discussion, discussion.id, VoteType::Up)
        .await
        .unwrap();

    // Two repeat clicks both read the existing upvote. One toggles it off.
    let stale = vote_rows::Entity::find().one(&db).await.unwrap();
    assert!(stale.is_some());
    let first = cast_vote(&db, &voter, VoteTarget::Discussion, discussion.id, VoteType::Up)
        .await
        .unwrap();
    assert_eq!((first.upvotes, first.downvotes), (0, 0));

    // The other finds its row gone and leaves the counters alone.
    let txn = db.begin().await.unwrap();
    let applied = votes::apply_vote(
        &txn,
        voter.id,
        VoteTarget::Discussion,
        discussion.id,
        stale.as_ref(),
        VoteType::Up,
    )
    .await
    .unwrap();
    assert!(applied.is_none());
    txn.commit().await.unwrap();

    let discussion = discussions::get_discussion(&db, discussion.id).await.unwrap().discussion;
    assert_eq!((discussion.upvotes, discussion.downvotes), (0, 0));
}

#[actix_rt::test]
#[serial]
async fn test_stale_switch_is_refused() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_actor(&db, "Asha", Role::User).await.unwrap();
    let voter = create_actor(&db, "Ravi", Role::User).await.unwrap();
    let discussion = discussions::create_discussion(&db, &author, None, "Rules question", "Can I?")
        .await
        .unwrap();
    let comment = discussions::add_comment(&db, &author, discussion.id, None, "Yes you can.")
        .await
        .unwrap();

    cast_vote(&db, &voter, VoteTarget::Comment, comment.id, VoteType::Up)
        .await
        .unwrap();
    let stale = vote_rows::Entity::find().one(&db).await.unwrap();

    // Someone else's request already moved it to a downvote.
    cast_vote(&db, &voter, VoteTarget::Comment, comment.id, VoteType::Down)
        .await
        .unwrap();

    let txn = db.begin().await.unwrap();
    let applied = votes::apply_vote(
        &txn,
        voter.id,
        VoteTarget::Comment,
        comment.id,
        stale.as_ref(),
        VoteType::Down,
    )
    .await
    .unwrap();
    assert!(applied.is_none());
    txn.commit().await.unwrap();

    let comment = discussions::get_comment(&db, comment.id).await.unwrap();
    assert_eq!((comment.upvotes, comment.downvotes), (0, 1));
}
