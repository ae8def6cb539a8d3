use super::common::*;
use std::sync::Arc;

use crate::polls::domain::OptionInput;
use crate::polls::error::PollError;
use crate::polls::identity::IdentityKind;
use crate::polls::service::PollService;
use crate::polls::store::{PollStore, VoteFilter};
use crate::polls::voting::VoteStatusQuery;

#[test]
fn duplicate_user_vote_is_rejected_and_count_unchanged() {
    let (service, store) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let red = option_id(&poll, "Red");

    let receipt = service
        .cast_vote(user_vote(&poll.poll.id, &red, "u1"))
        .expect("first vote accepted");
    assert_eq!(receipt.vote_count, 1);
    assert_eq!(receipt.total_votes, 1);
    assert_eq!(receipt.option_id, red);

    match service.cast_vote(user_vote(&poll.poll.id, &red, "u1")) {
        Err(PollError::Conflict) => {}
        other => panic!("expected conflict, got {other:?}"),
    }

    let results = service.results(&poll.poll.id).expect("results");
    assert_eq!(results.total_votes, 1);
    assert_eq!(results.results[0].id, red);
    assert_eq!(results.results[0].votes, 1);
    assert_eq!(store.vote_count().expect("count"), 1);
}

#[test]
fn inactive_poll_rejects_votes_without_writing() {
    let (service, store) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    service.toggle_poll(&poll.poll.id).expect("poll deactivated");

    let red = option_id(&poll, "Red");
    assert!(matches!(
        service.cast_vote(user_vote(&poll.poll.id, &red, "u1")),
        Err(PollError::Forbidden)
    ));
    assert_eq!(store.vote_count().expect("count"), 0);
}

#[test]
fn foreign_option_is_invalid() {
    let (service, store) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let mut request = poll_request("Favourite fruit", &[]);
    request.options = vec![
        OptionInput::Detailed {
            id: Some("green".to_string()),
            text: "Green".to_string(),
        },
        OptionInput::Detailed {
            id: Some("yellow".to_string()),
            text: "Yellow".to_string(),
        },
    ];
    let other = service.create_poll(request).expect("poll created");
    let green = option_id(&other, "Green");
    assert!(!poll.poll.has_option(&green));

    assert!(matches!(
        service.cast_vote(user_vote(&poll.poll.id, &green, "u1")),
        Err(PollError::InvalidOption)
    ));
    assert!(matches!(
        service.cast_vote(user_vote(&poll.poll.id, "option_0_0", "u1")),
        Err(PollError::InvalidOption)
    ));
    assert_eq!(store.vote_count().expect("count"), 0);
}

#[test]
fn receipt_total_reflects_votes_landing_between_read_and_write() {
    let store = Arc::new(InterleavedVoter::default());
    let service = PollService::new(store.clone(), settings());
    let poll = create_poll(&service, &["Red", "Blue"]);
    let red = option_id(&poll, "Red");

    let receipt = service
        .cast_vote(user_vote(&poll.poll.id, &red, "u1"))
        .expect("vote accepted");
    assert_eq!(receipt.total_votes, 2);
    assert_eq!(receipt.vote_count, 2);

    let record = store
        .get_poll(&poll.poll.id)
        .expect("poll readable")
        .expect("poll exists");
    assert_eq!(record.total_votes, receipt.total_votes);
}

#[test]
fn missing_poll_and_blank_fields_are_rejected() {
    let (service, _) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);

    let missing = crate::polls::domain::PollId("poll-404".to_string());
    assert!(matches!(
        service.cast_vote(submission(&missing, "anything")),
        Err(PollError::NotFound)
    ));
    assert!(matches!(
        service.cast_vote(submission(&poll.poll.id, "  ")),
        Err(PollError::Validation(_))
    ));
}

#[test]
fn only_the_highest_priority_identity_is_checked() {
    let (service, _) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let red = option_id(&poll, "Red");
    let blue = option_id(&poll, "Blue");

    service
        .cast_vote(device_vote(&poll.poll.id, &red, "phone-1"))
        .expect("device vote accepted");

    // Same device and address, but a user id takes precedence over both.
    let mut with_user = device_vote(&poll.poll.id, &blue, "phone-1");
    with_user.user_id = Some("u7".to_string());
    let receipt = service.cast_vote(with_user).expect("user vote accepted");
    assert_eq!(receipt.total_votes, 2);

    assert!(matches!(
        service.cast_vote(device_vote(&poll.poll.id, &blue, "phone-1")),
        Err(PollError::Conflict)
    ));
}

#[test]
fn anonymous_votes_fall_back_to_network_address() {
    let (service, _) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let red = option_id(&poll, "Red");

    service
        .cast_vote(submission(&poll.poll.id, &red))
        .expect("anonymous vote accepted");
    assert!(matches!(
        service.cast_vote(submission(&poll.poll.id, &red)),
        Err(PollError::Conflict)
    ));

    let mut elsewhere = submission(&poll.poll.id, &red);
    elsewhere.address = "198.51.100.20".to_string();
    let receipt = service.cast_vote(elsewhere).expect("other address accepted");
    assert_eq!(receipt.vote_count, 2);
}

#[test]
fn vote_record_keeps_identity_fields_and_updates_poll() {
    let (service, store) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let blue = option_id(&poll, "Blue");

    let mut vote = user_vote(&poll.poll.id, &blue, "u1");
    vote.device_id = Some("tablet".to_string());
    let receipt = service.cast_vote(vote).expect("vote accepted");

    let stored = store
        .query_votes(&VoteFilter::poll(&poll.poll.id))
        .expect("votes readable");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, receipt.vote_id);
    assert_eq!(stored[0].vote.user_id.as_deref(), Some("u1"));
    assert_eq!(stored[0].vote.device_id.as_deref(), Some("tablet"));
    assert_eq!(stored[0].vote.ip_address, "203.0.113.7");
    assert_eq!(stored[0].vote.user_agent.as_deref(), Some("poll-tests/1.0"));

    let record = store
        .get_poll(&poll.poll.id)
        .expect("poll readable")
        .expect("poll exists");
    assert_eq!(record.total_votes, 1);
    assert_eq!(record.last_vote_at, Some(receipt.timestamp));
}

#[test]
fn failed_vote_write_leaves_poll_untouched() {
    let store = Arc::new(ReadOnlyVotes::default());
    let service = PollService::new(store.clone(), settings());
    let poll = create_poll(&service, &["Red", "Blue"]);
    let red = option_id(&poll, "Red");

    assert!(matches!(
        service.cast_vote(user_vote(&poll.poll.id, &red, "u1")),
        Err(PollError::Store(_))
    ));

    let record = store
        .get_poll(&poll.poll.id)
        .expect("poll readable")
        .expect("poll exists");
    assert_eq!(record.total_votes, 0);
    assert_eq!(record.last_vote_at, None);
    assert_eq!(store.inner.vote_count().expect("count"), 0);
}

#[test]
fn status_check_matches_ingestion_and_is_repeatable() {
    let (service, _) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let blue = option_id(&poll, "Blue");

    let query = VoteStatusQuery {
        poll_id: poll.poll.id.0.clone(),
        user_id: Some("u1".to_string()),
        device_id: Some("phone-1".to_string()),
    };

    let before = service.vote_status(&query, "203.0.113.7").expect("status");
    assert!(!before.has_voted);
    assert_eq!(before.checked_by, IdentityKind::User);

    let receipt = service
        .cast_vote(user_vote(&poll.poll.id, &blue, "u1"))
        .expect("vote accepted");

    let first = service.vote_status(&query, "203.0.113.7").expect("status");
    let second = service.vote_status(&query, "203.0.113.7").expect("status");
    assert_eq!(first, second);
    assert!(first.has_voted);
    assert_eq!(first.option_id.as_deref(), Some(blue.as_str()));
    assert_eq!(first.voted_at, Some(receipt.timestamp));
}

#[test]
fn status_check_uses_address_when_no_ids_given() {
    let (service, _) = build_service();
    let poll = create_poll(&service, &["Red", "Blue"]);
    let red = option_id(&poll, "Red");
    service
        .cast_vote(submission(&poll.poll.id, &red))
        .expect("anonymous vote accepted");

    let query = VoteStatusQuery {
        poll_id: poll.poll.id.0.clone(),
        user_id: None,
        device_id: None,
    };
    let same = service.vote_status(&query, "203.0.113.7").expect("status");
    let other = service.vote_status(&query, "198.51.100.20").expect("status");

    assert!(same.has_voted);
    assert_eq!(same.checked_by, IdentityKind::Address);
    assert!(!other.has_voted);
}

#[test]
fn status_check_requires_poll_id() {
    let (service, _) = build_service();
    let query = VoteStatusQuery::default();
    assert!(matches!(
        service.vote_status(&query, "203.0.113.7"),
        Err(PollError::Validation(_))
    ));
}
