use std::sync::Arc;

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::polls::domain::{
    CreatePollRequest, NewPoll, OptionInput, PollId, PollRecord, StoredVote, VoteRecord,
};
use crate::polls::memory::MemoryPollStore;
use crate::polls::service::{PollService, PollSettings, PollView};
use crate::polls::store::{
    PollQuery, PollStore, PollUpdate, RecordedVote, StoreError, VoteFilter,
};
use crate::polls::voting::VoteSubmission;

pub(super) fn settings() -> PollSettings {
    PollSettings {
        share_base_url: "https://vote.example.com/p".to_string(),
        default_page_size: 10,
        expose_internal_errors: true,
    }
}

pub(super) fn build_service() -> (PollService<MemoryPollStore>, Arc<MemoryPollStore>) {
    let store = Arc::new(MemoryPollStore::new());
    let service = PollService::new(store.clone(), settings());
    (service, store)
}

pub(super) fn poll_request(title: &str, options: &[&str]) -> CreatePollRequest {
    CreatePollRequest {
        title: title.to_string(),
        description: Some("Pick one".to_string()),
        host_name: Some("Dana".to_string()),
        event_name: Some("Town Hall".to_string()),
        options: options.iter().map(|text| OptionInput::from(*text)).collect(),
    }
}

pub(super) fn create_poll<S: PollStore + 'static>(
    service: &PollService<S>,
    options: &[&str],
) -> PollView {
    service
        .create_poll(poll_request("Favourite colour", options))
        .expect("poll created")
}

pub(super) fn option_id(view: &PollView, text: &str) -> String {
    view.poll
        .options
        .iter()
        .find(|option| option.text == text)
        .map(|option| option.id.clone())
        .expect("option exists")
}

pub(super) fn submission(poll_id: &PollId, option_id: &str) -> VoteSubmission {
    VoteSubmission {
        poll_id: poll_id.0.clone(),
        option_id: option_id.to_string(),
        user_id: None,
        device_id: None,
        address: "203.0.113.7".to_string(),
        user_agent: Some("poll-tests/1.0".to_string()),
    }
}

pub(super) fn user_vote(poll_id: &PollId, option_id: &str, user: &str) -> VoteSubmission {
    VoteSubmission {
        user_id: Some(user.to_string()),
        ..submission(poll_id, option_id)
    }
}

pub(super) fn device_vote(poll_id: &PollId, option_id: &str, device: &str) -> VoteSubmission {
    VoteSubmission {
        device_id: Some(device.to_string()),
        ..submission(poll_id, option_id)
    }
}

pub(super) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

/// Store that fails every call, as if the database were offline.
pub(super) struct UnavailableStore;

impl PollStore for UnavailableStore {
    fn create_poll(&self, _poll: NewPoll) -> Result<PollId, StoreError> {
        Err(offline())
    }

    fn get_poll(&self, _id: &PollId) -> Result<Option<PollRecord>, StoreError> {
        Err(offline())
    }

    fn update_poll(&self, _id: &PollId, _update: PollUpdate) -> Result<(), StoreError> {
        Err(offline())
    }

    fn query_polls(&self, _query: &PollQuery) -> Result<Vec<PollRecord>, StoreError> {
        Err(offline())
    }

    fn record_vote(&self, _vote: VoteRecord) -> Result<RecordedVote, StoreError> {
        Err(offline())
    }

    fn query_votes(&self, _filter: &VoteFilter) -> Result<Vec<StoredVote>, StoreError> {
        Err(offline())
    }
}

fn offline() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

/// Reads go to the inner store; vote writes fail.
#[derive(Default)]
pub(super) struct ReadOnlyVotes {
    pub(super) inner: MemoryPollStore,
}

impl PollStore for ReadOnlyVotes {
    fn create_poll(&self, poll: NewPoll) -> Result<PollId, StoreError> {
        self.inner.create_poll(poll)
    }

    fn get_poll(&self, id: &PollId) -> Result<Option<PollRecord>, StoreError> {
        self.inner.get_poll(id)
    }

    fn update_poll(&self, id: &PollId, update: PollUpdate) -> Result<(), StoreError> {
        self.inner.update_poll(id, update)
    }

    fn query_polls(&self, query: &PollQuery) -> Result<Vec<PollRecord>, StoreError> {
        self.inner.query_polls(query)
    }

    fn record_vote(&self, _vote: VoteRecord) -> Result<RecordedVote, StoreError> {
        Err(StoreError::Unavailable("write quota exceeded".to_string()))
    }

    fn query_votes(&self, filter: &VoteFilter) -> Result<Vec<StoredVote>, StoreError> {
        self.inner.query_votes(filter)
    }
}

/// Lands a vote from another participant just before each vote write, as if
/// a concurrent request won the race between the engine's read and its write.
#[derive(Default)]
pub(super) struct InterleavedVoter {
    pub(super) inner: MemoryPollStore,
}

impl PollStore for InterleavedVoter {
    fn create_poll(&self, poll: NewPoll) -> Result<PollId, StoreError> {
        self.inner.create_poll(poll)
    }

    fn get_poll(&self, id: &PollId) -> Result<Option<PollRecord>, StoreError> {
        self.inner.get_poll(id)
    }

    fn update_poll(&self, id: &PollId, update: PollUpdate) -> Result<(), StoreError> {
        self.inner.update_poll(id, update)
    }

    fn query_polls(&self, query: &PollQuery) -> Result<Vec<PollRecord>, StoreError> {
        self.inner.query_polls(query)
    }

    fn record_vote(&self, vote: VoteRecord) -> Result<RecordedVote, StoreError> {
        let rival = VoteRecord {
            user_id: Some(format!("rival-of-{}", vote.ip_address)),
            device_id: None,
            ..vote.clone()
        };
        self.inner.record_vote(rival)?;
        self.inner.record_vote(vote)
    }

    fn query_votes(&self, filter: &VoteFilter) -> Result<Vec<StoredVote>, StoreError> {
        self.inner.query_votes(filter)
    }
}
