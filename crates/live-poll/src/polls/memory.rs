use std::sync::{Mutex, MutexGuard};

use super::domain::{NewPoll, PollId, PollRecord, StoredVote, VoteId, VoteRecord};
use super::identity::resolve_identity;
use super::store::{PollQuery, PollStore, PollUpdate, RecordedVote, StoreError, VoteFilter};

/// In-process document store.
///
/// Polls keep insertion order so equal sort keys list in creation order.
/// `record_vote` enforces one vote per resolved identity and poll, acting as
/// the unique index a remote store would carry.
#[derive(Debug, Default)]
pub struct MemoryPollStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    polls: Vec<PollRecord>,
    votes: Vec<StoredVote>,
    next_poll: u64,
    next_vote: u64,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Overwrites the cached counter of a poll. Used to simulate drift between
    /// the counter and the vote documents.
    pub fn set_cached_total(&self, id: &PollId, total_votes: u64) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let poll = state
            .polls
            .iter_mut()
            .find(|poll| &poll.id == id)
            .ok_or(StoreError::NotFound)?;
        poll.total_votes = total_votes;
        Ok(())
    }

    pub fn vote_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.votes.len())
    }
}

impl PollStore for MemoryPollStore {
    fn create_poll(&self, poll: NewPoll) -> Result<PollId, StoreError> {
        let mut state = self.lock()?;
        state.next_poll += 1;
        let id = PollId(format!("poll-{:06}", state.next_poll));

        state.polls.push(PollRecord {
            id: id.clone(),
            title: poll.title,
            description: poll.description,
            host_name: poll.host_name,
            event_name: poll.event_name,
            options: poll.options,
            is_active: poll.is_active,
            created_at: poll.created_at,
            updated_at: None,
            last_vote_at: None,
            total_votes: 0,
        });
        Ok(id)
    }

    fn get_poll(&self, id: &PollId) -> Result<Option<PollRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.polls.iter().find(|poll| &poll.id == id).cloned())
    }

    fn update_poll(&self, id: &PollId, update: PollUpdate) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let poll = state
            .polls
            .iter_mut()
            .find(|poll| &poll.id == id)
            .ok_or(StoreError::NotFound)?;

        if let Some(is_active) = update.is_active {
            poll.is_active = is_active;
        }
        if let Some(updated_at) = update.updated_at {
            poll.updated_at = Some(updated_at);
        }
        Ok(())
    }

    fn query_polls(&self, query: &PollQuery) -> Result<Vec<PollRecord>, StoreError> {
        let state = self.lock()?;
        let mut polls: Vec<PollRecord> = state
            .polls
            .iter()
            .filter(|poll| query.active.map_or(true, |active| poll.is_active == active))
            .cloned()
            .collect();

        polls.sort_by(|left, right| query.direction.apply(query.sort_by.compare(left, right)));

        Ok(polls
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    fn record_vote(&self, vote: VoteRecord) -> Result<RecordedVote, StoreError> {
        let mut state = self.lock()?;

        let identity = resolve_identity(
            vote.user_id.as_deref(),
            vote.device_id.as_deref(),
            &vote.ip_address,
        );
        let duplicate = state
            .votes
            .iter()
            .any(|stored| stored.vote.poll_id == vote.poll_id && identity.matches(&stored.vote));
        if duplicate {
            return Err(StoreError::Conflict);
        }

        let poll_index = state
            .polls
            .iter()
            .position(|poll| poll.id == vote.poll_id)
            .ok_or(StoreError::NotFound)?;

        state.next_vote += 1;
        let id = VoteId(format!("vote-{:08}", state.next_vote));

        let poll = &mut state.polls[poll_index];
        poll.total_votes += 1;
        poll.last_vote_at = Some(vote.timestamp);
        let total_votes = poll.total_votes;

        state.votes.push(StoredVote {
            id: id.clone(),
            vote,
        });
        Ok(RecordedVote { id, total_votes })
    }

    fn query_votes(&self, filter: &VoteFilter) -> Result<Vec<StoredVote>, StoreError> {
        let state = self.lock()?;
        let mut votes: Vec<StoredVote> = state
            .votes
            .iter()
            .filter(|stored| filter.matches(&stored.vote))
            .cloned()
            .collect();

        if filter.oldest_first {
            votes.sort_by_key(|stored| stored.vote.timestamp);
        }
        Ok(votes)
    }

    fn count_votes(&self, filter: &VoteFilter) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(state
            .votes
            .iter()
            .filter(|stored| filter.matches(&stored.vote))
            .count() as u64)
    }
}
