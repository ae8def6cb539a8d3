use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::domain::{NewPoll, PollId, PollRecord, StoredVote, VoteId, VoteRecord};
use super::identity::VoterIdentity;

/// Document-store contract consumed by the engine.
///
/// Implementations provide atomic single-document reads and writes; the
/// engine keeps no state of its own between calls.
pub trait PollStore: Send + Sync {
    fn create_poll(&self, poll: NewPoll) -> Result<PollId, StoreError>;
    fn get_poll(&self, id: &PollId) -> Result<Option<PollRecord>, StoreError>;
    fn update_poll(&self, id: &PollId, update: PollUpdate) -> Result<(), StoreError>;
    fn query_polls(&self, query: &PollQuery) -> Result<Vec<PollRecord>, StoreError>;

    /// Writes the vote and, in the same batch, bumps the parent poll's
    /// `total_votes` and sets its `last_vote_at` to the vote timestamp.
    /// Either both land or neither does.
    fn record_vote(&self, vote: VoteRecord) -> Result<RecordedVote, StoreError>;

    fn query_votes(&self, filter: &VoteFilter) -> Result<Vec<StoredVote>, StoreError>;

    fn count_votes(&self, filter: &VoteFilter) -> Result<u64, StoreError> {
        Ok(self.query_votes(filter)?.len() as u64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("a vote for this identity already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a vote write: the new vote id and the poll counter as it stood
/// right after this vote's increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedVote {
    pub id: VoteId,
    pub total_votes: u64,
}

/// Partial update applied to a poll document. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollUpdate {
    pub is_active: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Conjunction of equality constraints over vote documents.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteFilter {
    pub poll_id: PollId,
    pub option_id: Option<String>,
    pub identity: Option<VoterIdentity>,
    pub oldest_first: bool,
}

impl VoteFilter {
    pub fn poll(poll_id: &PollId) -> Self {
        Self {
            poll_id: poll_id.clone(),
            option_id: None,
            identity: None,
            oldest_first: false,
        }
    }

    pub fn option(mut self, option_id: &str) -> Self {
        self.option_id = Some(option_id.to_string());
        self
    }

    pub fn identity(mut self, identity: VoterIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    pub fn matches(&self, vote: &VoteRecord) -> bool {
        vote.poll_id == self.poll_id
            && self
                .option_id
                .as_ref()
                .map_or(true, |option_id| &vote.option_id == option_id)
            && self
                .identity
                .as_ref()
                .map_or(true, |identity| identity.matches(vote))
    }
}

/// Listing query: optional active-flag filter, one sort key, offset/limit window.
#[derive(Debug, Clone, PartialEq)]
pub struct PollQuery {
    pub active: Option<bool>,
    pub sort_by: PollSortField,
    pub direction: SortDirection,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSortField {
    CreatedAt,
    UpdatedAt,
    LastVoteAt,
    Title,
    TotalVotes,
    IsActive,
}

impl PollSortField {
    /// Ascending comparison of two polls on this field; absent timestamps sort first.
    pub fn compare(self, left: &PollRecord, right: &PollRecord) -> Ordering {
        match self {
            PollSortField::CreatedAt => left.created_at.cmp(&right.created_at),
            PollSortField::UpdatedAt => left.updated_at.cmp(&right.updated_at),
            PollSortField::LastVoteAt => left.last_vote_at.cmp(&right.last_vote_at),
            PollSortField::Title => left.title.cmp(&right.title),
            PollSortField::TotalVotes => left.total_votes.cmp(&right.total_votes),
            PollSortField::IsActive => left.is_active.cmp(&right.is_active),
        }
    }
}

impl FromStr for PollSortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "createdAt" => Ok(Self::CreatedAt),
            "updatedAt" => Ok(Self::UpdatedAt),
            "lastVoteAt" => Ok(Self::LastVoteAt),
            "title" => Ok(Self::Title),
            "totalVotes" => Ok(Self::TotalVotes),
            "isActive" => Ok(Self::IsActive),
            other => Err(format!("cannot sort polls by '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}
