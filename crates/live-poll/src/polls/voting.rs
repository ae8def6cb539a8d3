use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{non_blank, PollId, VoteId, VoteRecord};
use super::error::PollError;
use super::identity::{resolve_identity, IdentityKind};
use super::store::{PollStore, StoreError, VoteFilter};

/// Vote as submitted by a client. The network address and user agent come
/// from the transport, not from the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSubmission {
    pub poll_id: String,
    pub option_id: String,
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub address: String,
    pub user_agent: Option<String>,
}

/// Outcome of an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub poll_id: PollId,
    pub option_id: String,
    pub vote_id: VoteId,
    /// Live count of votes for `option_id`, including this one.
    pub vote_count: u64,
    /// The poll's cached counter as left by this vote's increment.
    pub total_votes: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusQuery {
    #[serde(default)]
    pub poll_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub poll_id: PollId,
    pub has_voted: bool,
    pub checked_by: IdentityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_at: Option<DateTime<Utc>>,
}

/// Accepts or rejects votes. Holds no state beyond the store handle.
///
/// The duplicate check and the write are separate store calls, so two
/// concurrent requests for the same identity can both pass the check unless
/// the store rejects the second write (which `MemoryPollStore` does).
pub struct VotingEngine<S> {
    store: Arc<S>,
}

impl<S> VotingEngine<S>
where
    S: PollStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn cast_vote(&self, submission: VoteSubmission) -> Result<VoteReceipt, PollError> {
        self.cast_vote_at(submission, Utc::now())
    }

    /// Ingests a vote stamped with `timestamp`.
    pub fn cast_vote_at(
        &self,
        submission: VoteSubmission,
        timestamp: DateTime<Utc>,
    ) -> Result<VoteReceipt, PollError> {
        let poll_id = required(&submission.poll_id, "pollId")?;
        let option_id = required(&submission.option_id, "optionId")?;
        let poll_id = PollId(poll_id);

        let poll = self
            .store
            .get_poll(&poll_id)?
            .ok_or(PollError::NotFound)?;
        if !poll.is_active {
            return Err(PollError::Forbidden);
        }
        if !poll.has_option(&option_id) {
            return Err(PollError::InvalidOption);
        }

        let user_id = non_blank(submission.user_id.as_deref());
        let device_id = non_blank(submission.device_id.as_deref());
        let identity = resolve_identity(
            user_id.as_deref(),
            device_id.as_deref(),
            &submission.address,
        );

        let existing = self
            .store
            .count_votes(&VoteFilter::poll(&poll_id).identity(identity.clone()))?;
        if existing > 0 {
            info!(poll_id = %poll_id, kind = ?identity.kind, "duplicate vote rejected");
            return Err(PollError::Conflict);
        }

        let vote = VoteRecord {
            poll_id: poll_id.clone(),
            option_id: option_id.clone(),
            user_id,
            device_id,
            ip_address: submission.address,
            user_agent: non_blank(submission.user_agent.as_deref()),
            timestamp,
        };
        let recorded = match self.store.record_vote(vote) {
            Ok(recorded) => recorded,
            Err(StoreError::Conflict) => {
                info!(poll_id = %poll_id, kind = ?identity.kind, "duplicate vote rejected by store");
                return Err(PollError::Conflict);
            }
            Err(StoreError::NotFound) => return Err(PollError::NotFound),
            Err(other) => return Err(other.into()),
        };

        let vote_count = self
            .store
            .count_votes(&VoteFilter::poll(&poll_id).option(&option_id))?;
        let total_votes = recorded.total_votes;

        info!(
            poll_id = %poll_id,
            option_id = %option_id,
            vote_count,
            total_votes,
            "vote recorded"
        );

        Ok(VoteReceipt {
            poll_id,
            option_id,
            vote_id: recorded.id,
            vote_count,
            total_votes,
            timestamp,
        })
    }

    /// Reports whether the resolved identity already voted on the poll.
    /// Read-only; the poll does not need to exist or be active.
    pub fn vote_status(
        &self,
        query: &VoteStatusQuery,
        address: &str,
    ) -> Result<VoteStatus, PollError> {
        let poll_id = PollId(required(&query.poll_id, "pollId")?);
        let identity = resolve_identity(
            query.user_id.as_deref(),
            query.device_id.as_deref(),
            address,
        );
        let checked_by = identity.kind;

        let previous = self
            .store
            .query_votes(&VoteFilter::poll(&poll_id).identity(identity).oldest_first())?
            .into_iter()
            .next();
        debug!(poll_id = %poll_id, kind = ?checked_by, found = previous.is_some(), "vote status checked");

        Ok(match previous {
            Some(stored) => VoteStatus {
                poll_id,
                has_voted: true,
                checked_by,
                option_id: Some(stored.vote.option_id),
                voted_at: Some(stored.vote.timestamp),
            },
            None => VoteStatus {
                poll_id,
                has_voted: false,
                checked_by,
                option_id: None,
                voted_at: None,
            },
        })
    }
}

fn required(value: &str, field: &str) -> Result<String, PollError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PollError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}
