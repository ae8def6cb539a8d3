use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::domain::{PollId, PollOption, PollRecord, StoredVote};
use super::error::PollError;
use super::store::{PollStore, VoteFilter};

/// Format of the hourly buckets in [`PollAnalytics::votes_over_time`].
pub const HOUR_BUCKET_FORMAT: &str = "%Y-%m-%dT%H";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionResult {
    pub id: String,
    pub text: String,
    pub votes: u64,
    pub percentage: u32,
    pub rank: usize,
}

/// Live results for a poll, always derived from the vote documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: PollId,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_vote_at: Option<DateTime<Utc>>,
    pub total_votes: u64,
    pub results: Vec<OptionResult>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollAnalytics {
    pub poll_id: PollId,
    pub total_votes: u64,
    pub first_vote_at: Option<DateTime<Utc>>,
    pub last_vote_at: Option<DateTime<Utc>>,
    pub votes_over_time: BTreeMap<String, u64>,
    pub option_breakdown: BTreeMap<String, u64>,
    pub unique_users: usize,
    pub unique_devices: usize,
}

/// Read side of the engine: tallies, rankings and time-bucketed summaries.
pub struct ResultsAggregator<S> {
    store: Arc<S>,
}

impl<S> ResultsAggregator<S>
where
    S: PollStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn results(&self, poll_id: &PollId) -> Result<PollResults, PollError> {
        let poll = self.store.get_poll(poll_id)?.ok_or(PollError::NotFound)?;
        let votes = self.store.query_votes(&VoteFilter::poll(poll_id))?;

        let total_votes = votes.len() as u64;
        if total_votes != poll.total_votes {
            warn!(
                poll_id = %poll_id,
                cached = poll.total_votes,
                counted = total_votes,
                "cached vote counter differs from vote documents"
            );
        }

        let mut tallies: HashMap<&str, u64> = HashMap::new();
        for stored in &votes {
            *tallies.entry(stored.vote.option_id.as_str()).or_default() += 1;
        }
        let results = rank_options(&poll.options, &tallies, total_votes);

        let PollRecord {
            title,
            description,
            host_name,
            event_name,
            is_active,
            created_at,
            updated_at,
            last_vote_at,
            ..
        } = poll;

        Ok(PollResults {
            poll_id: poll_id.clone(),
            title,
            description,
            host_name,
            event_name,
            is_active,
            created_at,
            updated_at,
            last_vote_at,
            total_votes,
            results,
            last_updated: Utc::now(),
        })
    }

    pub fn analytics(&self, poll_id: &PollId) -> Result<PollAnalytics, PollError> {
        if self.store.get_poll(poll_id)?.is_none() {
            return Err(PollError::NotFound);
        }
        let votes = self
            .store
            .query_votes(&VoteFilter::poll(poll_id).oldest_first())?;

        Ok(summarize_votes(poll_id.clone(), &votes))
    }
}

/// Per-option counts and percentages in option order, then stably ranked by votes.
pub fn rank_options(
    options: &[PollOption],
    tallies: &HashMap<&str, u64>,
    total_votes: u64,
) -> Vec<OptionResult> {
    let mut results: Vec<OptionResult> = options
        .iter()
        .map(|option| {
            let votes = tallies.get(option.id.as_str()).copied().unwrap_or(0);
            OptionResult {
                id: option.id.clone(),
                text: option.text.clone(),
                votes,
                percentage: percentage(votes, total_votes),
                rank: 0,
            }
        })
        .collect();

    // sort_by is stable: ties keep option order.
    results.sort_by(|left, right| right.votes.cmp(&left.votes));
    for (index, result) in results.iter_mut().enumerate() {
        result.rank = index + 1;
    }
    results
}

/// `round(votes / total * 100)`, or 0 for an empty poll.
pub fn percentage(votes: u64, total_votes: u64) -> u32 {
    if total_votes == 0 {
        return 0;
    }
    ((votes as f64 / total_votes as f64) * 100.0).round() as u32
}

/// Single pass over votes already ordered by timestamp.
pub fn summarize_votes(poll_id: PollId, votes: &[StoredVote]) -> PollAnalytics {
    let mut votes_over_time = BTreeMap::new();
    let mut option_breakdown = BTreeMap::new();
    let mut users = HashSet::new();
    let mut devices = HashSet::new();
    let mut first_vote_at = None;
    let mut last_vote_at = None;

    for stored in votes {
        let vote = &stored.vote;
        first_vote_at.get_or_insert(vote.timestamp);
        last_vote_at = Some(vote.timestamp);

        *votes_over_time
            .entry(vote.timestamp.format(HOUR_BUCKET_FORMAT).to_string())
            .or_insert(0) += 1;
        *option_breakdown.entry(vote.option_id.clone()).or_insert(0) += 1;

        if let Some(user) = vote.user_id.as_deref() {
            users.insert(user);
        }
        if let Some(device) = vote.device_id.as_deref() {
            devices.insert(device);
        }
    }

    PollAnalytics {
        poll_id,
        total_votes: votes.len() as u64,
        first_vote_at,
        last_vote_at,
        votes_over_time,
        option_breakdown,
        unique_users: users.len(),
        unique_devices: devices.len(),
    }
}
