use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AppConfig, MAX_PAGE_SIZE};

use super::domain::{validate_new_poll, CreatePollRequest, PollId, PollOption, PollRecord};
use super::error::PollError;
use super::results::{PollAnalytics, PollResults, ResultsAggregator};
use super::store::{
    PollQuery, PollSortField, PollStore, PollUpdate, SortDirection, StoreError, VoteFilter,
};
use super::voting::{VoteReceipt, VoteStatus, VoteStatusQuery, VoteSubmission, VotingEngine};

/// Presentation settings shared by every poll operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub share_base_url: String,
    pub default_page_size: usize,
    /// Whether store failure details may reach API clients.
    pub expose_internal_errors: bool,
}

impl PollSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            share_base_url: config.polls.share_base_url.clone(),
            default_page_size: config.polls.page_size,
            expose_internal_errors: !config.environment.is_production(),
        }
    }

    pub fn share_url(&self, poll_id: &PollId) -> String {
        format!("{}/{}", self.share_base_url.trim_end_matches('/'), poll_id)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            share_base_url: "http://localhost:3000/polls".to_string(),
            default_page_size: 10,
            expose_internal_errors: true,
        }
    }
}

/// Poll document together with its shareable link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    #[serde(flatten)]
    pub poll: PollRecord,
    pub share_url: String,
}

/// Raw listing parameters as they arrive in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPollsParams {
    pub active: Option<bool>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub id: PollId,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Counted from vote documents, not the cached counter.
    pub total_votes: u64,
    pub option_count: usize,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_vote_at: Option<DateTime<Utc>>,
    pub share_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
    /// True when the page came back full. Does not probe for a next page.
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollPage {
    pub polls: Vec<PollSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub poll_id: PollId,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Facade composing the store, the voting engine and the results aggregator.
pub struct PollService<S> {
    store: Arc<S>,
    voting: VotingEngine<S>,
    results: ResultsAggregator<S>,
    settings: PollSettings,
}

impl<S> PollService<S>
where
    S: PollStore + 'static,
{
    pub fn new(store: Arc<S>, settings: PollSettings) -> Self {
        Self {
            voting: VotingEngine::new(store.clone()),
            results: ResultsAggregator::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn create_poll(&self, request: CreatePollRequest) -> Result<PollView, PollError> {
        let new_poll = validate_new_poll(request, Utc::now())?;
        let id = self.store.create_poll(new_poll)?;
        let poll = self.store.get_poll(&id)?.ok_or(PollError::NotFound)?;

        info!(poll_id = %id, options = poll.options.len(), "poll created");
        Ok(self.view(poll))
    }

    pub fn poll(&self, poll_id: &PollId) -> Result<PollView, PollError> {
        let poll = self.store.get_poll(poll_id)?.ok_or(PollError::NotFound)?;
        Ok(self.view(poll))
    }

    pub fn list_polls(&self, params: ListPollsParams) -> Result<PollPage, PollError> {
        let query = self.poll_query(params)?;
        let polls = self.store.query_polls(&query)?;

        let summaries = polls
            .into_iter()
            .map(|poll| self.summary(poll))
            .collect::<Result<Vec<_>, _>>()?;

        let pagination = Pagination {
            offset: query.offset,
            limit: query.limit,
            has_more: summaries.len() == query.limit,
        };
        Ok(PollPage {
            polls: summaries,
            pagination,
        })
    }

    /// Flips the active flag. Not serialised against concurrent toggles or votes.
    pub fn toggle_poll(&self, poll_id: &PollId) -> Result<ToggleOutcome, PollError> {
        let poll = self.store.get_poll(poll_id)?.ok_or(PollError::NotFound)?;
        let is_active = !poll.is_active;
        let updated_at = Utc::now();

        self.store
            .update_poll(
                poll_id,
                PollUpdate {
                    is_active: Some(is_active),
                    updated_at: Some(updated_at),
                },
            )
            .map_err(|err| match err {
                StoreError::NotFound => PollError::NotFound,
                other => other.into(),
            })?;

        info!(poll_id = %poll_id, is_active, "poll toggled");
        Ok(ToggleOutcome {
            poll_id: poll_id.clone(),
            is_active,
            updated_at,
        })
    }

    pub fn cast_vote(&self, submission: VoteSubmission) -> Result<VoteReceipt, PollError> {
        self.voting.cast_vote(submission)
    }

    pub fn vote_status(
        &self,
        query: &VoteStatusQuery,
        address: &str,
    ) -> Result<VoteStatus, PollError> {
        self.voting.vote_status(query, address)
    }

    pub fn results(&self, poll_id: &PollId) -> Result<PollResults, PollError> {
        self.results.results(poll_id)
    }

    pub fn analytics(&self, poll_id: &PollId) -> Result<PollAnalytics, PollError> {
        self.results.analytics(poll_id)
    }

    fn view(&self, poll: PollRecord) -> PollView {
        let share_url = self.settings.share_url(&poll.id);
        PollView { poll, share_url }
    }

    fn summary(&self, poll: PollRecord) -> Result<PollSummary, PollError> {
        let total_votes = self.store.count_votes(&VoteFilter::poll(&poll.id))?;
        let share_url = self.settings.share_url(&poll.id);

        Ok(PollSummary {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            host_name: poll.host_name,
            event_name: poll.event_name,
            total_votes,
            option_count: poll.options.len(),
            options: poll.options,
            is_active: poll.is_active,
            created_at: poll.created_at,
            last_vote_at: poll.last_vote_at,
            share_url,
        })
    }

    fn poll_query(&self, params: ListPollsParams) -> Result<PollQuery, PollError> {
        let sort_by = match params.sort_by.as_deref() {
            Some(field) => field.parse::<PollSortField>().map_err(PollError::Validation)?,
            None => PollSortField::CreatedAt,
        };
        let direction = match params.order.as_deref() {
            Some(order) => order.parse::<SortDirection>().map_err(PollError::Validation)?,
            None => SortDirection::Descending,
        };
        let limit = params.limit.unwrap_or(self.settings.default_page_size);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(PollError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(PollQuery {
            active: params.active,
            sort_by,
            direction,
            offset: params.offset.unwrap_or(0),
            limit,
        })
    }
}
