//! Poll creation, vote ingestion, and live results.
//!
//! [`VotingEngine`] decides whether a vote is accepted; [`ResultsAggregator`]
//! turns stored votes into ranked results and hourly analytics. The two never
//! call each other and share nothing but the [`PollStore`] documents.
//! [`PollService`] composes them for the HTTP layer in [`router`].

pub mod domain;
pub mod error;
pub mod identity;
pub mod memory;
pub mod results;
pub mod router;
pub mod service;
pub mod store;
pub mod voting;

#[cfg(test)]
mod tests;

pub use domain::{
    CreatePollRequest, NewPoll, OptionInput, PollId, PollOption, PollRecord, StoredVote, VoteId,
    VoteRecord,
};
pub use error::PollError;
pub use identity::{resolve_identity, IdentityKind, VoterIdentity};
pub use memory::MemoryPollStore;
pub use results::{OptionResult, PollAnalytics, PollResults, ResultsAggregator};
pub use router::{poll_router, ApiEnvelope};
pub use service::{
    ListPollsParams, Pagination, PollPage, PollService, PollSettings, PollSummary, PollView,
    ToggleOutcome,
};
pub use store::{
    PollQuery, PollSortField, PollStore, PollUpdate, RecordedVote, SortDirection, StoreError,
    VoteFilter,
};
pub use voting::{VoteReceipt, VoteStatus, VoteStatusQuery, VoteSubmission, VotingEngine};
