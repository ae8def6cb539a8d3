use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PollError;

/// Store-assigned identifier of a poll document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(pub String);

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned identifier of a vote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(pub String);

/// One selectable choice. The identifier is stable for the life of the poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
}

/// Poll document as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRecord {
    pub id: PollId,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_vote_at: Option<DateTime<Utc>>,
    /// Cached counter bumped on every accepted vote. Listings may read it,
    /// results never do.
    pub total_votes: u64,
}

impl PollRecord {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

/// Fields written when a poll is created; the store assigns the identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoll {
    pub title: String,
    pub description: String,
    pub host_name: Option<String>,
    pub event_name: Option<String>,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Immutable vote document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub poll_id: PollId,
    pub option_id: String,
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVote {
    pub id: VoteId,
    #[serde(flatten)]
    pub vote: VoteRecord,
}

/// Poll creation payload as accepted over HTTP.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

/// An option is either bare text or an object carrying a caller-chosen id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptionInput {
    Text(String),
    Detailed {
        #[serde(default)]
        id: Option<String>,
        text: String,
    },
}

impl OptionInput {
    fn parts(&self) -> (Option<&str>, &str) {
        match self {
            OptionInput::Text(text) => (None, text.as_str()),
            OptionInput::Detailed { id, text } => (id.as_deref(), text.as_str()),
        }
    }
}

impl From<&str> for OptionInput {
    fn from(value: &str) -> Self {
        OptionInput::Text(value.to_string())
    }
}

/// Validates a creation request and produces the document to write.
pub fn validate_new_poll(
    request: CreatePollRequest,
    created_at: DateTime<Utc>,
) -> Result<NewPoll, PollError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(PollError::Validation("title is required".to_string()));
    }
    if request.options.len() < 2 {
        return Err(PollError::Validation(
            "a poll needs at least 2 options".to_string(),
        ));
    }

    let options = build_options(&request.options, created_at)?;

    Ok(NewPoll {
        title: title.to_string(),
        description: request
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        host_name: non_blank(request.host_name.as_deref()),
        event_name: non_blank(request.event_name.as_deref()),
        options,
        is_active: true,
        created_at,
    })
}

/// Assigns `option_<millis>_<index>` ids where the caller supplied none.
pub fn build_options(
    inputs: &[OptionInput],
    created_at: DateTime<Utc>,
) -> Result<Vec<PollOption>, PollError> {
    let stamp = created_at.timestamp_millis();
    let mut seen = HashSet::new();
    let mut options = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let (id, text) = input.parts();
        let text = text.trim();
        if text.is_empty() {
            return Err(PollError::Validation(format!(
                "option {} must have non-empty text",
                index + 1
            )));
        }

        let id = match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => format!("option_{stamp}_{index}"),
        };
        if !seen.insert(id.clone()) {
            return Err(PollError::Validation(format!(
                "option id '{id}' is used more than once"
            )));
        }

        options.push(PollOption {
            id,
            text: text.to_string(),
        });
    }

    Ok(options)
}

/// Trims the value and maps blank strings to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
