use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::domain::{CreatePollRequest, PollId};
use super::error::PollError;
use super::service::{ListPollsParams, PollService};
use super::store::PollStore;
use super::voting::{VoteStatusQuery, VoteSubmission};

/// Address recorded when neither a forwarding header nor a peer address is known.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Response envelope shared by every poll endpoint.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Request body of `POST /vote`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[serde(default)]
    pub poll_id: String,
    #[serde(default)]
    pub option_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Router builder exposing the poll endpoints.
pub fn poll_router<S>(service: Arc<PollService<S>>) -> Router
where
    S: PollStore + 'static,
{
    Router::new()
        .route(
            "/polls",
            post(create_poll_handler::<S>).get(list_polls_handler::<S>),
        )
        .route("/polls/:poll_id", get(poll_handler::<S>))
        .route("/polls/:poll_id/toggle", put(toggle_handler::<S>))
        .route("/polls/:poll_id/analytics", get(analytics_handler::<S>))
        .route("/vote", post(vote_handler::<S>))
        .route("/check-vote", post(check_vote_handler::<S>))
        .route("/results/:poll_id", get(results_handler::<S>))
        .with_state(service)
}

pub(crate) async fn create_poll_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    payload: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Response
where
    S: PollStore + 'static,
{
    let expose = service.settings().expose_internal_errors;
    let result = json_body(payload).and_then(|request| service.create_poll(request));

    match result {
        Ok(view) => (
            StatusCode::CREATED,
            Json(ApiEnvelope::ok(view).with_message("Poll created successfully")),
        )
            .into_response(),
        Err(err) => error_response(err, expose),
    }
}

pub(crate) async fn list_polls_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    params: Result<Query<ListPollsParams>, QueryRejection>,
) -> Response
where
    S: PollStore + 'static,
{
    let result = params
        .map(|Query(params)| params)
        .map_err(|rejection| PollError::Validation(rejection.body_text()))
        .and_then(|params| service.list_polls(params));
    respond(result, service.settings().expose_internal_errors)
}

pub(crate) async fn poll_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    Path(poll_id): Path<String>,
) -> Response
where
    S: PollStore + 'static,
{
    respond(
        service.poll(&PollId(poll_id)),
        service.settings().expose_internal_errors,
    )
}

pub(crate) async fn toggle_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    Path(poll_id): Path<String>,
) -> Response
where
    S: PollStore + 'static,
{
    respond(
        service.toggle_poll(&PollId(poll_id)),
        service.settings().expose_internal_errors,
    )
}

pub(crate) async fn analytics_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    Path(poll_id): Path<String>,
) -> Response
where
    S: PollStore + 'static,
{
    respond(
        service.analytics(&PollId(poll_id)),
        service.settings().expose_internal_errors,
    )
}

pub(crate) async fn results_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    Path(poll_id): Path<String>,
) -> Response
where
    S: PollStore + 'static,
{
    respond(
        service.results(&PollId(poll_id)),
        service.settings().expose_internal_errors,
    )
}

pub(crate) async fn vote_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Response
where
    S: PollStore + 'static,
{
    let expose = service.settings().expose_internal_errors;
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return error_response(err, expose),
    };

    let submission = VoteSubmission {
        poll_id: request.poll_id,
        option_id: request.option_id,
        user_id: request.user_id,
        device_id: request.device_id,
        address: client_address(&headers, connect_info.as_ref()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    match service.cast_vote(submission) {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(ApiEnvelope::ok(receipt).with_message("Vote submitted successfully")),
        )
            .into_response(),
        Err(err) => error_response(err, expose),
    }
}

pub(crate) async fn check_vote_handler<S>(
    State(service): State<Arc<PollService<S>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<VoteStatusQuery>, JsonRejection>,
) -> Response
where
    S: PollStore + 'static,
{
    let expose = service.settings().expose_internal_errors;
    let address = client_address(&headers, connect_info.as_ref());
    let result = json_body(payload).and_then(|query| service.vote_status(&query, &address));
    respond(result, expose)
}

/// First `X-Forwarded-For` hop, else the peer address, else [`UNKNOWN_ADDRESS`].
pub fn client_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (forwarded, connect_info) {
        (Some(forwarded), _) => forwarded.to_string(),
        (None, Some(ConnectInfo(peer))) => peer.ip().to_string(),
        (None, None) => UNKNOWN_ADDRESS.to_string(),
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PollError> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| PollError::Validation("Request body contains invalid JSON".to_string()))
}

fn respond<T: Serialize>(result: Result<T, PollError>, expose_internal_errors: bool) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiEnvelope::ok(data))).into_response(),
        Err(err) => error_response(err, expose_internal_errors),
    }
}

/// Translates a poll failure into its status code and envelope.
pub fn error_response(err: PollError, expose_internal_errors: bool) -> Response {
    let status = match &err {
        PollError::Validation(_) | PollError::InvalidOption => StatusCode::BAD_REQUEST,
        PollError::NotFound => StatusCode::NOT_FOUND,
        PollError::Forbidden => StatusCode::FORBIDDEN,
        PollError::Conflict => StatusCode::CONFLICT,
        PollError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &err {
        PollError::Store(source) => {
            error!(error = %source, "poll store failure");
            if expose_internal_errors {
                source.to_string()
            } else {
                "Something went wrong".to_string()
            }
        }
        other => other.to_string(),
    };

    let mut payload = json!({
        "success": false,
        "error": err.label(),
        "message": message,
    });
    if matches!(err, PollError::Conflict) {
        payload["data"] = json!({ "hasVoted": true });
    }

    (status, Json(payload)).into_response()
}
