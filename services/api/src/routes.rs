use crate::infra::AppState;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use live_poll::polls::{poll_router, PollService, PollStore};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<S>(service: Arc<PollService<S>>) -> Router
where
    S: PollStore + 'static,
{
    poll_router(service)
        .route("/", get(index))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .fallback(not_found)
}

pub(crate) async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Live Polling API is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "createPoll": "POST /polls",
            "listPolls": "GET /polls",
            "poll": "GET /polls/:pollId",
            "togglePoll": "PUT /polls/:pollId/toggle",
            "analytics": "GET /polls/:pollId/analytics",
            "vote": "POST /vote",
            "checkVote": "POST /check-vote",
            "results": "GET /results/:pollId",
        },
    }))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Endpoint not found",
            "message": format!("The endpoint {method} {uri} does not exist"),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory_poll_service;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use live_poll::polls::PollSettings;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> Router {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_service_routes(memory_poll_service(PollSettings::default())).layer(Extension(state))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn index_lists_poll_endpoints() {
        let response = app(true).oneshot(get("/")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["endpoints"]["vote"], json!("POST /vote"));
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let response = app(false)
            .oneshot(get("/ready"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(get("/ready"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_returns_json_not_found() {
        let response = app(true)
            .oneshot(get("/nope"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let payload = body_json(response).await;
        assert_eq!(payload["error"], json!("Endpoint not found"));
        assert_eq!(
            payload["message"],
            json!("The endpoint GET /nope does not exist")
        );
    }

    #[tokio::test]
    async fn poll_routes_are_mounted() {
        let response = app(true)
            .oneshot(get("/results/poll-404"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let payload = body_json(response).await;
        assert_eq!(payload["error"], json!("Poll not found"));
    }
}
