use axum::http::{header, Method};
use live_poll::config::AppConfig;
use live_poll::polls::{MemoryPollStore, PollService, PollSettings};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type MemoryPollService = PollService<MemoryPollStore>;

/// Poll service backed by the in-process store.
pub(crate) fn memory_poll_service(settings: PollSettings) -> Arc<MemoryPollService> {
    let store = Arc::new(MemoryPollStore::new());
    Arc::new(PollService::new(store, settings))
}

pub(crate) fn poll_service_from_config(config: &AppConfig) -> Arc<MemoryPollService> {
    memory_poll_service(PollSettings::from_config(config))
}

/// Browsers and mobile clients call the API from any origin.
pub(crate) fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
