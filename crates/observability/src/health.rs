//! Health-Check-Endpunkt fuer den Relay
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Vector-Store-Verbindungsstatus

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub vector_store_connected: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler. `vector_store_connected`
/// reflects reachability of the transcript vector store backing
/// `relay-semantic`; it is a soft dependency, so its absence degrades rather
/// than fails the health check.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub vector_store_connected: Arc<std::sync::atomic::AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            vector_store_connected: Arc::new(std::sync::atomic::AtomicBool::new(true)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn vector_store_verbunden(&self) -> bool {
        self.vector_store_connected.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn vector_store_status_setzen(&self, verbunden: bool) {
        self.vector_store_connected
            .store(verbunden, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router() -> Router {
    let state = HealthState::neu();
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let vector_store_connected = state.vector_store_verbunden();
    let status = if vector_store_connected {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let http_status = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK, // 200 auch bei degraded (Probe soll nicht failen)
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        vector_store_connected,
    };

    (http_status, Json(response))
}
