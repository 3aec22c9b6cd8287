//! Health-Check und Kanal-Uebersicht
//!
//! Endpunkte:
//! - `GET /health`: Status, Version, Uptime, Anzahl Kanaele und Konferenzen
//! - `GET /channels`: Snapshot aller Kanaele (Name, Zustand, Auslagerung)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use bearer_engine::{ChannelCounters, ChannelSnapshot, DspEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub channels: usize,
    pub conferences: usize,
}

/// Ein Eintrag der Kanal-Uebersicht
#[derive(Debug, Clone, Serialize)]
pub struct ChannelEntry {
    #[serde(flatten)]
    pub snapshot: ChannelSnapshot,
    pub counters: ChannelCounters,
}

/// Geteilter Zustand fuer die Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub engine: Arc<DspEngine>,
}

impl HealthState {
    pub fn neu(engine: Arc<DspEngine>) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            engine,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn antwort(&self) -> HealthResponse {
        let channels = self.engine.channel_count();
        let conferences = self.engine.conference_count();
        // Konferenzen ohne Kanaele deuten auf verlorene Mitgliedschaften
        let status = if channels == 0 && conferences > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            channels,
            conferences,
        }
    }

    pub fn kanaele(&self) -> Vec<ChannelEntry> {
        let stats = self.engine.stats();
        self.engine
            .channel_snapshots()
            .into_iter()
            .map(|snapshot| ChannelEntry {
                counters: stats.kanal(&snapshot.id).unwrap_or_default(),
                snapshot,
            })
            .collect()
    }
}

/// Axum-Router fuer `/health` und `/channels`
pub fn health_router(engine: Arc<DspEngine>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/channels", get(channels_handler))
        .with_state(HealthState::neu(engine))
}

/// `GET /health` – gibt den Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    // 200 auch bei degraded (Probe soll nicht failen)
    (StatusCode::OK, Json(state.antwort()))
}

/// `GET /channels` – Snapshot aller Kanaele
async fn channels_handler(State(state): State<HealthState>) -> impl IntoResponse {
    Json(state.kanaele())
}
