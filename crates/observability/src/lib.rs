//! # bearer-observability
//!
//! Observability fuer die Bearer-DSP:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check (`/health`) und Kanal-Uebersicht (`/channels`)
//! - Structured Logging via tracing-subscriber

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, ChannelEntry, HealthResponse, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, DspMetrics};

use anyhow::Result;
use bearer_engine::DspEngine;
use std::net::SocketAddr;
use std::sync::Arc;

/// Startet den Observability-HTTP-Server
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
/// - `GET /channels` – Kanal-Snapshots JSON
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    engine: Arc<DspEngine>,
    metriken: DspMetrics,
) -> Result<()> {
    use axum::Router;

    let app = Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(engine));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app).await?;
    Ok(())
}
