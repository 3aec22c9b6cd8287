//! Prometheus-kompatible Metriken fuer die Bearer-DSP
//!
//! Registrierte Metriken:
//! - `bdsp_channels` – Gauge: Registrierte Kanaele
//! - `bdsp_channels_active` – Gauge: Aktivierte Kanaele
//! - `bdsp_conferences` – Gauge: Konferenzen mit Mitgliedern
//! - `bdsp_frames_total` – Counter: Weitergereichte Frames (richtung)
//! - `bdsp_frames_dropped_total` – Counter: Verworfene Frames (grund)
//! - `bdsp_dtmf_digits_total` – Counter: Erkannte DTMF-Ziffern
//! - `bdsp_commands_total` – Counter: Control-Kommandos (ergebnis)
//! - `bdsp_unexpected_indications_total` – Counter: Unerwartete Hardware-Indikationen
//!
//! Die Engine zaehlt selbst in [`EngineStats`]; [`DspMetrics::uebernehmen`]
//! spiegelt die Summen periodisch in die Prometheus-Registry.

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use bearer_engine::{ChannelCounters, DspEngine};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Prometheus-Metriken der Bearer-DSP
#[derive(Clone)]
pub struct DspMetrics {
    pub registry: Arc<Registry>,

    // Zustand
    pub channels: IntGauge,
    pub channels_active: IntGauge,
    pub conferences: IntGauge,

    // Datenpfad
    pub frames_total: IntCounterVec,
    pub frames_dropped_total: IntCounterVec,
    pub dtmf_digits_total: IntCounter,

    // Control
    pub commands_total: IntCounterVec,
    pub unexpected_indications_total: IntCounter,
}

impl DspMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Zustand ---
        let channels = IntGauge::with_opts(Opts::new("bdsp_channels", "Anzahl registrierter Kanaele"))?;
        registry.register(Box::new(channels.clone()))?;

        let channels_active = IntGauge::with_opts(Opts::new(
            "bdsp_channels_active",
            "Anzahl aktivierter Kanaele",
        ))?;
        registry.register(Box::new(channels_active.clone()))?;

        let conferences = IntGauge::with_opts(Opts::new(
            "bdsp_conferences",
            "Anzahl Konferenzen mit mindestens einem Mitglied",
        ))?;
        registry.register(Box::new(conferences.clone()))?;

        // --- Datenpfad ---
        let frames_total = IntCounterVec::new(
            Opts::new("bdsp_frames_total", "Weitergereichte Frames"),
            &["richtung"],
        )?;
        registry.register(Box::new(frames_total.clone()))?;

        let frames_dropped_total = IntCounterVec::new(
            Opts::new("bdsp_frames_dropped_total", "Verworfene Frames"),
            &["grund"],
        )?;
        registry.register(Box::new(frames_dropped_total.clone()))?;

        let dtmf_digits_total = IntCounter::with_opts(Opts::new(
            "bdsp_dtmf_digits_total",
            "Erkannte DTMF-Ziffern",
        ))?;
        registry.register(Box::new(dtmf_digits_total.clone()))?;

        // --- Control ---
        let commands_total = IntCounterVec::new(
            Opts::new("bdsp_commands_total", "Control-Kommandos"),
            &["ergebnis"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let unexpected_indications_total = IntCounter::with_opts(Opts::new(
            "bdsp_unexpected_indications_total",
            "Unerwartete Indikationen der Hardware-Schicht",
        ))?;
        registry.register(Box::new(unexpected_indications_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            channels,
            channels_active,
            conferences,
            frames_total,
            frames_dropped_total,
            dtmf_digits_total,
            commands_total,
            unexpected_indications_total,
        })
    }

    /// Uebernimmt Zaehlerstaende der Engine
    ///
    /// Prometheus-Counter koennen nur wachsen: nach dem Abbau eines Kanals
    /// sinkt die Engine-Summe, der Counter bleibt dann stehen.
    pub fn zaehler_uebernehmen(&self, stand: &ChannelCounters) {
        nachziehen(&self.frames_total.with_label_values(&["tx"]), stand.frames_tx);
        nachziehen(&self.frames_total.with_label_values(&["rx"]), stand.frames_rx);
        nachziehen(
            &self.frames_dropped_total.with_label_values(&["rueckstau"]),
            stand.drops_backpressure,
        );
        nachziehen(
            &self.frames_dropped_total.with_label_values(&["empfang_aus"]),
            stand.drops_rx_gate,
        );
        nachziehen(
            &self.frames_dropped_total.with_label_values(&["bruecke"]),
            stand.drops_bridge,
        );
        nachziehen(&self.dtmf_digits_total, stand.dtmf_digits);
        nachziehen(&self.commands_total.with_label_values(&["ok"]), stand.commands_ok);
        nachziehen(
            &self.commands_total.with_label_values(&["abgelehnt"]),
            stand.commands_rejected,
        );
        nachziehen(&self.unexpected_indications_total, stand.unexpected_indications);
    }

    /// Ein Abgleich mit dem aktuellen Engine-Zustand
    pub fn uebernehmen(&self, engine: &DspEngine) {
        let kanaele = engine.channel_snapshots();
        self.channels.set(kanaele.len() as i64);
        self.channels_active
            .set(kanaele.iter().filter(|k| k.active).count() as i64);
        self.conferences.set(engine.conference_count() as i64);
        self.zaehler_uebernehmen(&engine.stats().gesamt());
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn nachziehen(counter: &IntCounter, ziel: u64) {
    let aktuell = counter.get();
    if ziel > aktuell {
        counter.inc_by(ziel - aktuell);
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: DspMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<DspMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
