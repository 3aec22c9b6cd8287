//! Daemon-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Daemon ohne Konfigurationsdatei
//! lauffaehig ist.

use bearer_audio::Law;
use bearer_engine::config::{DEFAULT_DTMF_THRESHOLD, DEFAULT_MAX_CHANNELS, DEFAULT_POLL};
use bearer_engine::EngineOptions;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "BDSP_CONFIG";
/// Standardpfad der Konfigurationsdatei
pub const DEFAULT_CONFIG_PFAD: &str = "bearer-dspd.toml";

/// Fehler beim Laden der Konfiguration
#[derive(Debug, thiserror::Error)]
pub enum ConfigFehler {
    #[error("Konfigurationsdatei '{pfad}' nicht lesbar: {quelle}")]
    NichtLesbar {
        pfad: String,
        quelle: std::io::Error,
    },
    #[error("Konfigurationsfehler in '{pfad}': {quelle}")]
    Ungueltig {
        pfad: String,
        quelle: toml::de::Error,
    },
    #[error("Ungueltige Bind-Adresse '{0}'")]
    BindAdresse(String),
}

/// Vollstaendige Daemon-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Engine-Optionen
    pub engine: EngineEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Engine-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineEinstellungen {
    /// Kompandierungsgesetz: "alaw" oder "ulaw"
    pub law: Law,
    /// Samples pro Sample-Clock-Tick (0 = Standard, sonst 8..=256)
    pub poll: u32,
    /// Keine Hardware-Aushandlung
    pub no_hardware: bool,
    /// DTMF-Schwelle (20..=500)
    pub dtmf_threshold: u32,
    /// Guard-Timer der Feature-Aushandlung in Millisekunden
    pub negotiation_guard_ms: u64,
    /// Konferenz-Dump nach jeder Aenderung
    pub conference_dump: bool,
    /// Tiefe der Transport-Queues
    pub queue_depth: usize,
    /// Maximale Anzahl Kanaele
    pub max_channels: usize,
}

impl Default for EngineEinstellungen {
    fn default() -> Self {
        Self {
            law: Law::Alaw,
            poll: DEFAULT_POLL,
            no_hardware: false,
            dtmf_threshold: DEFAULT_DTMF_THRESHOLD,
            negotiation_guard_ms: 10,
            conference_dump: false,
            queue_depth: 256,
            max_channels: DEFAULT_MAX_CHANNELS,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level bzw. Filter: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Bind-Adresse
    pub bind_adresse: String,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

impl DaemonConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> Result<Self, ConfigFehler> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt).map_err(|quelle| ConfigFehler::Ungueltig {
                pfad: pfad.to_string(),
                quelle,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(quelle) => Err(ConfigFehler::NichtLesbar {
                pfad: pfad.to_string(),
                quelle,
            }),
        }
    }

    /// Pfad aus [`ENV_CONFIG`] oder der Standardpfad
    pub fn pfad_aus_env() -> String {
        std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_PFAD.into())
    }

    /// Engine-Optionen, Poll und Schwelle bereits geklemmt
    pub fn engine_optionen(&self) -> EngineOptions {
        let e = &self.engine;
        EngineOptions {
            law: e.law,
            no_hardware: e.no_hardware,
            poll: e.poll,
            dtmf_threshold: e.dtmf_threshold,
            negotiation_guard: Duration::from_millis(e.negotiation_guard_ms),
            conference_dump: e.conference_dump,
            max_channels: e.max_channels,
        }
        .validiert()
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> Result<SocketAddr, ConfigFehler> {
        let adresse = format!(
            "{}:{}",
            self.observability.bind_adresse, self.observability.port
        );
        adresse
            .parse()
            .map_err(|_| ConfigFehler::BindAdresse(adresse))
    }
}
