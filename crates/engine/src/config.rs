//! Prozessweite Optionen der Engine
//!
//! Frueher globale Modulparameter, jetzt ein expliziter Wert, der beim
//! Erzeugen der Engine uebergeben wird.

use bearer_audio::Law;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Abtastrate eines Bearer-Kanals (Samples pro Sekunde)
pub const SAMPLE_RATE: u32 = 8000;

/// Samples pro Sample-Clock-Tick, falls nichts konfiguriert ist
pub const DEFAULT_POLL: u32 = 64;
/// Kleinster erlaubter Poll-Wert
pub const MIN_POLL: u32 = 8;
/// Groesster erlaubter Poll-Wert
pub const MAX_POLL: u32 = 256;

/// DTMF-Schwelle, falls nichts konfiguriert ist
pub const DEFAULT_DTMF_THRESHOLD: u32 = 100;
/// Ersatzwert fuer Schwellen ausserhalb des gueltigen Bereichs
pub const FALLBACK_DTMF_THRESHOLD: u32 = 200;
/// Gueltiger Bereich fuer die DTMF-Schwelle
pub const DTMF_THRESHOLD_RANGE: std::ops::RangeInclusive<u32> = 20..=500;
/// Faktor zwischen Schwelle und Energie-Schwelle des Detektors
pub const DTMF_ENERGY_FACTOR: u32 = 10_000;

/// Wartezeit auf eine Capability-Antwort
pub const DEFAULT_NEGOTIATION_GUARD: Duration = Duration::from_millis(10);

/// Obergrenze fuer gleichzeitig registrierte Kanaele
pub const DEFAULT_MAX_CHANNELS: usize = 1024;

// ---------------------------------------------------------------------------
// EngineOptions
// ---------------------------------------------------------------------------

/// Optionen der DSP-Engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Kompandierungsgesetz aller Kanaele
    pub law: Law,
    /// Keine Hardware-Aushandlung: Kanaele starten mit leerem Snapshot
    pub no_hardware: bool,
    /// Samples pro Sample-Clock-Tick
    pub poll: u32,
    /// DTMF-Schwelle (wird mit [`DTMF_ENERGY_FACTOR`] skaliert)
    pub dtmf_threshold: u32,
    /// Guard-Timer der Feature-Aushandlung
    pub negotiation_guard: Duration,
    /// Konferenz-Dump nach jeder Aenderung
    pub conference_dump: bool,
    /// Maximale Anzahl Kanaele
    pub max_channels: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            law: Law::Alaw,
            no_hardware: false,
            poll: DEFAULT_POLL,
            dtmf_threshold: DEFAULT_DTMF_THRESHOLD,
            negotiation_guard: DEFAULT_NEGOTIATION_GUARD,
            conference_dump: false,
            max_channels: DEFAULT_MAX_CHANNELS,
        }
    }
}

impl EngineOptions {
    /// Bringt Poll und DTMF-Schwelle in ihre gueltigen Bereiche
    pub fn validiert(mut self) -> Self {
        self.poll = poll_pruefen(self.poll);
        self.dtmf_threshold = dtmf_schwelle_pruefen(self.dtmf_threshold);
        if self.max_channels == 0 {
            self.max_channels = DEFAULT_MAX_CHANNELS;
        }
        self
    }

    /// Periode des Sample-Clock-Ticks (`poll / 8000 s`)
    pub fn tick_periode(&self) -> Duration {
        let poll = poll_pruefen(self.poll) as u64;
        Duration::from_micros(poll * 1_000_000 / SAMPLE_RATE as u64)
    }

    /// Energie-Schwelle fuer den DTMF-Detektor
    pub fn dtmf_energie(&self) -> u32 {
        dtmf_energie(self.dtmf_threshold)
    }
}

/// 0 ergibt den Standardwert, alles andere wird auf `8..=256` geklemmt
pub fn poll_pruefen(poll: u32) -> u32 {
    match poll {
        0 => DEFAULT_POLL,
        p if p > MAX_POLL => {
            tracing::error!(poll = p, maximal = MAX_POLL, "Poll zu gross – wird begrenzt");
            MAX_POLL
        }
        p if p < MIN_POLL => {
            tracing::error!(poll = p, minimal = MIN_POLL, "Poll zu klein – wird angehoben");
            MIN_POLL
        }
        p => p,
    }
}

/// Schwellen ausserhalb von `20..=500` fallen auf 200 zurueck
pub fn dtmf_schwelle_pruefen(schwelle: u32) -> u32 {
    if DTMF_THRESHOLD_RANGE.contains(&schwelle) {
        schwelle
    } else {
        tracing::warn!(
            schwelle,
            ersatz = FALLBACK_DTMF_THRESHOLD,
            "DTMF-Schwelle ausserhalb des Bereichs"
        );
        FALLBACK_DTMF_THRESHOLD
    }
}

pub fn dtmf_energie(schwelle: u32) -> u32 {
    schwelle.saturating_mul(DTMF_ENERGY_FACTOR)
}
