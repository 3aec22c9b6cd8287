//! Sample-Clock – periodischer Takt fuer die Konferenz-Verarbeitung
//!
//! Ein Tick alle `poll / 8000` Sekunden. Jeder Tick meldet, wie viele
//! Samples seit dem letzten Tick tatsaechlich vergangen sind (aus der
//! monotonen Uhr, mit Uebertrag des Bruchteils). Verspaetete Ticks werden so
//! ausgeglichen statt verloren; nach langen Aussetzern wird auf `8 * poll`
//! begrenzt.

use crate::config::{poll_pruefen, EngineOptions, SAMPLE_RATE};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const NANOS_PRO_SEKUNDE: u128 = 1_000_000_000;
/// Hoechstens so viele Polls werden pro Tick nachgeholt
const MAX_NACHHOLEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Laufende Nummer ab 1
    pub sequence: u64,
    /// Seit dem letzten Tick vergangene Samples
    pub samples: usize,
}

/// Zaehlt vergangene Samples mit Uebertrag
#[derive(Debug, Clone)]
pub struct SampleCounter {
    poll: usize,
    rest: u128,
}

impl SampleCounter {
    pub fn neu(poll: u32) -> Self {
        Self {
            poll: poll_pruefen(poll) as usize,
            rest: 0,
        }
    }

    pub fn samples_seit(&mut self, vergangen: Duration) -> usize {
        let zaehler = vergangen.as_nanos() * SAMPLE_RATE as u128 + self.rest;
        let samples = (zaehler / NANOS_PRO_SEKUNDE) as usize;
        self.rest = zaehler % NANOS_PRO_SEKUNDE;

        let maximal = self.poll * MAX_NACHHOLEN;
        if samples > maximal {
            tracing::warn!(samples, maximal, "Sample-Clock zu spaet – Samples begrenzt");
            self.rest = 0;
            return maximal;
        }
        samples
    }
}

pub struct SampleClock {
    interval: Interval,
    zaehler: SampleCounter,
    letzter: Instant,
    sequenz: u64,
}

impl SampleClock {
    /// Muss innerhalb einer Tokio-Laufzeit erzeugt werden
    pub fn neu(optionen: &EngineOptions) -> Self {
        let periode = optionen.tick_periode();
        let start = Instant::now();
        let mut interval = tokio::time::interval_at(start + periode, periode);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll = poll_pruefen(optionen.poll),
            periode_us = periode.as_micros() as u64,
            "Sample-Clock gestartet"
        );

        Self {
            interval,
            zaehler: SampleCounter::neu(optionen.poll),
            letzter: start,
            sequenz: 0,
        }
    }

    /// Wartet auf den naechsten Tick
    pub async fn tick(&mut self) -> ClockTick {
        let jetzt = self.interval.tick().await;
        let vergangen = jetzt.saturating_duration_since(self.letzter);
        self.letzter = jetzt;
        self.sequenz += 1;

        ClockTick {
            sequence: self.sequenz,
            samples: self.zaehler.samples_seit(vergangen),
        }
    }
}
