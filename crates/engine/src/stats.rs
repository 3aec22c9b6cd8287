//! Zaehler pro Kanal
//!
//! Wird ausserhalb der globalen kritischen Sektion gepflegt (DashMap mit
//! atomaren Zaehlern) und periodisch vom Daemon an Prometheus gemeldet.

use bearer_core::ChannelId;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelCounters {
    /// Frames an die Hardware-Schicht
    pub frames_tx: u64,
    /// Frames an die obere Schicht
    pub frames_rx: u64,
    /// Wegen Rueckstau verworfen
    pub drops_backpressure: u64,
    /// Wegen geschlossenem Empfangs-Gate verworfen
    pub drops_rx_gate: u64,
    /// Wegen Hardware-Bruecke nicht in die Konferenz gegeben
    pub drops_bridge: u64,
    pub dtmf_digits: u64,
    pub commands_ok: u64,
    pub commands_rejected: u64,
    /// Unerwartete Indikationen der Hardware-Schicht
    pub unexpected_indications: u64,
}

#[derive(Debug, Clone, Copy)]
pub enum Counter {
    FramesTx,
    FramesRx,
    DropsBackpressure,
    DropsRxGate,
    DropsBridge,
    DtmfDigits,
    CommandsOk,
    CommandsRejected,
    UnexpectedIndications,
}

// ---------------------------------------------------------------------------
// Intern
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AtomicCounters {
    werte: [AtomicU64; 9],
}

impl AtomicCounters {
    fn zaehlen(&self, zaehler: Counter, n: u64) {
        self.werte[zaehler as usize].fetch_add(n, Ordering::Relaxed);
    }

    fn lesen(&self) -> ChannelCounters {
        let w = |z: Counter| self.werte[z as usize].load(Ordering::Relaxed);
        ChannelCounters {
            frames_tx: w(Counter::FramesTx),
            frames_rx: w(Counter::FramesRx),
            drops_backpressure: w(Counter::DropsBackpressure),
            drops_rx_gate: w(Counter::DropsRxGate),
            drops_bridge: w(Counter::DropsBridge),
            dtmf_digits: w(Counter::DtmfDigits),
            commands_ok: w(Counter::CommandsOk),
            commands_rejected: w(Counter::CommandsRejected),
            unexpected_indications: w(Counter::UnexpectedIndications),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineStats
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct EngineStats {
    kanaele: DashMap<ChannelId, AtomicCounters>,
}

impl EngineStats {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn zaehlen(&self, kanal: &ChannelId, zaehler: Counter) {
        self.zaehlen_n(kanal, zaehler, 1);
    }

    /// Zaehlt nur fuer angelegte Kanaele; unbekannte Namen werden ignoriert
    pub fn zaehlen_n(&self, kanal: &ChannelId, zaehler: Counter, n: u64) {
        if let Some(eintrag) = self.kanaele.get(kanal) {
            eintrag.zaehlen(zaehler, n);
        }
    }

    /// Legt leere Zaehler fuer einen neuen Kanal an
    pub fn anlegen(&self, kanal: &ChannelId) {
        self.kanaele.entry(kanal.clone()).or_default();
    }

    pub fn kanal(&self, kanal: &ChannelId) -> Option<ChannelCounters> {
        self.kanaele.get(kanal).map(|c| c.lesen())
    }

    /// Summe ueber alle Kanaele
    pub fn gesamt(&self) -> ChannelCounters {
        self.kanaele.iter().fold(ChannelCounters::default(), |mut summe, e| {
            let c = e.value().lesen();
            summe.frames_tx += c.frames_tx;
            summe.frames_rx += c.frames_rx;
            summe.drops_backpressure += c.drops_backpressure;
            summe.drops_rx_gate += c.drops_rx_gate;
            summe.drops_bridge += c.drops_bridge;
            summe.dtmf_digits += c.dtmf_digits;
            summe.commands_ok += c.commands_ok;
            summe.commands_rejected += c.commands_rejected;
            summe.unexpected_indications += c.unexpected_indications;
            summe
        })
    }

    pub fn entfernen(&self, kanal: &ChannelId) {
        self.kanaele.remove(kanal);
    }

    /// Anzahl Kanaele mit Zaehlern
    pub fn anzahl(&self) -> usize {
        self.kanaele.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zaehler_pro_kanal() {
        let stats = EngineStats::neu();
        let a = ChannelId::new("A");
        let b = ChannelId::new("B");
        stats.anlegen(&a);
        stats.anlegen(&b);

        stats.zaehlen(&a, Counter::FramesTx);
        stats.zaehlen(&a, Counter::FramesTx);
        stats.zaehlen_n(&b, Counter::DtmfDigits, 3);

        assert_eq!(stats.kanal(&a).unwrap().frames_tx, 2);
        assert_eq!(stats.kanal(&b).unwrap().dtmf_digits, 3);
        assert_eq!(stats.gesamt().frames_tx, 2);
    }

    #[test]
    fn entfernen_loescht_zaehler() {
        let stats = EngineStats::neu();
        let a = ChannelId::new("A");
        stats.anlegen(&a);
        stats.zaehlen(&a, Counter::CommandsOk);
        stats.entfernen(&a);
        assert!(stats.kanal(&a).is_none());

        // Spaete Zaehlung nach dem Abbau legt nichts neu an
        stats.zaehlen(&a, Counter::FramesTx);
        assert!(stats.kanal(&a).is_none());
    }

    #[test]
    fn unbekannter_kanal_wird_nicht_gezaehlt() {
        let stats = EngineStats::neu();
        for i in 0..100 {
            stats.zaehlen(&ChannelId::new(format!("x{i}")), Counter::CommandsRejected);
        }
        assert_eq!(stats.anzahl(), 0);
        assert_eq!(stats.gesamt().commands_rejected, 0);
    }
}
