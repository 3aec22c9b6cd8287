//! Kanal-Kontext – Zustand eines Bearer-Kanals
//!
//! Ein `ChannelContext` gehoert exklusiv dem Kanal-Register und wird nur
//! innerhalb der globalen kritischen Sektion gelesen oder veraendert. Die
//! Stufen-Instanzen (Tongenerator, Detektor, Canceller, Cipher) sind
//! kanaleigen und brauchen daher keine eigene Synchronisation.

use crate::capability::{DeferredRequests, FeatureSet, NegotiationState};
use crate::config::{dtmf_energie, EngineOptions};
use crate::offload::{self, ChannelFlags, HardwareBinding, OffloadPlan};
use crate::stages::{Cipher, DtmfDecoder, EchoCanceller, StageFactory, ToneGenerator};
use bearer_core::{ChannelId, ConferenceId, ToneId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Puffer
// ---------------------------------------------------------------------------

/// Groesse der Sende- und Empfangspuffer (Zweierpotenz)
pub const CHANNEL_BUFFER_SIZE: usize = 0x8000;
const PUFFER_MASKE: usize = CHANNEL_BUFFER_SIZE - 1;

/// Ringpuffer fuer die Konferenz-Zwischenspeicherung
///
/// Sende-Cursor sind leer bei `read == write`. Empfangs-Cursor sind `None`
/// bis zum ersten Empfang nach einer Aktivierung.
pub struct ChannelBuffers {
    tx: Box<[u8]>,
    tx_read: usize,
    tx_write: usize,
    rx: Box<[u8]>,
    rx_read: Option<usize>,
    rx_write: Option<usize>,
}

impl ChannelBuffers {
    pub fn new() -> Self {
        Self {
            tx: vec![0u8; CHANNEL_BUFFER_SIZE].into_boxed_slice(),
            tx_read: 0,
            tx_write: 0,
            rx: vec![0u8; CHANNEL_BUFFER_SIZE].into_boxed_slice(),
            rx_read: None,
            rx_write: None,
        }
    }

    /// Verwirft gepufferte Sendedaten
    pub fn tx_zuruecksetzen(&mut self) {
        self.tx_read = 0;
        self.tx_write = 0;
    }

    /// Zustand nach einer Aktivierung: Sendepuffer leer, Empfang neu
    pub fn aktivieren(&mut self) {
        self.tx_zuruecksetzen();
        self.rx_read = None;
        self.rx_write = None;
        self.rx.fill(0);
    }

    pub fn tx_cursors(&self) -> (usize, usize) {
        (self.tx_read, self.tx_write)
    }

    pub fn rx_cursors(&self) -> (Option<usize>, Option<usize>) {
        (self.rx_read, self.rx_write)
    }

    /// Anzahl gepufferter Sendebytes
    pub fn tx_verfuegbar(&self) -> usize {
        self.tx_write.wrapping_sub(self.tx_read) & PUFFER_MASKE
    }

    /// Haengt Sendedaten an; bei Ueberlauf gehen die aeltesten Bytes verloren
    pub fn tx_schreiben(&mut self, daten: &[u8]) {
        for &byte in daten {
            self.tx[self.tx_write] = byte;
            self.tx_write = (self.tx_write + 1) & PUFFER_MASKE;
            if self.tx_write == self.tx_read {
                self.tx_read = (self.tx_read + 1) & PUFFER_MASKE;
            }
        }
    }

    /// Liest bis zu `ziel.len()` Sendebytes; der Rest wird mit Stille gefuellt.
    /// Liefert die Anzahl tatsaechlich gelesener Bytes.
    pub fn tx_lesen(&mut self, ziel: &mut [u8], stille: u8) -> usize {
        let anzahl = self.tx_verfuegbar().min(ziel.len());
        for byte in ziel.iter_mut().take(anzahl) {
            *byte = self.tx[self.tx_read];
            self.tx_read = (self.tx_read + 1) & PUFFER_MASKE;
        }
        ziel[anzahl..].fill(stille);
        anzahl
    }

    /// Schreibt Empfangsdaten ab dem aktuellen Schreib-Cursor; bei Ueberlauf
    /// gehen wie beim Senden die aeltesten Bytes verloren
    pub fn rx_schreiben(&mut self, daten: &[u8]) {
        let mut pos = self.rx_write.unwrap_or(0);
        let mut lesen = *self.rx_read.get_or_insert(pos);
        for &byte in daten {
            self.rx[pos] = byte;
            pos = (pos + 1) & PUFFER_MASKE;
            if pos == lesen {
                lesen = (lesen + 1) & PUFFER_MASKE;
            }
        }
        self.rx_read = Some(lesen);
        self.rx_write = Some(pos);
    }

    /// Anzahl noch nicht gemischter Empfangsbytes
    pub fn rx_verfuegbar(&self) -> usize {
        match (self.rx_read, self.rx_write) {
            (Some(r), Some(w)) => w.wrapping_sub(r) & PUFFER_MASKE,
            _ => 0,
        }
    }

    /// Wie [`ChannelBuffers::tx_lesen`], fuer den Empfangspuffer
    pub fn rx_lesen(&mut self, ziel: &mut [u8], stille: u8) -> usize {
        let anzahl = self.rx_verfuegbar().min(ziel.len());
        if let Some(mut pos) = self.rx_read {
            for byte in ziel.iter_mut().take(anzahl) {
                *byte = self.rx[pos];
                pos = (pos + 1) & PUFFER_MASKE;
            }
            self.rx_read = Some(pos);
        }
        ziel[anzahl..].fill(stille);
        anzahl
    }

    /// Liest ein Empfangsbyte an einer absoluten Position
    pub fn rx_byte(&self, position: usize) -> u8 {
        self.rx[position & PUFFER_MASKE]
    }
}

impl Default for ChannelBuffers {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stufen-Zustand
// ---------------------------------------------------------------------------

pub(crate) struct ToneState {
    pub(crate) id: Option<ToneId>,
    pub(crate) generator: Box<dyn ToneGenerator>,
}

pub(crate) struct DtmfState {
    pub(crate) enabled: bool,
    pub(crate) threshold: u32,
    pub(crate) decoder: Box<dyn DtmfDecoder>,
}

pub(crate) struct EchoCancelState {
    pub(crate) params: Option<(u32, u32)>,
    pub(crate) canceller: Option<Box<dyn EchoCanceller>>,
}

pub(crate) struct CipherState {
    pub(crate) cipher: Option<Box<dyn Cipher>>,
    pub(crate) last_outcome: Option<CipherOutcome>,
}

/// Ergebnis des letzten Schluessel-Setzens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherOutcome {
    Accepted,
    Rejected,
}

// ---------------------------------------------------------------------------
// ChannelContext
// ---------------------------------------------------------------------------

pub struct ChannelContext {
    pub(crate) id: ChannelId,
    pub(crate) conference: Option<ConferenceId>,

    pub(crate) rx_disabled: bool,
    pub(crate) tx_mix: bool,
    pub(crate) echo_test: bool,

    pub(crate) tone: ToneState,
    pub(crate) dtmf: DtmfState,
    pub(crate) tx_gain: i32,
    pub(crate) rx_gain: i32,
    pub(crate) echo: EchoCancelState,
    pub(crate) cipher: CipherState,

    pub(crate) features: FeatureSet,
    pub(crate) hardware: HardwareBinding,
    pub(crate) active: bool,
    pub(crate) buffers: ChannelBuffers,

    pub(crate) negotiation: NegotiationState,
    pub(crate) deferred: DeferredRequests,
    pub(crate) offload: OffloadPlan,
}

impl ChannelContext {
    pub(crate) fn new(id: ChannelId, fabrik: &dyn StageFactory, optionen: &EngineOptions) -> Self {
        let mut decoder = fabrik.dtmf_decoder(&id);
        decoder.reset(optionen.dtmf_energie());

        let negotiation = if optionen.no_hardware {
            NegotiationState::CapabilitiesReceived
        } else {
            NegotiationState::Uninitialized
        };

        Self {
            tone: ToneState {
                id: None,
                generator: fabrik.tone_generator(&id),
            },
            dtmf: DtmfState {
                enabled: false,
                threshold: optionen.dtmf_threshold,
                decoder,
            },
            id,
            conference: None,
            rx_disabled: false,
            tx_mix: false,
            echo_test: false,
            tx_gain: 0,
            rx_gain: 0,
            echo: EchoCancelState {
                params: None,
                canceller: None,
            },
            cipher: CipherState {
                cipher: None,
                last_outcome: None,
            },
            features: FeatureSet::default(),
            hardware: HardwareBinding::default(),
            active: false,
            buffers: ChannelBuffers::new(),
            negotiation,
            deferred: DeferredRequests::default(),
            offload: OffloadPlan::default(),
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn flags(&self) -> ChannelFlags {
        ChannelFlags {
            active: self.active,
            in_conference: self.conference.is_some(),
            tone_active: self.tone.id.is_some(),
            dtmf_enabled: self.dtmf.enabled,
            echo_cancel_enabled: self.echo.canceller.is_some(),
            cipher_enabled: self.cipher.cipher.is_some(),
            echo_test: self.echo_test,
            tx_mix: self.tx_mix,
            rx_disabled: self.rx_disabled,
            tx_gain: self.tx_gain,
            rx_gain: self.rx_gain,
        }
    }

    /// Leitet den Auslagerungsplan neu ab; true wenn er sich geaendert hat
    pub(crate) fn plan_aktualisieren(&mut self) -> bool {
        let neu = offload::derive(&self.flags(), &self.features);
        let geaendert = neu != self.offload;
        if geaendert {
            tracing::debug!(
                kanal = %self.id,
                ton = ?neu.tone,
                dtmf = ?neu.dtmf,
                echo = ?neu.echo_cancel,
                bruecke = neu.crossconnect_eligible,
                "Auslagerungsplan geaendert"
            );
        }
        self.offload = neu;
        geaendert
    }

    /// Ton aus, ohne Puffer und Timer anzufassen
    pub(crate) fn ton_beenden(&mut self) {
        if self.tone.id.take().is_some() {
            self.tone.generator.stop();
        }
    }

    pub(crate) fn dtmf_zuruecksetzen(&mut self) {
        self.dtmf.decoder.reset(dtmf_energie(self.dtmf.threshold));
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            id: self.id.clone(),
            conference: self.conference,
            active: self.active,
            negotiation: self.negotiation,
            deferred: self.deferred.clone(),
            features: self.features.clone(),
            flags: self.flags(),
            offload: self.offload,
            hardware: self.hardware,
            tone: self.tone.id,
            dtmf_threshold: self.dtmf.threshold,
            echo_cancel: self.echo.params,
            cipher_outcome: self.cipher.last_outcome,
            tx_cursors: self.buffers.tx_cursors(),
            rx_cursors: self.buffers.rx_cursors(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Lesbare Kopie des Kanalzustands (Tests, `/channels`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub conference: Option<ConferenceId>,
    pub active: bool,
    pub negotiation: NegotiationState,
    pub deferred: DeferredRequests,
    pub features: FeatureSet,
    pub flags: ChannelFlags,
    pub offload: OffloadPlan,
    pub hardware: HardwareBinding,
    pub tone: Option<ToneId>,
    pub dtmf_threshold: u32,
    pub echo_cancel: Option<(u32, u32)>,
    pub cipher_outcome: Option<CipherOutcome>,
    pub tx_cursors: (usize, usize),
    pub rx_cursors: (Option<usize>, Option<usize>),
}
