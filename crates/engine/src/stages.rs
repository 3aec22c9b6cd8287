//! Schnittstellen zu den externen Stufen-Engines
//!
//! Tonerzeugung, DTMF-Dekodierung, Echo-Unterdrueckung, Verschluesselung und
//! Konferenz-Mischung sind nicht Teil des Kerns. Der Kern ruft sie ueber die
//! Traits in diesem Modul auf, immer innerhalb der globalen kritischen
//! Sektion. Keine Implementierung darf blockieren.
//!
//! Pro Kanal erzeugt eine [`StageFactory`] die kanaleigenen Instanzen; die
//! [`ConferenceEngine`] ist prozessweit.

use crate::channel::ChannelBuffers;
use crate::capability::FeatureSet;
use crate::offload::{HardwareBinding, OffloadPlan};
use bearer_audio::{Frame, Law};
use bearer_core::{ChannelId, ConferenceId, ToneId};
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Konfigurationsfehler einer Stufe
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Unbekannter Ton: {0}")]
    UnbekannterTon(ToneId),

    #[error("Ungueltige Parameter: {0}")]
    UngueltigeParameter(String),

    #[error("Schluessel abgelehnt: {0}")]
    SchluesselAbgelehnt(String),

    #[error("Stufe nicht verfuegbar: {0}")]
    NichtVerfuegbar(&'static str),
}

impl From<StageError> for bearer_core::DspError {
    fn from(e: StageError) -> Self {
        bearer_core::DspError::UngueltigesArgument(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Kanaleigene Stufen
// ---------------------------------------------------------------------------

/// Synthetische Tonerzeugung
pub trait ToneGenerator: Send {
    /// Startet ein Tonmuster
    ///
    /// Liefert die Dauer bis zum naechsten Musterwechsel (None = Dauerton).
    /// Bei einem Fehler bleibt der vorherige Ton unveraendert.
    fn start(&mut self, ton: ToneId) -> Result<Option<Duration>, StageError>;

    fn stop(&mut self);

    /// Ueberschreibt die Bytes mit dem naechsten Ausschnitt des Tons
    fn fill(&mut self, daten: &mut [u8]);

    /// Naechster Musterabschnitt nach Ablauf des Ton-Timers
    fn advance(&mut self) -> Option<Duration>;
}

/// DTMF-Erkennung
pub trait DtmfDecoder: Send {
    /// Setzt den Detektorzustand zurueck
    fn reset(&mut self, energie_schwelle: u32);

    /// Software-Dekodierung von Law-Samples
    fn decode(&mut self, daten: &[u8], law: Law) -> Vec<char>;

    /// Dekodierung von Koeffizienten der Hardware-Erkennung
    fn decode_coefficients(&mut self, koeffizienten: &[u8]) -> Vec<char>;
}

/// Adaptive Echo-Unterdrueckung
pub trait EchoCanceller: Send {
    /// Sendesignal als Referenz
    fn transmit(&mut self, daten: &mut [u8]);

    /// Entfernt das Echo aus dem Empfangssignal
    fn receive(&mut self, daten: &mut [u8]);
}

/// Symmetrische Verschluesselung der Nutzdaten
pub trait Cipher: Send {
    fn encrypt(&mut self, daten: &mut [u8]);
    fn decrypt(&mut self, daten: &mut [u8]);
}

/// Erzeugt die kanaleigenen Stufen
pub trait StageFactory: Send + Sync {
    fn tone_generator(&self, kanal: &ChannelId) -> Box<dyn ToneGenerator>;

    fn dtmf_decoder(&self, kanal: &ChannelId) -> Box<dyn DtmfDecoder>;

    fn echo_canceller(
        &self,
        kanal: &ChannelId,
        delay: u32,
        shift: u32,
    ) -> Result<Box<dyn EchoCanceller>, StageError>;

    fn cipher(&self, kanal: &ChannelId, schluessel: &[u8]) -> Result<Box<dyn Cipher>, StageError>;
}

// ---------------------------------------------------------------------------
// Konferenz
// ---------------------------------------------------------------------------

/// Ein Kanal als Kandidat fuer die Hardware-Planung
#[derive(Debug, Clone, Copy)]
pub struct OffloadCandidate<'a> {
    pub channel: &'a ChannelId,
    pub plan: &'a OffloadPlan,
    pub features: &'a FeatureSet,
}

/// Ein Konferenzmitglied waehrend eines Misch-Durchlaufs
pub struct MixMember<'a> {
    pub channel: &'a ChannelId,
    pub buffers: &'a mut ChannelBuffers,
    /// Eigenes Signal zuruecksenden (Echo-Test)
    pub echo_test: bool,
    /// Sendedaten der oberen Schicht mit der Konferenz mischen
    pub tx_mix: bool,
}

/// Konferenz-Mischung und Cross-Connect-Planung
pub trait ConferenceEngine: Send {
    /// Kanal in eine Konferenz aufnehmen; verlaesst implizit die vorherige.
    /// Erneuter Beitritt zur selben Konferenz ist kein Fehler.
    fn join(&mut self, konferenz: ConferenceId, kanal: &ChannelId) -> Result<(), StageError>;

    fn leave(&mut self, kanal: &ChannelId) -> Result<(), StageError>;

    /// Die Konferenz hat kein Mitglied mehr
    fn delete(&mut self, konferenz: ConferenceId);

    /// Plant Hardware-Ressourcen fuer eine Konferenz (oder einen einzelnen
    /// Kanal, wenn `konferenz` None ist). Kanaele, fuer die keine Bindung
    /// geliefert wird, gelten als ungebunden.
    fn recompute_hardware_plan(
        &mut self,
        konferenz: Option<ConferenceId>,
        kandidaten: &[OffloadCandidate<'_>],
    ) -> Vec<(ChannelId, HardwareBinding)>;

    /// Sendedaten eines Mitglieds in dessen Sendepuffer schreiben
    fn transmit(&mut self, kanal: &ChannelId, puffer: &mut ChannelBuffers, daten: &[u8]);

    /// Empfangsdaten eines Mitglieds fuer die Mischung uebernehmen
    fn receive(&mut self, kanal: &ChannelId, puffer: &mut ChannelBuffers, daten: &[u8]);

    /// Ein Zeitscheiben-Durchlauf: liefert die Sendeframes der Mitglieder
    fn mix(
        &mut self,
        konferenz: ConferenceId,
        mitglieder: &mut [MixMember<'_>],
        samples: usize,
    ) -> Vec<(ChannelId, Frame)>;
}
