//! Nachrichten zwischen Kern, oberer Schicht und Hardware-Schicht
//!
//! Pro Richtung ein eigener Enum. Jede Variante traegt nur die Felder, die
//! sie braucht.

use crate::capability::FeatureSet;
use bearer_audio::Frame;
use bearer_core::ControlIndication;
use bytes::Bytes;

// ---------------------------------------------------------------------------
// Eingehend
// ---------------------------------------------------------------------------

/// Nachrichten der oberen Schicht (Protokoll/Anwendung) an den Kern
#[derive(Debug)]
pub enum UpperMessage {
    /// Sendedaten fuer die Leitung
    Data(Frame),
    /// Quittung der oberen Schicht fuer zugestellte Daten
    DataResponse,
    /// Konfigurationskommando
    Control { opcode: u32, payload: Bytes },
    ActivateRequest,
    DeactivateRequest,
}

/// Nachrichten der Hardware-Schicht an den Kern
#[derive(Debug)]
pub enum LowerMessage {
    /// Empfangsdaten von der Leitung
    Data(Frame),
    /// Sendebestaetigung der Hardware
    DataConfirm,
    ActivateConfirm,
    DeactivateConfirm,
    /// Antwort auf eine Capability-Abfrage
    Features(FeatureSet),
    /// Koeffizienten der Hardware-DTMF-Erkennung
    DtmfCoefficients(Bytes),
    /// Sonstige Control-Indikation der Hardware
    Control { code: u32, payload: Bytes },
}

impl UpperMessage {
    pub fn art(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::DataResponse => "data_response",
            Self::Control { .. } => "control",
            Self::ActivateRequest => "activate_request",
            Self::DeactivateRequest => "deactivate_request",
        }
    }
}

impl LowerMessage {
    pub fn art(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::DataConfirm => "data_confirm",
            Self::ActivateConfirm => "activate_confirm",
            Self::DeactivateConfirm => "deactivate_confirm",
            Self::Features(_) => "features",
            Self::DtmfCoefficients(_) => "dtmf_coefficients",
            Self::Control { .. } => "control",
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgehend
// ---------------------------------------------------------------------------

/// Nachrichten vom Kern an die obere Schicht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upward {
    Data(Bytes),
    Indication(ControlIndication),
    /// Kanal ist aktiv (nach Aktivierungsbestaetigung)
    Established,
    /// Kanal ist inaktiv (nach Deaktivierungsbestaetigung)
    Released,
}

/// Nachrichten vom Kern an die Hardware-Schicht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downward {
    Data(Bytes),
    ActivateRequest,
    DeactivateRequest,
    /// Capability-Abfrage; die Antwort kommt als [`LowerMessage::Features`]
    FeatureQuery,
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Sammelt ausgehende Nachrichten waehrend der kritischen Sektion
///
/// Wird erst nach Freigabe des globalen Locks an den Transport uebergeben.
/// Die Reihenfolge der Eintraege ist die Reihenfolge der Zustellung.
#[derive(Debug, Default)]
pub struct Outbox {
    eintraege: Vec<Ausgehend>,
}

#[derive(Debug)]
pub(crate) enum Ausgehend {
    Hoch(bearer_core::ChannelId, Upward),
    Runter(bearer_core::ChannelId, Downward),
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hoch(&mut self, kanal: &bearer_core::ChannelId, nachricht: Upward) {
        self.eintraege.push(Ausgehend::Hoch(kanal.clone(), nachricht));
    }

    pub fn runter(&mut self, kanal: &bearer_core::ChannelId, nachricht: Downward) {
        self.eintraege.push(Ausgehend::Runter(kanal.clone(), nachricht));
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    pub(crate) fn into_eintraege(self) -> Vec<Ausgehend> {
        self.eintraege
    }
}
