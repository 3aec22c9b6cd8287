//! Hardware-Faehigkeiten und Zustand der Feature-Aushandlung
//!
//! Pro Kanal wird der Capability-Snapshot einmal abgefragt. Bis die Antwort
//! eintrifft (oder der Guard-Timer ablaeuft) werden Konferenz- und
//! Echo-Cancel-Anforderungen in [`DeferredRequests`] zurueckgestellt.

use bearer_core::ConferenceId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FeatureSet
// ---------------------------------------------------------------------------

/// Unveraenderlicher Snapshot der Hardware-Faehigkeiten eines Geraets
///
/// Der Default ist der leere Snapshot: alles in Software.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// DTMF-Erkennung in Hardware
    pub hardware_dtmf: bool,
    /// Tonerzeugung ueber Hardware-Loops
    pub hardware_tone_loops: bool,
    /// Echo-Unterdrueckung in Hardware
    pub hardware_echo_cancel: bool,
    /// PCM-Bus fuer Cross-Connect (None = kein Bus)
    pub pcm_resource_id: Option<u32>,
    /// Anzahl Zeitschlitze auf dem PCM-Bus
    pub pcm_slot_count: u32,
    /// Anzahl Baenke auf dem PCM-Bus
    pub pcm_bank_count: u32,
}

impl FeatureSet {
    /// Kann das Geraet Kanaele auf dem PCM-Bus verbinden?
    pub fn hat_crossconnect(&self) -> bool {
        self.pcm_resource_id.is_some() && self.pcm_slot_count > 0
    }
}

// ---------------------------------------------------------------------------
// NegotiationState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// Noch keine Abfrage gesendet (oder Senden fehlgeschlagen)
    Uninitialized,
    /// Abfrage gesendet, Guard-Timer laeuft
    AwaitingCapabilities,
    /// Snapshot bekannt (evtl. leer nach Timeout)
    CapabilitiesReceived,
}

impl NegotiationState {
    pub fn abgeschlossen(&self) -> bool {
        matches!(self, Self::CapabilitiesReceived)
    }
}

// ---------------------------------------------------------------------------
// Zurueckgestellte Anforderungen
// ---------------------------------------------------------------------------

/// Konferenz-Anforderung vor Abschluss der Aushandlung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConferenceRequest {
    Join(ConferenceId),
    Leave,
}

/// Echo-Cancel-Anforderung vor Abschluss der Aushandlung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EchoCancelRequest {
    On { delay: u32, shift: u32 },
    Off,
}

/// Hoechstens ein Eintrag pro Feature-Typ; spaetere Anforderungen ersetzen
/// noch nicht ausgelieferte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredRequests {
    pub conference: Option<ConferenceRequest>,
    pub echo_cancel: Option<EchoCancelRequest>,
}

impl DeferredRequests {
    pub fn konferenz_zurueckstellen(&mut self, anforderung: ConferenceRequest) {
        if let Some(alt) = self.conference.replace(anforderung) {
            tracing::debug!(?alt, neu = ?anforderung, "Zurueckgestellte Konferenz ersetzt");
        }
    }

    pub fn echo_zurueckstellen(&mut self, anforderung: EchoCancelRequest) {
        if let Some(alt) = self.echo_cancel.replace(anforderung) {
            tracing::debug!(?alt, neu = ?anforderung, "Zurueckgestelltes Echo-Cancel ersetzt");
        }
    }

    /// Entnimmt alle Eintraege; danach ist die Warteschlange leer
    pub fn entnehmen(&mut self) -> DeferredRequests {
        std::mem::take(self)
    }

    pub fn ist_leer(&self) -> bool {
        self.conference.is_none() && self.echo_cancel.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leerer_snapshot_ist_software() {
        let fs = FeatureSet::default();
        assert!(!fs.hardware_dtmf);
        assert!(!fs.hat_crossconnect());
    }

    #[test]
    fn crossconnect_braucht_zeitschlitze() {
        let fs = FeatureSet {
            pcm_resource_id: Some(0),
            pcm_slot_count: 0,
            ..Default::default()
        };
        assert!(!fs.hat_crossconnect());

        let fs = FeatureSet {
            pcm_slot_count: 32,
            ..fs
        };
        assert!(fs.hat_crossconnect());
    }

    #[test]
    fn spaetere_anforderung_gewinnt() {
        let mut q = DeferredRequests::default();
        q.konferenz_zurueckstellen(ConferenceRequest::Join(ConferenceId::from_raw(3).unwrap()));
        q.konferenz_zurueckstellen(ConferenceRequest::Join(ConferenceId::from_raw(7).unwrap()));
        q.echo_zurueckstellen(EchoCancelRequest::On { delay: 128, shift: 2 });
        q.echo_zurueckstellen(EchoCancelRequest::Off);

        let entnommen = q.entnehmen();
        assert_eq!(
            entnommen.conference,
            Some(ConferenceRequest::Join(ConferenceId::from_raw(7).unwrap()))
        );
        assert_eq!(entnommen.echo_cancel, Some(EchoCancelRequest::Off));
        assert!(q.ist_leer());
    }

    #[test]
    fn split_ersetzt_join() {
        let mut q = DeferredRequests::default();
        q.konferenz_zurueckstellen(ConferenceRequest::Join(ConferenceId::from_raw(7).unwrap()));
        q.konferenz_zurueckstellen(ConferenceRequest::Leave);
        assert_eq!(q.conference, Some(ConferenceRequest::Leave));
    }
}
