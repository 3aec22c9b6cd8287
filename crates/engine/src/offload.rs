//! Ableitung der Hardware-Auslagerung
//!
//! `derive` ist eine reine Funktion der aktuellen Kanal-Flags und des
//! Capability-Snapshots. Der Kern ruft sie nach jeder Aenderung auf und
//! speichert das Ergebnis im Kanal; ein gespeicherter Plan ist damit immer
//! gleich dem frisch berechneten.

use crate::capability::FeatureSet;
use serde::{Deserialize, Serialize};

/// Wo eine Stufe laeuft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageMode {
    #[default]
    Off,
    Software,
    Hardware,
}

impl StageMode {
    pub fn software(&self) -> bool {
        matches!(self, Self::Software)
    }

    pub fn hardware(&self) -> bool {
        matches!(self, Self::Hardware)
    }

    fn waehlen(aktiv: bool, hardware_faehig: bool) -> Self {
        match (aktiv, hardware_faehig) {
            (false, _) => Self::Off,
            (true, true) => Self::Hardware,
            (true, false) => Self::Software,
        }
    }
}

/// Die Kanal-Flags, von denen die Auslagerung abhaengt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub active: bool,
    pub in_conference: bool,
    pub tone_active: bool,
    pub dtmf_enabled: bool,
    pub echo_cancel_enabled: bool,
    pub cipher_enabled: bool,
    pub echo_test: bool,
    pub tx_mix: bool,
    pub rx_disabled: bool,
    pub tx_gain: i32,
    pub rx_gain: i32,
}

/// Ergebnis der Ableitung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffloadPlan {
    pub tone: StageMode,
    pub dtmf: StageMode,
    pub echo_cancel: StageMode,
    /// Darf der Kanal in der Konferenz per Hardware verbunden werden?
    pub crossconnect_eligible: bool,
}

/// Von der Konferenz-Engine zugeteilte Hardware-Ressourcen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareBinding {
    /// Cross-Connect-Ressource (PCM-Bus)
    pub crossconnect: Option<u32>,
    pub slot_tx: Option<u32>,
    pub slot_rx: Option<u32>,
}

impl HardwareBinding {
    /// Hardware-Bruecke aktiv: Software-Konferenz wird umgangen
    pub fn bruecke_aktiv(&self) -> bool {
        self.crossconnect.is_some()
    }

    /// Mindestens ein Zeitschlitz belegt
    pub fn zeitschlitz_belegt(&self) -> bool {
        self.slot_tx.is_some() || self.slot_rx.is_some()
    }
}

pub fn derive(flags: &ChannelFlags, features: &FeatureSet) -> OffloadPlan {
    let tone = StageMode::waehlen(flags.tone_active, features.hardware_tone_loops);
    let dtmf = StageMode::waehlen(flags.dtmf_enabled, features.hardware_dtmf);
    let echo_cancel = StageMode::waehlen(flags.echo_cancel_enabled, features.hardware_echo_cancel);

    // Jede Bearbeitung der Nutzdaten in Software verhindert die Bruecke
    let crossconnect_eligible = flags.active
        && flags.in_conference
        && features.hat_crossconnect()
        && flags.tx_gain == 0
        && flags.rx_gain == 0
        && !flags.echo_test
        && !flags.tx_mix
        && !flags.cipher_enabled
        && !tone.software()
        && !dtmf.software()
        && !echo_cancel.software();

    OffloadPlan {
        tone,
        dtmf,
        echo_cancel,
        crossconnect_eligible,
    }
}
