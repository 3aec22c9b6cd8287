//! Globaler Zustand – alles, was die kritische Sektion schuetzt
//!
//! `Shared` liegt hinter dem einen `parking_lot::Mutex` der Engine:
//! Kanal-Register, Konferenz-Tabelle, Konferenz-Engine und Timer. Alle
//! Funktionen in diesem Modul erwarten, dass der Aufrufer den Lock haelt.

use crate::capability::FeatureSet;
use crate::channel::ChannelContext;
use crate::conference::{ConferenceTable, Verlassen};
use crate::config::EngineOptions;
use crate::offload::HardwareBinding;
use crate::stages::{ConferenceEngine, OffloadCandidate, StageFactory};
use crate::stats::EngineStats;
use crate::timer::TimerService;
use bearer_audio::VolumeTables;
use bearer_core::{ChannelId, ConferenceId, DspError, Result};
use std::collections::HashMap;

pub(crate) struct Shared {
    pub(crate) kanaele: HashMap<ChannelId, ChannelContext>,
    pub(crate) konferenzen: ConferenceTable,
    pub(crate) konferenz_engine: Box<dyn ConferenceEngine>,
    pub(crate) timer: TimerService,
}

/// Unveraenderliche Umgebung fuer Dispatcher-Funktionen
pub(crate) struct Umgebung<'a> {
    pub(crate) optionen: &'a EngineOptions,
    pub(crate) fabrik: &'a dyn StageFactory,
    pub(crate) lautstaerke: &'a VolumeTables,
    pub(crate) stats: &'a EngineStats,
}

pub(crate) fn kanal_in<'a>(
    kanaele: &'a mut HashMap<ChannelId, ChannelContext>,
    kanal: &ChannelId,
) -> Result<&'a mut ChannelContext> {
    kanaele
        .get_mut(kanal)
        .ok_or_else(|| DspError::KanalNichtGefunden(kanal.clone()))
}

/// Leitet Auslagerungsplan und Hardware-Bindung eines Kanals neu ab
///
/// Liegt der Kanal in einer Konferenz, wird die ganze Konferenz neu
/// geplant, denn ein Mitglied kann die Bruecke fuer alle verhindern.
pub(crate) fn auslagerung_neu_bewerten(s: &mut Shared, kanal: &ChannelId) {
    let konferenz = match s.kanaele.get_mut(kanal) {
        Some(c) => {
            c.plan_aktualisieren();
            c.conference
        }
        None => return,
    };
    hardware_planen(s, konferenz, kanal);
}

/// Fragt die Konferenz-Engine nach Hardware-Bindungen
pub(crate) fn hardware_planen(s: &mut Shared, konferenz: Option<ConferenceId>, kanal: &ChannelId) {
    let ids = match konferenz {
        Some(k) => s.konferenzen.mitglieder(k),
        None => vec![kanal.clone()],
    };
    if ids.is_empty() {
        return;
    }

    for id in &ids {
        if let Some(c) = s.kanaele.get_mut(id) {
            c.plan_aktualisieren();
        }
    }

    let bindungen = {
        let kandidaten: Vec<OffloadCandidate<'_>> = ids
            .iter()
            .filter_map(|id| s.kanaele.get(id))
            .map(|c| OffloadCandidate {
                channel: &c.id,
                plan: &c.offload,
                features: &c.features,
            })
            .collect();
        s.konferenz_engine
            .recompute_hardware_plan(konferenz, &kandidaten)
    };

    for id in &ids {
        let Some(c) = s.kanaele.get_mut(id) else {
            continue;
        };
        let mut bindung = bindungen
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, b)| *b)
            .unwrap_or_default();

        if bindung.bruecke_aktiv() && !c.offload.crossconnect_eligible {
            tracing::warn!(kanal = %id, "Bruecke fuer ungeeigneten Kanal verweigert");
            bindung = HardwareBinding::default();
        }

        if bindung != c.hardware {
            tracing::info!(
                kanal = %id,
                bruecke = ?bindung.crossconnect,
                slot_tx = ?bindung.slot_tx,
                slot_rx = ?bindung.slot_rx,
                "Hardware-Bindung geaendert"
            );
            c.hardware = bindung;
        }
    }
}

/// Nacharbeit nach dem Austritt aus einer Konferenz
pub(crate) fn nach_austritt(s: &mut Shared, kanal: &ChannelId, verlassen: Verlassen) {
    if verlassen.leer {
        tracing::debug!(konferenz = %verlassen.konferenz, "Letztes Mitglied weg – Konferenz geloescht");
        s.konferenz_engine.delete(verlassen.konferenz);
    } else {
        hardware_planen(s, Some(verlassen.konferenz), kanal);
    }
}

/// Setzt einen neuen Capability-Snapshot
pub(crate) fn features_setzen(c: &mut ChannelContext, features: FeatureSet) {
    tracing::debug!(
        kanal = %c.id,
        dtmf = features.hardware_dtmf,
        loops = features.hardware_tone_loops,
        echo = features.hardware_echo_cancel,
        pcm = ?features.pcm_resource_id,
        slots = features.pcm_slot_count,
        baenke = features.pcm_bank_count,
        "Hardware-Faehigkeiten"
    );
    c.features = features;
}
