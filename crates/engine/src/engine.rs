//! DspEngine – Kanal-Lebenszyklus und Einstiegspunkte beider Richtungen
//!
//! Die Engine ist der explizit erzeugte Prozess-Kontext: sie besitzt das
//! Kanal-Register, die Konferenz-Tabelle und die Timer hinter einem
//! einzigen `parking_lot::Mutex` (globale kritische Sektion).
//!
//! Ablauf jedes Einstiegspunkts:
//! 1. Lock nehmen, Zustand lesen/aendern, Ausgaben in einer [`Outbox`] sammeln
//! 2. Lock freigeben
//! 3. Outbox an den [`FrameTransport`] uebergeben
//!
//! Der Lock wird also nie gehalten, waehrend in eine Transport-Queue
//! geschrieben wird.

use crate::capability::NegotiationState;
use crate::channel::{ChannelContext, ChannelSnapshot};
use crate::clock::ClockTick;
use crate::command::ControlCommand;
use crate::conference::ConferenceTable;
use crate::config::EngineOptions;
use crate::control::{kommando_anwenden, ton_stoppen};
use crate::data;
use crate::message::{Ausgehend, Downward, LowerMessage, Outbox, UpperMessage, Upward};
use crate::negotiation;
use crate::stages::{ConferenceEngine, StageFactory};
use crate::state::{auslagerung_neu_bewerten, kanal_in, nach_austritt, Shared, Umgebung};
use crate::stats::{Counter, EngineStats};
use crate::timer::{TimerEvent, TimerKind, TimerService};
use crate::transport::{FrameTransport, TransportError};
use bearer_audio::VolumeTables;
use bearer_core::{ChannelId, ConferenceId, DspError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct DspEngine {
    shared: Mutex<Shared>,
    transport: Arc<dyn FrameTransport>,
    fabrik: Arc<dyn StageFactory>,
    optionen: EngineOptions,
    lautstaerke: VolumeTables,
    stats: Arc<EngineStats>,
}

impl DspEngine {
    /// Erstellt die Engine
    ///
    /// Die zurueckgegebene Queue liefert abgelaufene Timer; ihr Besitzer muss
    /// jedes Ereignis an [`DspEngine::handle_timer`] weiterreichen.
    pub fn new(
        optionen: EngineOptions,
        transport: Arc<dyn FrameTransport>,
        fabrik: Arc<dyn StageFactory>,
        konferenz_engine: Box<dyn ConferenceEngine>,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let optionen = optionen.validiert();
        let (timer, timer_rx) = TimerService::neu();

        tracing::info!(
            law = ?optionen.law,
            poll = optionen.poll,
            ohne_hardware = optionen.no_hardware,
            dtmf_schwelle = optionen.dtmf_threshold,
            "DSP-Engine erstellt"
        );

        let engine = Self {
            shared: Mutex::new(Shared {
                kanaele: HashMap::new(),
                konferenzen: ConferenceTable::neu(),
                konferenz_engine,
                timer,
            }),
            lautstaerke: VolumeTables::new(optionen.law),
            transport,
            fabrik,
            optionen,
            stats: Arc::new(EngineStats::neu()),
        };
        (engine, timer_rx)
    }

    fn umgebung(&self) -> Umgebung<'_> {
        Umgebung {
            optionen: &self.optionen,
            fabrik: self.fabrik.as_ref(),
            lautstaerke: &self.lautstaerke,
            stats: &self.stats,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.optionen
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Legt einen Kanal an und startet die Feature-Aushandlung
    ///
    /// Die Stack-Anmeldung erfolgt vor dem Eintrag ins Register; schlaegt sie
    /// fehl, ist der Kanal fuer kein anderes Kommando sichtbar geworden.
    pub fn create_channel(&self, kanal: ChannelId) -> Result<()> {
        {
            let mut guard = self.shared.lock();
            let s = &mut *guard;
            if s.kanaele.contains_key(&kanal) {
                return Err(DspError::KanalExistiert(kanal));
            }
            if s.kanaele.len() >= self.optionen.max_channels {
                tracing::error!(
                    kanal = %kanal,
                    maximal = self.optionen.max_channels,
                    "Kein Platz fuer weiteren Kanal"
                );
                return Err(DspError::RessourcenErschoepft(format!(
                    "maximal {} Kanaele",
                    self.optionen.max_channels
                )));
            }

            // Anmeldung blockiert nicht, sie traegt nur die Queue-Zuordnung ein
            if let Err(e) = self.transport.register(&kanal) {
                tracing::error!(kanal = %kanal, fehler = %e, "Registrierung beim Stack fehlgeschlagen");
                return Err(match e {
                    TransportError::Registrierung(msg) => DspError::Registrierung(msg),
                    andere => DspError::Registrierung(andere.to_string()),
                });
            }

            let mut ctx = ChannelContext::new(kanal.clone(), self.fabrik.as_ref(), &self.optionen);
            ctx.plan_aktualisieren();
            s.kanaele.insert(kanal.clone(), ctx);
            self.stats.anlegen(&kanal);
        }

        if !self.optionen.no_hardware {
            self.aushandlung_starten(&kanal);
        }

        tracing::info!(kanal = %kanal, "Kanal erstellt");
        Ok(())
    }

    /// Legt einen Kanal mit Namen `DSP_S<stack>/C<kanal>` an
    pub fn create_stack_channel(&self, stack: u32, kanal: u32) -> Result<ChannelId> {
        let id = ChannelId::aus_stack(stack, kanal);
        self.create_channel(id.clone())?;
        Ok(id)
    }

    /// Baut einen Kanal ab
    ///
    /// Timer, Konferenz-Mitgliedschaft, Register-Eintrag und Stack-Anmeldung
    /// werden unter dem Lock entfernt; der Kontext wird danach freigegeben.
    pub fn destroy_channel(&self, kanal: &ChannelId) -> Result<()> {
        let ctx = {
            let mut guard = self.shared.lock();
            let s = &mut *guard;
            if !s.kanaele.contains_key(kanal) {
                return Err(DspError::KanalNichtGefunden(kanal.clone()));
            }

            s.timer.cancel_all(kanal);

            tracing::debug!(kanal = %kanal, "Konferenz wird verlassen");
            if let Some(verlassen) = s.konferenzen.verlassen(kanal) {
                if let Err(e) = s.konferenz_engine.leave(kanal) {
                    tracing::warn!(kanal = %kanal, fehler = %e, "Konferenz-Austritt beim Abbau fehlgeschlagen");
                }
                nach_austritt(s, kanal, verlassen);
            }

            let ctx = s.kanaele.remove(kanal);
            self.transport.unregister(kanal);
            ctx
        };

        self.stats.entfernen(kanal);
        drop(ctx);
        tracing::info!(kanal = %kanal, "Kanal freigegeben");
        Ok(())
    }

    /// Sendet die Capability-Abfrage (ausserhalb des Locks)
    fn aushandlung_starten(&self, kanal: &ChannelId) {
        match self.transport.send_down(kanal, Downward::FeatureQuery) {
            Ok(()) => {
                let mut guard = self.shared.lock();
                negotiation::abfrage_gesendet(&mut guard, &self.umgebung(), kanal);
            }
            Err(e) => {
                tracing::warn!(
                    kanal = %kanal,
                    fehler = %e,
                    "Capability-Abfrage nicht gesendet – Kanal bleibt in Software"
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Obere Schicht
    // -----------------------------------------------------------------------

    pub fn from_upper(&self, kanal: &ChannelId, nachricht: UpperMessage) -> Result<()> {
        tracing::trace!(kanal = %kanal, art = nachricht.art(), "Nachricht von oben");
        let mut outbox = Outbox::new();

        let ergebnis = {
            let mut guard = self.shared.lock();
            let s = &mut *guard;
            let env = self.umgebung();

            match nachricht {
                UpperMessage::Data(frame) => data::senden(s, &env, kanal, frame, &mut outbox),
                UpperMessage::DataResponse => kanal_in(&mut s.kanaele, kanal).map(|_| ()),
                UpperMessage::Control { opcode, payload } => {
                    // Unbekannter Kanal ist ein Aufruferfehler, kein Payload-Fehler
                    kanal_in(&mut s.kanaele, kanal)?;
                    let ergebnis = ControlCommand::parse(opcode, &payload).and_then(|kommando| {
                        kommando_anwenden(s, &env, kanal, kommando, &mut outbox)
                    });
                    match &ergebnis {
                        Ok(()) => self.stats.zaehlen(kanal, Counter::CommandsOk),
                        Err(e) if e.ist_validierungsfehler() => {
                            tracing::debug!(kanal = %kanal, opcode, fehler = %e, "Kommando abgelehnt");
                            self.stats.zaehlen(kanal, Counter::CommandsRejected);
                        }
                        Err(_) => {}
                    }
                    ergebnis
                }
                UpperMessage::ActivateRequest => {
                    kanal_in(&mut s.kanaele, kanal).map(|c| {
                        tracing::debug!(kanal = %kanal, "Aktivierung angefordert");
                        if c.dtmf.enabled {
                            c.dtmf_zuruecksetzen();
                        }
                        outbox.runter(kanal, Downward::ActivateRequest);
                    })
                }
                UpperMessage::DeactivateRequest => ton_stoppen(s, kanal).map(|()| {
                    tracing::debug!(kanal = %kanal, "Deaktivierung angefordert");
                    auslagerung_neu_bewerten(s, kanal);
                    outbox.runter(kanal, Downward::DeactivateRequest);
                }),
            }
        };

        self.ausliefern(outbox);
        ergebnis
    }

    // -----------------------------------------------------------------------
    // Hardware-Schicht
    // -----------------------------------------------------------------------

    pub fn from_lower(&self, kanal: &ChannelId, nachricht: LowerMessage) -> Result<()> {
        tracing::trace!(kanal = %kanal, art = nachricht.art(), "Nachricht von unten");
        let mut outbox = Outbox::new();
        let mut abfrage = false;

        let ergebnis = {
            let mut guard = self.shared.lock();
            let s = &mut *guard;
            let env = self.umgebung();

            match nachricht {
                LowerMessage::Data(frame) => data::empfangen(s, &env, kanal, frame, &mut outbox),
                LowerMessage::DataConfirm => kanal_in(&mut s.kanaele, kanal).map(|_| ()),
                LowerMessage::ActivateConfirm => {
                    self.aktiviert(s, kanal, &mut outbox).map(|neu_abfragen| {
                        abfrage = neu_abfragen;
                    })
                }
                LowerMessage::DeactivateConfirm => self.deaktiviert(s, kanal, &mut outbox),
                LowerMessage::Features(features) => {
                    negotiation::antwort_erhalten(s, &env, kanal, features)
                }
                LowerMessage::DtmfCoefficients(daten) => {
                    data::koeffizienten(s, &env, kanal, &daten, &mut outbox)
                }
                LowerMessage::Control { code, payload } => {
                    data::hardware_indikation(s, &env, kanal, code, &payload)
                }
            }
        };

        self.ausliefern(outbox);
        if abfrage {
            self.aushandlung_starten(kanal);
        }
        ergebnis
    }

    /// Aktivierungsbestaetigung; liefert true wenn neu abgefragt werden soll
    fn aktiviert(&self, s: &mut Shared, kanal: &ChannelId, outbox: &mut Outbox) -> Result<bool> {
        let c = kanal_in(&mut s.kanaele, kanal)?;
        c.active = true;
        c.buffers.aktivieren();
        tracing::debug!(kanal = %kanal, "Kanal aktiv");
        auslagerung_neu_bewerten(s, kanal);

        let c = kanal_in(&mut s.kanaele, kanal)?;
        let neu_abfragen = !self.optionen.no_hardware
            && match c.negotiation {
                NegotiationState::Uninitialized => true,
                NegotiationState::AwaitingCapabilities => false,
                NegotiationState::CapabilitiesReceived => c.offload.dtmf.hardware(),
            };

        outbox.hoch(kanal, Upward::Established);
        Ok(neu_abfragen)
    }

    fn deaktiviert(&self, s: &mut Shared, kanal: &ChannelId, outbox: &mut Outbox) -> Result<()> {
        kanal_in(&mut s.kanaele, kanal)?.active = false;
        ton_stoppen(s, kanal)?;
        tracing::debug!(kanal = %kanal, "Kanal inaktiv");
        auslagerung_neu_bewerten(s, kanal);
        outbox.hoch(kanal, Upward::Released);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Timer und Sample-Clock
    // -----------------------------------------------------------------------

    pub fn handle_timer(&self, ereignis: TimerEvent) {
        let mut guard = self.shared.lock();
        let s = &mut *guard;

        if !s.timer.ausloesen(&ereignis) {
            return;
        }
        let kanal = &ereignis.channel;

        match ereignis.kind {
            TimerKind::Negotiation => negotiation::guard_abgelaufen(s, &self.umgebung(), kanal),
            TimerKind::Tone => {
                let Some(c) = s.kanaele.get_mut(kanal) else {
                    return;
                };
                if c.tone.id.is_none() {
                    return;
                }
                if let Some(dauer) = c.tone.generator.advance() {
                    s.timer.arm(kanal, TimerKind::Tone, dauer);
                }
            }
        }
    }

    pub fn clock_tick(&self, tick: ClockTick) {
        let mut outbox = Outbox::new();
        {
            let mut guard = self.shared.lock();
            data::takt(&mut guard, &self.umgebung(), tick, &mut outbox);
        }
        self.ausliefern(outbox);
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn channel_snapshot(&self, kanal: &ChannelId) -> Option<ChannelSnapshot> {
        self.shared.lock().kanaele.get(kanal).map(|c| c.snapshot())
    }

    /// Alle Kanaele, sortiert nach Name
    pub fn channel_snapshots(&self) -> Vec<ChannelSnapshot> {
        let mut alle: Vec<ChannelSnapshot> =
            self.shared.lock().kanaele.values().map(|c| c.snapshot()).collect();
        alle.sort_by(|a, b| a.id.cmp(&b.id));
        alle
    }

    pub fn conference_members(&self, konferenz: ConferenceId) -> Vec<ChannelId> {
        self.shared.lock().konferenzen.mitglieder(konferenz)
    }

    pub fn channel_count(&self) -> usize {
        self.shared.lock().kanaele.len()
    }

    pub fn conference_count(&self) -> usize {
        self.shared.lock().konferenzen.anzahl()
    }

    pub fn timer_count(&self) -> usize {
        self.shared.lock().timer.anzahl()
    }

    // -----------------------------------------------------------------------
    // Herunterfahren
    // -----------------------------------------------------------------------

    /// Baut alle verbliebenen Kanaele ab
    pub fn shutdown(&self) {
        let verbliebene: Vec<ChannelId> = self.shared.lock().kanaele.keys().cloned().collect();
        if !verbliebene.is_empty() {
            tracing::warn!(anzahl = verbliebene.len(), "Beim Beenden noch Kanaele vorhanden");
        }

        for kanal in &verbliebene {
            if let Err(e) = self.destroy_channel(kanal) {
                tracing::warn!(kanal = %kanal, fehler = %e, "Kanal konnte nicht abgebaut werden");
            }
        }

        let konferenzen = self.conference_count();
        if konferenzen > 0 {
            tracing::error!(anzahl = konferenzen, "Nach dem Abbau noch Konferenzen vorhanden");
        }
        tracing::info!("DSP-Engine beendet");
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Uebergibt gesammelte Ausgaben an den Transport (ohne Lock)
    fn ausliefern(&self, outbox: Outbox) {
        for eintrag in outbox.into_eintraege() {
            match eintrag {
                Ausgehend::Hoch(kanal, nachricht) => {
                    let daten = matches!(nachricht, Upward::Data(_));
                    match self.transport.send_up(&kanal, nachricht) {
                        Ok(()) if daten => self.stats.zaehlen(&kanal, Counter::FramesRx),
                        Ok(()) => {}
                        Err(e) => self.transport_fehler(&kanal, "hoch", e),
                    }
                }
                Ausgehend::Runter(kanal, nachricht) => {
                    let daten = matches!(nachricht, Downward::Data(_));
                    match self.transport.send_down(&kanal, nachricht) {
                        Ok(()) if daten => self.stats.zaehlen(&kanal, Counter::FramesTx),
                        Ok(()) => {}
                        Err(e) => self.transport_fehler(&kanal, "runter", e),
                    }
                }
            }
        }
    }

    fn transport_fehler(&self, kanal: &ChannelId, richtung: &'static str, fehler: TransportError) {
        if fehler == TransportError::Rueckstau {
            self.stats.zaehlen(kanal, Counter::DropsBackpressure);
        }
        tracing::warn!(kanal = %kanal, richtung, fehler = %fehler, "Nachricht verworfen");
    }
}

impl Drop for DspEngine {
    fn drop(&mut self) {
        let anzahl = self.shared.get_mut().kanaele.len();
        if anzahl > 0 {
            tracing::debug!(anzahl, "Engine verworfen, Kanaele nicht abgebaut");
        }
    }
}
