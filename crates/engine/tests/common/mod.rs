//! Gemeinsame Test-Hilfen: aufzeichnender Transport, Stufen und Konferenz

#![allow(dead_code)]

use bearer_audio::{Frame, Law};
use bearer_core::{ChannelId, ConferenceId, ToneId};
use bearer_engine::channel::ChannelBuffers;
use bearer_engine::command::int_parameter;
use bearer_engine::stages::{
    Cipher, DtmfDecoder, EchoCanceller, MixMember, OffloadCandidate, ToneGenerator,
};
use bearer_engine::timer::TimerEvent;
use bearer_engine::{
    ConferenceEngine, Downward, DspEngine, EngineOptions, FeatureSet, FrameTransport,
    HardwareBinding, StageError, StageFactory, TransportError, UpperMessage, Upward,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Byte, mit dem der Test-Tongenerator Frames fuellt
pub const TON_BYTE: u8 = 0x42;
/// Diesen Ton kennt der Test-Tongenerator nicht
pub const UNBEKANNTER_TON: u32 = 0xFF;
/// Dieser Ton wechselt alle 40 ms sein Muster
pub const MUSTER_TON: u32 = 0x10;
pub const MUSTER_DAUER: Duration = Duration::from_millis(40);
/// Schluessel, die mit diesem Byte beginnen, lehnt die Test-Fabrik ab
pub const SCHLECHTER_SCHLUESSEL: u8 = 0xEE;

/// Gemeinsames Aufrufprotokoll aller Test-Stufen
pub type Protokoll = Arc<Mutex<Vec<String>>>;

fn notieren(protokoll: &Protokoll, eintrag: impl Into<String>) {
    protokoll.lock().push(eintrag.into());
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct AufzeichnenderTransport {
    hoch: Mutex<Vec<(ChannelId, Upward)>>,
    runter: Mutex<Vec<(ChannelId, Downward)>>,
    registriert: Mutex<HashSet<ChannelId>>,
    pub registrierung_verweigern: AtomicBool,
    pub rueckstau: AtomicBool,
    pub abfrage_verweigern: AtomicBool,
}

impl AufzeichnenderTransport {
    pub fn hoch(&self, kanal: &ChannelId) -> Vec<Upward> {
        self.hoch
            .lock()
            .iter()
            .filter(|(k, _)| k == kanal)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn runter(&self, kanal: &ChannelId) -> Vec<Downward> {
        self.runter
            .lock()
            .iter()
            .filter(|(k, _)| k == kanal)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn leeren(&self) {
        self.hoch.lock().clear();
        self.runter.lock().clear();
    }

    pub fn ist_registriert(&self, kanal: &ChannelId) -> bool {
        self.registriert.lock().contains(kanal)
    }
}

impl FrameTransport for AufzeichnenderTransport {
    fn send_up(&self, kanal: &ChannelId, nachricht: Upward) -> Result<(), TransportError> {
        if self.rueckstau.load(Ordering::SeqCst) {
            return Err(TransportError::Rueckstau);
        }
        self.hoch.lock().push((kanal.clone(), nachricht));
        Ok(())
    }

    fn send_down(&self, kanal: &ChannelId, nachricht: Downward) -> Result<(), TransportError> {
        if nachricht == Downward::FeatureQuery && self.abfrage_verweigern.load(Ordering::SeqCst) {
            return Err(TransportError::Geschlossen);
        }
        if self.rueckstau.load(Ordering::SeqCst) {
            return Err(TransportError::Rueckstau);
        }
        self.runter.lock().push((kanal.clone(), nachricht));
        Ok(())
    }

    fn register(&self, kanal: &ChannelId) -> Result<(), TransportError> {
        if self.registrierung_verweigern.load(Ordering::SeqCst) {
            return Err(TransportError::Registrierung("Stack lehnt ab".into()));
        }
        self.registriert.lock().insert(kanal.clone());
        Ok(())
    }

    fn unregister(&self, kanal: &ChannelId) {
        self.registriert.lock().remove(kanal);
    }
}

// ---------------------------------------------------------------------------
// Kanaleigene Stufen
// ---------------------------------------------------------------------------

pub struct TestStufen {
    protokoll: Protokoll,
}

struct TestTon {
    protokoll: Protokoll,
    schritt: u32,
}

impl ToneGenerator for TestTon {
    fn start(&mut self, ton: ToneId) -> Result<Option<Duration>, StageError> {
        if ton.0 == UNBEKANNTER_TON {
            return Err(StageError::UnbekannterTon(ton));
        }
        notieren(&self.protokoll, format!("ton_start:{:#x}", ton.0));
        self.schritt = 0;
        Ok((ton.0 == MUSTER_TON).then_some(MUSTER_DAUER))
    }

    fn stop(&mut self) {
        notieren(&self.protokoll, "ton_stop");
    }

    fn fill(&mut self, daten: &mut [u8]) {
        daten.fill(TON_BYTE);
    }

    fn advance(&mut self) -> Option<Duration> {
        self.schritt += 1;
        notieren(&self.protokoll, format!("ton_weiter:{}", self.schritt));
        Some(MUSTER_DAUER)
    }
}

/// Meldet fuer jedes ASCII-Ziffernbyte im Frame eine Ziffer
struct TestDtmf {
    protokoll: Protokoll,
}

impl DtmfDecoder for TestDtmf {
    fn reset(&mut self, energie_schwelle: u32) {
        notieren(&self.protokoll, format!("dtmf_reset:{energie_schwelle}"));
    }

    fn decode(&mut self, daten: &[u8], _law: Law) -> Vec<char> {
        notieren(&self.protokoll, format!("dtmf_decode:{:02x}", daten[0]));
        daten
            .iter()
            .filter(|b| b.is_ascii_digit())
            .map(|&b| b as char)
            .collect()
    }

    fn decode_coefficients(&mut self, koeffizienten: &[u8]) -> Vec<char> {
        koeffizienten
            .iter()
            .filter(|b| b.is_ascii_digit())
            .map(|&b| b as char)
            .collect()
    }
}

struct TestEcho {
    protokoll: Protokoll,
}

impl EchoCanceller for TestEcho {
    fn transmit(&mut self, daten: &mut [u8]) {
        notieren(&self.protokoll, format!("echo_tx:{:02x}", daten[0]));
    }

    fn receive(&mut self, daten: &mut [u8]) {
        notieren(&self.protokoll, format!("echo_rx:{:02x}", daten[0]));
    }
}

/// XOR mit dem ersten Schluesselbyte
struct TestCipher {
    schluessel: u8,
    protokoll: Protokoll,
}

impl Cipher for TestCipher {
    fn encrypt(&mut self, daten: &mut [u8]) {
        notieren(&self.protokoll, format!("encrypt:{:02x}", daten[0]));
        daten.iter_mut().for_each(|b| *b ^= self.schluessel);
    }

    fn decrypt(&mut self, daten: &mut [u8]) {
        daten.iter_mut().for_each(|b| *b ^= self.schluessel);
        notieren(&self.protokoll, format!("decrypt:{:02x}", daten[0]));
    }
}

impl StageFactory for TestStufen {
    fn tone_generator(&self, _kanal: &ChannelId) -> Box<dyn ToneGenerator> {
        Box::new(TestTon {
            protokoll: self.protokoll.clone(),
            schritt: 0,
        })
    }

    fn dtmf_decoder(&self, _kanal: &ChannelId) -> Box<dyn DtmfDecoder> {
        Box::new(TestDtmf {
            protokoll: self.protokoll.clone(),
        })
    }

    fn echo_canceller(
        &self,
        _kanal: &ChannelId,
        delay: u32,
        shift: u32,
    ) -> Result<Box<dyn EchoCanceller>, StageError> {
        if delay == 0 {
            return Err(StageError::UngueltigeParameter("delay 0".into()));
        }
        notieren(&self.protokoll, format!("echo_neu:{delay}/{shift}"));
        Ok(Box::new(TestEcho {
            protokoll: self.protokoll.clone(),
        }))
    }

    fn cipher(&self, _kanal: &ChannelId, schluessel: &[u8]) -> Result<Box<dyn Cipher>, StageError> {
        if schluessel[0] == SCHLECHTER_SCHLUESSEL {
            return Err(StageError::SchluesselAbgelehnt("schwacher Schluessel".into()));
        }
        Ok(Box::new(TestCipher {
            schluessel: schluessel[0],
            protokoll: self.protokoll.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Konferenz
// ---------------------------------------------------------------------------

/// Steuerung der Test-Konferenz-Engine aus dem Test heraus
#[derive(Default)]
pub struct KonferenzSteuerung {
    /// Bindungen, die `recompute_hardware_plan` fuer Kandidaten liefert
    pub bindungen: Vec<(ChannelId, HardwareBinding)>,
    /// Beitritt zu dieser Konferenz schlaegt fehl
    pub beitritt_verweigern: Option<ConferenceId>,
    /// Kandidaten der letzten Planung
    pub letzte_kandidaten: Vec<ChannelId>,
    /// Mischergebnis fuer jedes Mitglied
    pub misch_byte: u8,
}

pub struct TestKonferenz {
    steuerung: Arc<Mutex<KonferenzSteuerung>>,
    protokoll: Protokoll,
}

impl ConferenceEngine for TestKonferenz {
    fn join(&mut self, konferenz: ConferenceId, kanal: &ChannelId) -> Result<(), StageError> {
        if self.steuerung.lock().beitritt_verweigern == Some(konferenz) {
            return Err(StageError::NichtVerfuegbar("Konferenz"));
        }
        notieren(&self.protokoll, format!("join:{kanal}:{}", konferenz.get()));
        Ok(())
    }

    fn leave(&mut self, kanal: &ChannelId) -> Result<(), StageError> {
        notieren(&self.protokoll, format!("leave:{kanal}"));
        Ok(())
    }

    fn delete(&mut self, konferenz: ConferenceId) {
        notieren(&self.protokoll, format!("delete:{}", konferenz.get()));
    }

    fn recompute_hardware_plan(
        &mut self,
        _konferenz: Option<ConferenceId>,
        kandidaten: &[OffloadCandidate<'_>],
    ) -> Vec<(ChannelId, HardwareBinding)> {
        let mut steuerung = self.steuerung.lock();
        steuerung.letzte_kandidaten = kandidaten.iter().map(|k| k.channel.clone()).collect();
        steuerung
            .bindungen
            .iter()
            .filter(|(id, _)| kandidaten.iter().any(|k| k.channel == id))
            .cloned()
            .collect()
    }

    fn transmit(&mut self, kanal: &ChannelId, puffer: &mut ChannelBuffers, daten: &[u8]) {
        notieren(&self.protokoll, format!("conf_tx:{kanal}"));
        puffer.tx_schreiben(daten);
    }

    fn receive(&mut self, kanal: &ChannelId, puffer: &mut ChannelBuffers, daten: &[u8]) {
        notieren(&self.protokoll, format!("conf_rx:{kanal}"));
        puffer.rx_schreiben(daten);
    }

    fn mix(
        &mut self,
        konferenz: ConferenceId,
        mitglieder: &mut [MixMember<'_>],
        samples: usize,
    ) -> Vec<(ChannelId, Frame)> {
        let byte = self.steuerung.lock().misch_byte;
        notieren(
            &self.protokoll,
            format!("mix:{}:{}:{samples}", konferenz.get(), mitglieder.len()),
        );
        mitglieder
            .iter()
            .filter_map(|m| Frame::stille(samples, byte).ok().map(|f| (m.channel.clone(), f)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pruefstand
// ---------------------------------------------------------------------------

pub struct Pruefstand {
    pub engine: DspEngine,
    pub transport: Arc<AufzeichnenderTransport>,
    pub protokoll: Protokoll,
    pub konferenz: Arc<Mutex<KonferenzSteuerung>>,
    pub timer: mpsc::UnboundedReceiver<TimerEvent>,
}

pub fn pruefstand(optionen: EngineOptions) -> Pruefstand {
    let protokoll: Protokoll = Arc::new(Mutex::new(Vec::new()));
    let transport = Arc::new(AufzeichnenderTransport::default());
    let konferenz = Arc::new(Mutex::new(KonferenzSteuerung {
        misch_byte: 0x11,
        ..Default::default()
    }));

    let (engine, timer) = DspEngine::new(
        optionen,
        transport.clone(),
        Arc::new(TestStufen {
            protokoll: protokoll.clone(),
        }),
        Box::new(TestKonferenz {
            steuerung: konferenz.clone(),
            protokoll: protokoll.clone(),
        }),
    );

    Pruefstand {
        engine,
        transport,
        protokoll,
        konferenz,
        timer,
    }
}

/// Engine ohne Hardware-Aushandlung
pub fn software_pruefstand() -> Pruefstand {
    pruefstand(EngineOptions {
        no_hardware: true,
        ..Default::default()
    })
}

impl Pruefstand {
    pub fn kanal(&self, name: &str) -> ChannelId {
        let id = ChannelId::new(name);
        self.engine
            .create_channel(id.clone())
            .expect("Kanal anlegen");
        id
    }

    /// Kanal anlegen und aktivieren
    pub fn aktiver_kanal(&self, name: &str) -> ChannelId {
        let id = self.kanal(name);
        self.engine
            .from_lower(&id, bearer_engine::LowerMessage::ActivateConfirm)
            .expect("Aktivierung");
        id
    }

    pub fn kommando(&self, kanal: &ChannelId, opcode: u32, payload: &[u8]) -> bearer_core::Result<()> {
        self.engine.from_upper(
            kanal,
            UpperMessage::Control {
                opcode,
                payload: Bytes::copy_from_slice(payload),
            },
        )
    }

    pub fn kommando_int(&self, kanal: &ChannelId, opcode: u32, wert: i32) -> bearer_core::Result<()> {
        self.kommando(kanal, opcode, &int_parameter(wert))
    }

    pub fn protokoll(&self) -> Vec<String> {
        self.protokoll.lock().clone()
    }

    pub fn protokoll_leeren(&self) {
        self.protokoll.lock().clear();
    }

    pub fn snapshot(&self, kanal: &ChannelId) -> bearer_engine::ChannelSnapshot {
        self.engine.channel_snapshot(kanal).expect("Snapshot")
    }
}

pub fn frame(daten: &[u8]) -> Frame {
    Frame::from_slice(daten).expect("Frame")
}

pub fn pcm_geraet() -> FeatureSet {
    FeatureSet {
        pcm_resource_id: Some(1),
        pcm_slot_count: 32,
        pcm_bank_count: 2,
        ..Default::default()
    }
}
