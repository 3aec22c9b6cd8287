//! Eingebaute Stufen fuer den Betrieb ohne externe DSP-Bibliotheken
//!
//! - [`PassiveStages`]: Tongenerator liefert Stille, kein DTMF, kein Echo,
//!   Verschluesselung wird abgelehnt
//! - [`SoftwareConference`]: einfacher Summen-Mischer ohne Hardware-Planung

use crate::channel::ChannelBuffers;
use crate::offload::HardwareBinding;
use crate::stages::{
    Cipher, ConferenceEngine, DtmfDecoder, EchoCanceller, MixMember, OffloadCandidate,
    StageError, StageFactory, ToneGenerator,
};
use bearer_audio::{Frame, Law, LawTable};
use bearer_core::{ChannelId, ConferenceId, ToneId};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Kanaleigene Stufen
// ---------------------------------------------------------------------------

/// Fabrik fuer wirkungslose Stufen
#[derive(Debug, Clone, Copy)]
pub struct PassiveStages {
    law: Law,
}

impl PassiveStages {
    pub fn new(law: Law) -> Self {
        Self { law }
    }
}

struct StilleTon {
    stille: u8,
}

impl ToneGenerator for StilleTon {
    fn start(&mut self, _ton: ToneId) -> Result<Option<Duration>, StageError> {
        Ok(None)
    }

    fn stop(&mut self) {}

    fn fill(&mut self, daten: &mut [u8]) {
        daten.fill(self.stille);
    }

    fn advance(&mut self) -> Option<Duration> {
        None
    }
}

struct KeinDtmf;

impl DtmfDecoder for KeinDtmf {
    fn reset(&mut self, _energie_schwelle: u32) {}

    fn decode(&mut self, _daten: &[u8], _law: Law) -> Vec<char> {
        Vec::new()
    }

    fn decode_coefficients(&mut self, _koeffizienten: &[u8]) -> Vec<char> {
        Vec::new()
    }
}

struct KeinEcho;

impl EchoCanceller for KeinEcho {
    fn transmit(&mut self, _daten: &mut [u8]) {}
    fn receive(&mut self, _daten: &mut [u8]) {}
}

impl StageFactory for PassiveStages {
    fn tone_generator(&self, _kanal: &ChannelId) -> Box<dyn ToneGenerator> {
        Box::new(StilleTon {
            stille: self.law.stille(),
        })
    }

    fn dtmf_decoder(&self, _kanal: &ChannelId) -> Box<dyn DtmfDecoder> {
        Box::new(KeinDtmf)
    }

    fn echo_canceller(
        &self,
        _kanal: &ChannelId,
        _delay: u32,
        _shift: u32,
    ) -> Result<Box<dyn EchoCanceller>, StageError> {
        Ok(Box::new(KeinEcho))
    }

    fn cipher(&self, _kanal: &ChannelId, _schluessel: &[u8]) -> Result<Box<dyn Cipher>, StageError> {
        Err(StageError::NichtVerfuegbar("Verschluesselung"))
    }
}

// ---------------------------------------------------------------------------
// Software-Konferenz
// ---------------------------------------------------------------------------

/// Summen-Mischer
///
/// Jedes Mitglied hoert die Summe der Empfangsdaten aller anderen Mitglieder
/// plus die eigenen gepufferten Sendedaten. Mit Echo-Test hoert es sich
/// selbst; mit TX-Mix gehen seine Sendedaten zusaetzlich an die anderen.
pub struct SoftwareConference {
    tabelle: LawTable,
}

impl SoftwareConference {
    pub fn new(law: Law) -> Self {
        Self {
            tabelle: LawTable::new(law),
        }
    }

    fn linear_lesen(&self, puffer: &[u8], ziel: &mut [i32]) {
        for (z, &b) in ziel.iter_mut().zip(puffer) {
            *z = self.tabelle.linear(b) as i32;
        }
    }
}

impl ConferenceEngine for SoftwareConference {
    fn join(&mut self, konferenz: ConferenceId, kanal: &ChannelId) -> Result<(), StageError> {
        tracing::trace!(kanal = %kanal, konferenz = %konferenz, "Software-Konferenz: Beitritt");
        Ok(())
    }

    fn leave(&mut self, kanal: &ChannelId) -> Result<(), StageError> {
        tracing::trace!(kanal = %kanal, "Software-Konferenz: Austritt");
        Ok(())
    }

    fn delete(&mut self, konferenz: ConferenceId) {
        tracing::trace!(konferenz = %konferenz, "Software-Konferenz geloescht");
    }

    fn recompute_hardware_plan(
        &mut self,
        _konferenz: Option<ConferenceId>,
        _kandidaten: &[OffloadCandidate<'_>],
    ) -> Vec<(ChannelId, HardwareBinding)> {
        Vec::new()
    }

    fn transmit(&mut self, _kanal: &ChannelId, puffer: &mut ChannelBuffers, daten: &[u8]) {
        puffer.tx_schreiben(daten);
    }

    fn receive(&mut self, _kanal: &ChannelId, puffer: &mut ChannelBuffers, daten: &[u8]) {
        puffer.rx_schreiben(daten);
    }

    fn mix(
        &mut self,
        _konferenz: ConferenceId,
        mitglieder: &mut [MixMember<'_>],
        samples: usize,
    ) -> Vec<(ChannelId, Frame)> {
        let stille = self.tabelle.law().stille();
        let mut roh = vec![0u8; samples];

        let mut empfang = vec![vec![0i32; samples]; mitglieder.len()];
        let mut senden = vec![vec![0i32; samples]; mitglieder.len()];
        let mut summe = vec![0i32; samples];

        for (i, m) in mitglieder.iter_mut().enumerate() {
            m.buffers.rx_lesen(&mut roh, stille);
            self.linear_lesen(&roh, &mut empfang[i]);
            m.buffers.tx_lesen(&mut roh, stille);
            self.linear_lesen(&roh, &mut senden[i]);

            for (s, (e, t)) in summe.iter_mut().zip(empfang[i].iter().zip(&senden[i])) {
                *s += *e;
                if m.tx_mix {
                    *s += *t;
                }
            }
        }

        let mut ausgabe = Vec::with_capacity(mitglieder.len());
        for (i, m) in mitglieder.iter().enumerate() {
            let mut frame = match Frame::stille(samples, stille) {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(kanal = %m.channel, fehler = %e, "Mischframe nicht erzeugt");
                    continue;
                }
            };
            for (n, ziel) in frame.as_mut_slice().iter_mut().enumerate() {
                let mut wert = summe[n];
                if !m.echo_test {
                    wert -= empfang[i][n];
                    if m.tx_mix {
                        wert -= senden[i][n];
                    }
                }
                if !m.tx_mix || !m.echo_test {
                    wert += senden[i][n];
                }
                *ziel = self.tabelle.law_wert(wert);
            }
            ausgabe.push((m.channel.clone(), frame));
        }
        ausgabe
    }
}
