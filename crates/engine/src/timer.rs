//! Einmal-Timer pro Kanal (Aushandlungs-Guard, Ton-Muster)
//!
//! Ein abgelaufener Timer ruft keinen Callback auf, sondern legt ein
//! [`TimerEvent`] in eine Queue. Der Besitzer der Engine liest die Queue und
//! ruft `DspEngine::handle_timer`, das unter dem globalen Lock laeuft.
//!
//! Jeder Timer traegt eine Generation. Ereignisse eines inzwischen
//! abgebrochenen oder neu gestellten Timers werden daran erkannt und
//! verworfen.

use bearer_core::ChannelId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Guard-Timer der Feature-Aushandlung
    Negotiation,
    /// Naechster Abschnitt eines Tonmusters
    Tone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    pub channel: ChannelId,
    pub kind: TimerKind,
    pub generation: u64,
}

struct Gestellt {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

pub struct TimerService {
    tx: mpsc::UnboundedSender<TimerEvent>,
    gestellt: HashMap<(ChannelId, TimerKind), Gestellt>,
    generation: u64,
}

impl TimerService {
    pub fn neu() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                gestellt: HashMap::new(),
                generation: 0,
            },
            rx,
        )
    }

    /// Stellt den Timer (neu); ein laufender Timer derselben Art wird ersetzt
    pub fn arm(&mut self, kanal: &ChannelId, art: TimerKind, dauer: Duration) {
        self.cancel(kanal, art);
        self.generation += 1;

        let ereignis = TimerEvent {
            channel: kanal.clone(),
            kind: art,
            generation: self.generation,
        };
        let tx = self.tx.clone();

        let task = match tokio::runtime::Handle::try_current() {
            Ok(laufzeit) => Some(laufzeit.spawn(async move {
                tokio::time::sleep(dauer).await;
                // Empfaenger weg = Engine wird beendet
                let _ = tx.send(ereignis);
            })),
            Err(_) => {
                tracing::warn!(kanal = %kanal, ?art, "Keine Tokio-Laufzeit – Timer laeuft nie ab");
                None
            }
        };

        tracing::trace!(kanal = %kanal, ?art, ?dauer, generation = self.generation, "Timer gestellt");
        self.gestellt.insert(
            (kanal.clone(), art),
            Gestellt {
                generation: self.generation,
                task,
            },
        );
    }

    /// Bricht den Timer ab; true wenn einer gestellt war
    pub fn cancel(&mut self, kanal: &ChannelId, art: TimerKind) -> bool {
        match self.gestellt.remove(&(kanal.clone(), art)) {
            Some(g) => {
                if let Some(task) = g.task {
                    task.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self, kanal: &ChannelId) {
        self.cancel(kanal, TimerKind::Negotiation);
        self.cancel(kanal, TimerKind::Tone);
    }

    pub fn ist_gestellt(&self, kanal: &ChannelId, art: TimerKind) -> bool {
        self.gestellt.contains_key(&(kanal.clone(), art))
    }

    /// Nimmt ein Ereignis an, wenn es zum aktuell gestellten Timer gehoert
    ///
    /// Der Timer gilt danach als abgelaufen.
    pub fn ausloesen(&mut self, ereignis: &TimerEvent) -> bool {
        let schluessel = (ereignis.channel.clone(), ereignis.kind);
        match self.gestellt.get(&schluessel) {
            Some(g) if g.generation == ereignis.generation => {
                self.gestellt.remove(&schluessel);
                true
            }
            _ => {
                tracing::trace!(
                    kanal = %ereignis.channel,
                    art = ?ereignis.kind,
                    "Veraltetes Timer-Ereignis verworfen"
                );
                false
            }
        }
    }

    pub fn anzahl(&self) -> usize {
        self.gestellt.len()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        for (_, g) in self.gestellt.drain() {
            if let Some(task) = g.task {
                task.abort();
            }
        }
    }
}
