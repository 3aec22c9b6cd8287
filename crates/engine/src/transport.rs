//! Frame-Transport – Grenze zur oberen Schicht und zur Hardware-Schicht
//!
//! Senden blockiert nie: eine volle Queue wird sofort als `Rueckstau`
//! gemeldet. Innerhalb einer Richtung bleibt die Reihenfolge erhalten.

use crate::message::{Downward, Upward};
use bearer_core::{ChannelId, DspError};
use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::mpsc;

/// Standard-Tiefe der Queues pro Richtung
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Queue voll")]
    Rueckstau,

    #[error("Queue geschlossen")]
    Geschlossen,

    #[error("Kanal nicht beim Stack registriert: {0}")]
    NichtRegistriert(ChannelId),

    #[error("Registrierung fehlgeschlagen: {0}")]
    Registrierung(String),
}

impl From<TransportError> for DspError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Rueckstau => DspError::Rueckstau(e.to_string()),
            TransportError::Registrierung(msg) => DspError::Registrierung(msg),
            andere => DspError::intern(andere.to_string()),
        }
    }
}

/// Transport in beide Richtungen plus Registrierung beim Protokoll-Stack
pub trait FrameTransport: Send + Sync {
    fn send_up(&self, kanal: &ChannelId, nachricht: Upward) -> Result<(), TransportError>;

    fn send_down(&self, kanal: &ChannelId, nachricht: Downward) -> Result<(), TransportError>;

    /// Meldet den Kanal beim Protokoll-Stack an
    fn register(&self, kanal: &ChannelId) -> Result<(), TransportError>;

    /// Meldet den Kanal ab; Fehler werden nur geloggt
    fn unregister(&self, kanal: &ChannelId);
}

// ---------------------------------------------------------------------------
// QueueTransport
// ---------------------------------------------------------------------------

/// Empfangsseiten der beiden Queues
pub struct TransportReceivers {
    pub hoch: mpsc::Receiver<(ChannelId, Upward)>,
    pub runter: mpsc::Receiver<(ChannelId, Downward)>,
}

/// Transport ueber zwei begrenzte tokio-Queues
pub struct QueueTransport {
    hoch: mpsc::Sender<(ChannelId, Upward)>,
    runter: mpsc::Sender<(ChannelId, Downward)>,
    registriert: Mutex<HashSet<ChannelId>>,
}

impl QueueTransport {
    pub fn neu(tiefe: usize) -> (Self, TransportReceivers) {
        let tiefe = tiefe.max(1);
        let (hoch_tx, hoch_rx) = mpsc::channel(tiefe);
        let (runter_tx, runter_rx) = mpsc::channel(tiefe);
        (
            Self {
                hoch: hoch_tx,
                runter: runter_tx,
                registriert: Mutex::new(HashSet::new()),
            },
            TransportReceivers {
                hoch: hoch_rx,
                runter: runter_rx,
            },
        )
    }

    pub fn registrierte_kanaele(&self) -> usize {
        self.registriert.lock().len()
    }

    fn pruefen(&self, kanal: &ChannelId) -> Result<(), TransportError> {
        if self.registriert.lock().contains(kanal) {
            Ok(())
        } else {
            Err(TransportError::NichtRegistriert(kanal.clone()))
        }
    }
}

fn senden<T>(queue: &mpsc::Sender<T>, wert: T) -> Result<(), TransportError> {
    queue.try_send(wert).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => TransportError::Rueckstau,
        mpsc::error::TrySendError::Closed(_) => TransportError::Geschlossen,
    })
}

impl FrameTransport for QueueTransport {
    fn send_up(&self, kanal: &ChannelId, nachricht: Upward) -> Result<(), TransportError> {
        self.pruefen(kanal)?;
        senden(&self.hoch, (kanal.clone(), nachricht))
    }

    fn send_down(&self, kanal: &ChannelId, nachricht: Downward) -> Result<(), TransportError> {
        self.pruefen(kanal)?;
        senden(&self.runter, (kanal.clone(), nachricht))
    }

    fn register(&self, kanal: &ChannelId) -> Result<(), TransportError> {
        if !self.registriert.lock().insert(kanal.clone()) {
            return Err(TransportError::Registrierung(format!(
                "{kanal} ist bereits registriert"
            )));
        }
        tracing::debug!(kanal = %kanal, "Kanal beim Stack registriert");
        Ok(())
    }

    fn unregister(&self, kanal: &ChannelId) {
        if !self.registriert.lock().remove(kanal) {
            tracing::warn!(kanal = %kanal, "Abmeldung fuer unbekannten Kanal");
        }
    }
}
