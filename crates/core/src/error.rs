//! Fehlertypen fuer die Bearer-DSP
//!
//! Zentraler Fehler-Enum, der die Fehlerklassen des Kerns abbildet.
//! Untermodule (Transport, Stufen) definieren eigene Fehler und werden
//! via `From` in `DspError` ueberfuehrt.

use crate::types::ChannelId;
use thiserror::Error;

/// Globaler Result-Alias fuer die Bearer-DSP
pub type Result<T> = std::result::Result<T, DspError>;

/// Alle Fehler, die an einen Aufrufer des Kerns gemeldet werden
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DspError {
    // --- Validierung ---
    /// Fehlerhafte oder ausserhalb des Wertebereichs liegende Nutzdaten.
    /// Der Kanalzustand bleibt unveraendert.
    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    // --- Registry ---
    /// Der adressierte Kanal ist nicht registriert (Programmierfehler des Aufrufers)
    #[error("Kanal nicht gefunden: {0}")]
    KanalNichtGefunden(ChannelId),

    #[error("Kanal existiert bereits: {0}")]
    KanalExistiert(ChannelId),

    // --- Ressourcen ---
    #[error("Ressourcen erschoepft: {0}")]
    RessourcenErschoepft(String),

    /// Frame konnte nicht weitergereicht werden, die Queue ist voll
    #[error("Rueckstau im Transport: {0}")]
    Rueckstau(String),

    #[error("Registrierung beim Protokoll-Stack fehlgeschlagen: {0}")]
    Registrierung(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl DspError {
    /// Erstellt einen Validierungsfehler aus einer beliebigen Nachricht
    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigesArgument(msg.into())
    }

    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// true fuer Fehler, die aus fehlerhaften Nutzdaten eines Kommandos stammen
    pub fn ist_validierungsfehler(&self) -> bool {
        matches!(self, Self::UngueltigesArgument(_))
    }

    /// true fuer Fehler, die auf einen Programmierfehler des Aufrufers hinweisen
    pub fn ist_aufruferfehler(&self) -> bool {
        matches!(self, Self::KanalNichtGefunden(_) | Self::KanalExistiert(_))
    }
}
