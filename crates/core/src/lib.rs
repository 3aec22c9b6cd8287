//! bearer-core – Gemeinsame Typen, Indikationen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von der
//! Audio-Schicht, der Engine und dem Daemon gemeinsam genutzt werden.

pub mod error;
pub mod indication;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{DspError, Result};
pub use indication::ControlIndication;
pub use types::{ChannelId, ConferenceId, ToneId};
