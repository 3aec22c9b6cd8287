//! Fehlertypen fuer die Audio-Bausteine

use thiserror::Error;

/// Fehler beim Erzeugen eines Frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Leerer Frame")]
    Leer,

    #[error("Frame zu gross: {laenge} Bytes (maximal {maximal})")]
    ZuGross { laenge: usize, maximal: usize },
}

impl From<FrameError> for bearer_core::DspError {
    fn from(e: FrameError) -> Self {
        bearer_core::DspError::UngueltigesArgument(e.to_string())
    }
}
