//! Audio-Frame – Besitzender Puffer fester Maximalgroesse
//!
//! Ein `Frame` traegt die PCM-Law-Bytes eines Bearer-Kanals durch die
//! Pipeline. Er wird per Move zwischen den Stufen weitergereicht, jede Stufe
//! bearbeitet die Bytes in-place.

use crate::error::FrameError;
use bytes::{Bytes, BytesMut};

/// Maximale Framegroesse in Bytes (= Samples bei 8 Bit pro Sample)
pub const MAX_FRAME_LEN: usize = 2048;

/// Ein nicht-leerer Audio-Frame mit hoechstens [`MAX_FRAME_LEN`] Bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: BytesMut,
}

impl Frame {
    /// Kopiert die Bytes in einen neuen Frame
    pub fn from_slice(daten: &[u8]) -> Result<Self, FrameError> {
        Self::pruefen(daten.len())?;
        Ok(Self {
            data: BytesMut::from(daten),
        })
    }

    /// Uebernimmt einen bestehenden Puffer ohne Kopie
    pub fn from_bytes(daten: BytesMut) -> Result<Self, FrameError> {
        Self::pruefen(daten.len())?;
        Ok(Self { data: daten })
    }

    /// Frame aus `laenge` Stille-Bytes
    pub fn stille(laenge: usize, stille_byte: u8) -> Result<Self, FrameError> {
        Self::pruefen(laenge)?;
        let mut data = BytesMut::with_capacity(laenge);
        data.resize(laenge, stille_byte);
        Ok(Self { data })
    }

    fn pruefen(laenge: usize) -> Result<(), FrameError> {
        if laenge == 0 {
            return Err(FrameError::Leer);
        }
        if laenge > MAX_FRAME_LEN {
            return Err(FrameError::ZuGross {
                laenge,
                maximal: MAX_FRAME_LEN,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Immer false – ein Frame ist per Konstruktion nicht leer
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Friert den Frame fuer die Uebergabe an den Transport ein
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
