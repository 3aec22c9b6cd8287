//! Asynchrone Control-Indikationen an die obere Schicht
//!
//! Indikationen werden nicht als Antwort auf einen Aufruf zurueckgegeben,
//! sondern ueber den Frame-Transport nach oben geschickt (DTMF-Ziffern,
//! Ergebnis eines Schluessel-Setzens).

use serde::{Deserialize, Serialize};

/// Kennung fuer DTMF-Ziffern im Zahlencode (`DTMF_TONE_VAL | ziffer`)
pub const DTMF_TONE_VAL: u32 = 0x2000;
/// Maske fuer die Ziffer innerhalb des Zahlencodes
pub const DTMF_TONE_MASK: u32 = 0x007F;
/// Cipher-Schluessel akzeptiert
pub const CIPHER_ACCEPT: u32 = 0x2e01;
/// Cipher-Schluessel abgelehnt
pub const CIPHER_REJECT: u32 = 0x2e02;

/// Alle Indikationen, die der Kern von sich aus nach oben meldet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlIndication {
    /// Eine dekodierte DTMF-Ziffer (`0-9`, `A-D`, `*`, `#`)
    DtmfZiffer(char),
    /// Der Schluessel wurde installiert, Verschluesselung aktiv
    CipherAkzeptiert,
    /// Der Schluessel wurde abgelehnt, vorheriger Zustand bleibt
    CipherAbgelehnt,
}

impl ControlIndication {
    /// Zahlencode der Indikation fuer Transporte mit Integer-Envelope
    pub fn code(&self) -> u32 {
        match self {
            Self::DtmfZiffer(z) => DTMF_TONE_VAL | (*z as u32 & DTMF_TONE_MASK),
            Self::CipherAkzeptiert => CIPHER_ACCEPT,
            Self::CipherAbgelehnt => CIPHER_REJECT,
        }
    }

    /// Dekodiert einen Zahlencode zurueck in eine Indikation
    pub fn aus_code(code: u32) -> Option<Self> {
        match code {
            CIPHER_ACCEPT => Some(Self::CipherAkzeptiert),
            CIPHER_REJECT => Some(Self::CipherAbgelehnt),
            c if c & !DTMF_TONE_MASK == DTMF_TONE_VAL => {
                char::from_u32(c & DTMF_TONE_MASK).map(Self::DtmfZiffer)
            }
            _ => None,
        }
    }
}
