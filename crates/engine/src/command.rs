//! Control-Kommandos der oberen Schicht
//!
//! Ein Kommando kommt als Opcode plus Payload an. `ControlCommand::parse`
//! prueft die Payload-Laenge und liefert eine getaggte Variante, die nur die
//! fuer sie relevanten Felder traegt. Integer-Parameter sind 32 Bit
//! little-endian.

use bearer_core::{ConferenceId, DspError};
use bytes::Bytes;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const DTMF_TONE_START: u32 = 0x2100;
pub const DTMF_TONE_STOP: u32 = 0x2200;
pub const CMX_CONF_JOIN: u32 = 0x2300;
pub const CMX_CONF_SPLIT: u32 = 0x2400;
pub const CMX_RECEIVE_OFF: u32 = 0x2500;
pub const CMX_RECEIVE_ON: u32 = 0x2600;
pub const CMX_ECHO_ON: u32 = 0x2700;
pub const CMX_ECHO_OFF: u32 = 0x2800;
pub const TONE_PATT_ON: u32 = 0x2900;
pub const TONE_PATT_OFF: u32 = 0x2a00;
pub const VOL_CHANGE_TX: u32 = 0x2b00;
pub const VOL_CHANGE_RX: u32 = 0x2c00;
pub const BF_ENABLE_KEY: u32 = 0x2d00;
pub const BF_DISABLE: u32 = 0x2e00;
pub const ECHOCAN_ON: u32 = 0x2f00;
pub const ECHOCAN_OFF: u32 = 0x2f01;
pub const CMX_MIX_ON: u32 = 0x3100;
pub const CMX_MIX_OFF: u32 = 0x3200;

/// Kleinste erlaubte Schluessellaenge in Bytes
pub const CIPHER_KEY_MIN: usize = 4;
/// Groesste erlaubte Schluessellaenge in Bytes
pub const CIPHER_KEY_MAX: usize = 56;

// ---------------------------------------------------------------------------
// ControlCommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// DTMF-Erkennung starten, optional mit eigener Schwelle
    DtmfStart { threshold: Option<u32> },
    DtmfStop,
    /// Konferenz beitreten; `None` (Nummer 0) bedeutet verlassen
    ConferenceJoin(Option<ConferenceId>),
    ConferenceSplit,
    ReceiveEnable,
    ReceiveDisable,
    EchoTestOn,
    EchoTestOff,
    /// Ton abspielen; Ton-ID 0 bedeutet Ton aus
    ToneOn(u32),
    ToneOff,
    SetTxGain(i32),
    SetRxGain(i32),
    /// Schluessellaenge wird erst beim Anwenden geprueft
    CipherEnable(Bytes),
    CipherDisable,
    EchoCancelOn { delay: u32, shift: u32 },
    EchoCancelOff,
    TxMixOn,
    TxMixOff,
}

impl ControlCommand {
    /// Dekodiert Opcode und Payload
    ///
    /// Unbekannte Opcodes und falsche Payload-Laengen ergeben
    /// `UngueltigesArgument`.
    pub fn parse(opcode: u32, payload: &[u8]) -> Result<Self, DspError> {
        let cmd = match opcode {
            DTMF_TONE_START => match payload.len() {
                0 => Self::DtmfStart { threshold: None },
                4 => Self::DtmfStart {
                    threshold: Some(wert_u32(payload)),
                },
                n => return Err(laenge_falsch(opcode, n)),
            },
            DTMF_TONE_STOP => Self::DtmfStop,
            CMX_CONF_JOIN => {
                let nummer = int_payload(opcode, payload)? as u32;
                Self::ConferenceJoin(ConferenceId::from_raw(nummer))
            }
            CMX_CONF_SPLIT => Self::ConferenceSplit,
            CMX_RECEIVE_OFF => Self::ReceiveDisable,
            CMX_RECEIVE_ON => Self::ReceiveEnable,
            CMX_ECHO_ON => Self::EchoTestOn,
            CMX_ECHO_OFF => Self::EchoTestOff,
            TONE_PATT_ON => Self::ToneOn(int_payload(opcode, payload)? as u32),
            TONE_PATT_OFF => Self::ToneOff,
            VOL_CHANGE_TX => Self::SetTxGain(int_payload(opcode, payload)?),
            VOL_CHANGE_RX => Self::SetRxGain(int_payload(opcode, payload)?),
            BF_ENABLE_KEY => Self::CipherEnable(Bytes::copy_from_slice(payload)),
            BF_DISABLE => Self::CipherDisable,
            ECHOCAN_ON => {
                if payload.len() != 8 {
                    return Err(laenge_falsch(opcode, payload.len()));
                }
                Self::EchoCancelOn {
                    delay: wert_u32(&payload[..4]),
                    shift: wert_u32(&payload[4..]),
                }
            }
            ECHOCAN_OFF => Self::EchoCancelOff,
            CMX_MIX_ON => Self::TxMixOn,
            CMX_MIX_OFF => Self::TxMixOff,
            unbekannt => {
                return Err(DspError::ungueltig(format!(
                    "Unbekanntes Kommando {unbekannt:#06x}"
                )))
            }
        };
        Ok(cmd)
    }

    /// Kurzname fuer Logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::DtmfStart { .. } => "dtmf_start",
            Self::DtmfStop => "dtmf_stop",
            Self::ConferenceJoin(_) => "conf_join",
            Self::ConferenceSplit => "conf_split",
            Self::ReceiveEnable => "receive_on",
            Self::ReceiveDisable => "receive_off",
            Self::EchoTestOn => "echo_test_on",
            Self::EchoTestOff => "echo_test_off",
            Self::ToneOn(_) => "tone_on",
            Self::ToneOff => "tone_off",
            Self::SetTxGain(_) => "tx_gain",
            Self::SetRxGain(_) => "rx_gain",
            Self::CipherEnable(_) => "cipher_enable",
            Self::CipherDisable => "cipher_disable",
            Self::EchoCancelOn { .. } => "echo_cancel_on",
            Self::EchoCancelOff => "echo_cancel_off",
            Self::TxMixOn => "tx_mix_on",
            Self::TxMixOff => "tx_mix_off",
        }
    }
}

/// Kodiert einen 32-Bit-Parameter fuer die Payload
pub fn int_parameter(wert: i32) -> [u8; 4] {
    wert.to_le_bytes()
}

fn int_payload(opcode: u32, payload: &[u8]) -> Result<i32, DspError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| laenge_falsch(opcode, payload.len()))?;
    Ok(i32::from_le_bytes(bytes))
}

fn wert_u32(payload: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&payload[..4]);
    u32::from_le_bytes(bytes)
}

fn laenge_falsch(opcode: u32, laenge: usize) -> DspError {
    DspError::ungueltig(format!(
        "Kommando {opcode:#06x}: unerwartete Payload-Laenge {laenge}"
    ))
}
