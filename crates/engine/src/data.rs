//! Data-Dispatcher – feste Stufenfolge pro Richtung
//!
//! Senden (obere Schicht -> Hardware):
//! Ton | Verstaerkung -> Echo-Referenz -> Verschluesseln -> Transport,
//! oder bei Konferenz-Mitgliedschaft in den Sendepuffer der Konferenz.
//!
//! Empfangen (Hardware -> obere Schicht):
//! Entschluesseln -> Echo entfernen -> DTMF -> Verstaerkung ->
//! Konferenz -> Empfangs-Gate -> Transport.
//!
//! Die Reihenfolge ist fest und haengt nicht von der Konfiguration ab.

use crate::channel::ChannelContext;
use crate::clock::ClockTick;
use crate::command::VOL_CHANGE_TX;
use crate::message::{Downward, Outbox, Upward};
use crate::stages::MixMember;
use crate::state::{auslagerung_neu_bewerten, kanal_in, Shared, Umgebung};
use crate::stats::Counter;
use bearer_audio::Frame;
use bearer_core::{ChannelId, ControlIndication, DspError, Result};

// ---------------------------------------------------------------------------
// Senden
// ---------------------------------------------------------------------------

pub(crate) fn senden(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    mut frame: Frame,
    outbox: &mut Outbox,
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;

    if c.conference.is_none() {
        sende_ende(c, env, &mut frame);
        outbox.runter(kanal, Downward::Data(frame.freeze()));
        return Ok(());
    }

    if c.hardware.bruecke_aktiv() {
        tracing::trace!(kanal = %kanal, "Hardware-Bruecke aktiv – Sendedaten nicht an Konferenz");
        env.stats.zaehlen(kanal, Counter::DropsBridge);
    } else if c.tone.id.is_none() {
        s.konferenz_engine
            .transmit(kanal, &mut c.buffers, frame.as_slice());
    }
    Ok(())
}

/// Ton bzw. Verstaerkung, Echo-Referenz, Verschluesselung
fn sende_ende(c: &mut ChannelContext, env: &Umgebung<'_>, frame: &mut Frame) {
    let daten = frame.as_mut_slice();

    if c.tone.id.is_some() {
        // Hardware-Loops erzeugen den Ton selbst
        if c.offload.tone.software() {
            c.tone.generator.fill(daten);
        }
    } else if c.tx_gain != 0 {
        env.lautstaerke.apply(daten, c.tx_gain);
    }

    if c.offload.echo_cancel.software() {
        if let Some(canceller) = c.echo.canceller.as_mut() {
            canceller.transmit(daten);
        }
    }

    if let Some(cipher) = c.cipher.cipher.as_mut() {
        cipher.encrypt(daten);
    }
}

// ---------------------------------------------------------------------------
// Empfangen
// ---------------------------------------------------------------------------

pub(crate) fn empfangen(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    mut frame: Frame,
    outbox: &mut Outbox,
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    let daten = frame.as_mut_slice();

    if let Some(cipher) = c.cipher.cipher.as_mut() {
        cipher.decrypt(daten);
    }

    if c.offload.echo_cancel.software() {
        if let Some(canceller) = c.echo.canceller.as_mut() {
            canceller.receive(daten);
        }
    }

    if c.offload.dtmf.software() {
        let ziffern = c.dtmf.decoder.decode(daten, env.optionen.law);
        ziffern_melden(kanal, &ziffern, env, outbox);
    }

    if c.rx_gain != 0 {
        env.lautstaerke.apply(daten, c.rx_gain);
    }

    if c.conference.is_some() {
        if c.hardware.zeitschlitz_belegt() {
            tracing::trace!(kanal = %kanal, "Zeitschlitz belegt – Empfang nicht an Konferenz");
        } else {
            s.konferenz_engine
                .receive(kanal, &mut c.buffers, frame.as_slice());
        }
    }

    if c.rx_disabled {
        env.stats.zaehlen(kanal, Counter::DropsRxGate);
    } else {
        outbox.hoch(kanal, Upward::Data(frame.freeze()));
    }
    Ok(())
}

fn ziffern_melden(kanal: &ChannelId, ziffern: &[char], env: &Umgebung<'_>, outbox: &mut Outbox) {
    for &ziffer in ziffern {
        tracing::debug!(kanal = %kanal, ziffer = %ziffer, "DTMF-Ziffer erkannt");
        outbox.hoch(kanal, Upward::Indication(ControlIndication::DtmfZiffer(ziffer)));
    }
    if !ziffern.is_empty() {
        env.stats
            .zaehlen_n(kanal, Counter::DtmfDigits, ziffern.len() as u64);
    }
}

/// Koeffizienten der Hardware-DTMF-Erkennung
pub(crate) fn koeffizienten(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    daten: &[u8],
    outbox: &mut Outbox,
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    if !c.offload.dtmf.hardware() {
        tracing::debug!(kanal = %kanal, "DTMF-Koeffizienten ignoriert – Hardware-DTMF nicht aktiv");
        env.stats.zaehlen(kanal, Counter::UnexpectedIndications);
        return Ok(());
    }
    let ziffern = c.dtmf.decoder.decode_coefficients(daten);
    ziffern_melden(kanal, &ziffern, env, outbox);
    Ok(())
}

/// Control-Indikation der Hardware-Schicht
pub(crate) fn hardware_indikation(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    code: u32,
    payload: &[u8],
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    match code {
        VOL_CHANGE_TX => {
            let bytes: [u8; 4] = payload.try_into().map_err(|_| {
                DspError::ungueltig(format!(
                    "Lautstaerke-Indikation mit Laenge {}",
                    payload.len()
                ))
            })?;
            c.tx_gain = i32::from_le_bytes(bytes);
            tracing::debug!(kanal = %kanal, stufe = c.tx_gain, "Sendelautstaerke von Hardware geaendert");
            auslagerung_neu_bewerten(s, kanal);
        }
        unbekannt => {
            tracing::debug!(kanal = %kanal, code = unbekannt, "Unbekannte Hardware-Indikation verworfen");
            env.stats.zaehlen(kanal, Counter::UnexpectedIndications);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sample-Clock
// ---------------------------------------------------------------------------

/// Ein Misch-Durchlauf ueber alle Konferenzen
///
/// Die Sendeframes der Konferenz-Engine laufen durch das Sende-Ende des
/// jeweiligen Kanals (Ton, Verstaerkung, Echo, Verschluesselung).
pub(crate) fn takt(s: &mut Shared, env: &Umgebung<'_>, tick: ClockTick, outbox: &mut Outbox) {
    if tick.samples == 0 {
        return;
    }

    for konferenz in s.konferenzen.konferenzen() {
        let ausgabe = {
            let mut mitglieder: Vec<MixMember<'_>> = s
                .kanaele
                .iter_mut()
                .filter(|(_, c)| {
                    c.conference == Some(konferenz) && c.active && !c.hardware.bruecke_aktiv()
                })
                .map(|(id, c)| MixMember {
                    channel: id,
                    echo_test: c.echo_test,
                    tx_mix: c.tx_mix,
                    buffers: &mut c.buffers,
                })
                .collect();
            if mitglieder.is_empty() {
                continue;
            }
            s.konferenz_engine
                .mix(konferenz, &mut mitglieder, tick.samples)
        };

        for (id, mut frame) in ausgabe {
            let Some(c) = s.kanaele.get_mut(&id) else {
                tracing::warn!(kanal = %id, "Mischergebnis fuer unbekannten Kanal");
                continue;
            };
            if c.conference != Some(konferenz) {
                tracing::warn!(kanal = %id, konferenz = %konferenz, "Mischergebnis fuer Nicht-Mitglied");
                continue;
            }
            sende_ende(c, env, &mut frame);
            outbox.runter(&id, Downward::Data(frame.freeze()));
        }
    }
}
