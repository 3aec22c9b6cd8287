//! Control-Dispatcher – wendet Kommandos auf einen Kanal an
//!
//! Der Aufrufer haelt die globale kritische Sektion. Jedes Kommando wird
//! vollstaendig validiert, bevor es den Kanal veraendert; danach wird die
//! Hardware-Auslagerung neu abgeleitet.

use crate::capability::{ConferenceRequest, EchoCancelRequest};
use crate::channel::CipherOutcome;
use crate::command::{ControlCommand, CIPHER_KEY_MAX, CIPHER_KEY_MIN};
use crate::config::DTMF_THRESHOLD_RANGE;
use crate::message::{Outbox, Upward};
use crate::state::{auslagerung_neu_bewerten, kanal_in, nach_austritt, Shared, Umgebung};
use crate::timer::TimerKind;
use bearer_core::{ChannelId, ConferenceId, ControlIndication, DspError, Result, ToneId};

pub(crate) fn kommando_anwenden(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    kommando: ControlCommand,
    outbox: &mut Outbox,
) -> Result<()> {
    tracing::debug!(kanal = %kanal, kommando = kommando.name(), "Kommando");
    let konferenz_relevant = matches!(
        kommando,
        ControlCommand::ConferenceJoin(_)
            | ControlCommand::ConferenceSplit
            | ControlCommand::EchoTestOn
            | ControlCommand::EchoTestOff
            | ControlCommand::TxMixOn
            | ControlCommand::TxMixOff
    );

    match kommando {
        ControlCommand::DtmfStart { threshold } => {
            let c = kanal_in(&mut s.kanaele, kanal)?;
            if let Some(schwelle) = threshold {
                if !DTMF_THRESHOLD_RANGE.contains(&schwelle) {
                    return Err(DspError::ungueltig(format!(
                        "DTMF-Schwelle {schwelle} ausserhalb von {DTMF_THRESHOLD_RANGE:?}"
                    )));
                }
                c.dtmf.threshold = schwelle;
            }
            c.dtmf_zuruecksetzen();
            c.dtmf.enabled = true;
        }
        ControlCommand::DtmfStop => {
            kanal_in(&mut s.kanaele, kanal)?.dtmf.enabled = false;
        }
        ControlCommand::ConferenceJoin(ziel) => konferenz_anfordern(s, kanal, ziel)?,
        ControlCommand::ConferenceSplit => konferenz_anfordern(s, kanal, None)?,
        ControlCommand::ReceiveEnable => kanal_in(&mut s.kanaele, kanal)?.rx_disabled = false,
        ControlCommand::ReceiveDisable => kanal_in(&mut s.kanaele, kanal)?.rx_disabled = true,
        ControlCommand::EchoTestOn => kanal_in(&mut s.kanaele, kanal)?.echo_test = true,
        ControlCommand::EchoTestOff => kanal_in(&mut s.kanaele, kanal)?.echo_test = false,
        ControlCommand::TxMixOn => kanal_in(&mut s.kanaele, kanal)?.tx_mix = true,
        ControlCommand::TxMixOff => kanal_in(&mut s.kanaele, kanal)?.tx_mix = false,
        ControlCommand::ToneOn(0) | ControlCommand::ToneOff => ton_stoppen(s, kanal)?,
        ControlCommand::ToneOn(id) => ton_starten(s, kanal, ToneId(id))?,
        ControlCommand::SetTxGain(stufe) => kanal_in(&mut s.kanaele, kanal)?.tx_gain = stufe,
        ControlCommand::SetRxGain(stufe) => kanal_in(&mut s.kanaele, kanal)?.rx_gain = stufe,
        ControlCommand::EchoCancelOn { delay, shift } => {
            echo_anfordern(s, env, kanal, EchoCancelRequest::On { delay, shift })?
        }
        ControlCommand::EchoCancelOff => echo_anfordern(s, env, kanal, EchoCancelRequest::Off)?,
        ControlCommand::CipherEnable(schluessel) => {
            cipher_setzen(s, env, kanal, &schluessel, outbox)?
        }
        ControlCommand::CipherDisable => {
            let c = kanal_in(&mut s.kanaele, kanal)?;
            if c.cipher.cipher.take().is_some() {
                tracing::debug!(kanal = %kanal, "Verschluesselung aus");
            }
        }
    }

    auslagerung_neu_bewerten(s, kanal);
    if konferenz_relevant && env.optionen.conference_dump {
        s.konferenzen.dump();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Konferenz
// ---------------------------------------------------------------------------

fn konferenz_anfordern(s: &mut Shared, kanal: &ChannelId, ziel: Option<ConferenceId>) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    if !c.negotiation.abgeschlossen() {
        let anforderung = match ziel {
            Some(k) => ConferenceRequest::Join(k),
            None => ConferenceRequest::Leave,
        };
        tracing::debug!(kanal = %kanal, ?anforderung, "Aushandlung laeuft – Konferenz zurueckgestellt");
        c.deferred.konferenz_zurueckstellen(anforderung);
        return Ok(());
    }
    konferenz_setzen(s, kanal, ziel)
}

/// Tritt der Konferenz bei (oder verlaesst sie bei `None`)
pub(crate) fn konferenz_setzen(
    s: &mut Shared,
    kanal: &ChannelId,
    ziel: Option<ConferenceId>,
) -> Result<()> {
    let alt = kanal_in(&mut s.kanaele, kanal)?.conference;

    match ziel {
        Some(k) => {
            s.konferenz_engine.join(k, kanal)?;
            if let Some(verlassen) = s.konferenzen.beitreten(k, kanal) {
                nach_austritt(s, kanal, verlassen);
            }
            kanal_in(&mut s.kanaele, kanal)?.conference = Some(k);
            if alt != Some(k) {
                tracing::info!(kanal = %kanal, konferenz = %k, "Kanal in Konferenz");
            }
        }
        None => {
            if alt.is_none() {
                return Ok(());
            }
            if let Err(e) = s.konferenz_engine.leave(kanal) {
                tracing::warn!(kanal = %kanal, fehler = %e, "Konferenz-Engine: Austritt fehlgeschlagen");
            }
            if let Some(verlassen) = s.konferenzen.verlassen(kanal) {
                nach_austritt(s, kanal, verlassen);
            }
            kanal_in(&mut s.kanaele, kanal)?.conference = None;
            tracing::info!(kanal = %kanal, "Kanal hat Konferenz verlassen");
        }
    }

    auslagerung_neu_bewerten(s, kanal);
    Ok(())
}

// ---------------------------------------------------------------------------
// Ton
// ---------------------------------------------------------------------------

fn ton_starten(s: &mut Shared, kanal: &ChannelId, ton: ToneId) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    let dauer = c.tone.generator.start(ton)?;
    c.tone.id = Some(ton);

    match dauer {
        Some(d) => s.timer.arm(kanal, TimerKind::Tone, d),
        None => {
            s.timer.cancel(kanal, TimerKind::Tone);
        }
    }
    tracing::debug!(kanal = %kanal, ton = %ton, "Ton an");
    Ok(())
}

/// Ton aus; gepufferte Sendedaten stammen von vor dem Ton und werden verworfen
pub(crate) fn ton_stoppen(s: &mut Shared, kanal: &ChannelId) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    c.ton_beenden();
    c.buffers.tx_zuruecksetzen();
    s.timer.cancel(kanal, TimerKind::Tone);
    tracing::debug!(kanal = %kanal, "Ton aus");
    Ok(())
}

// ---------------------------------------------------------------------------
// Echo-Unterdrueckung
// ---------------------------------------------------------------------------

fn echo_anfordern(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    anforderung: EchoCancelRequest,
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    if !c.negotiation.abgeschlossen() {
        tracing::debug!(kanal = %kanal, ?anforderung, "Aushandlung laeuft – Echo-Cancel zurueckgestellt");
        c.deferred.echo_zurueckstellen(anforderung);
        return Ok(());
    }
    echo_setzen(s, env, kanal, anforderung)
}

pub(crate) fn echo_setzen(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    anforderung: EchoCancelRequest,
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;
    match anforderung {
        EchoCancelRequest::On { delay, shift } => {
            let canceller = env.fabrik.echo_canceller(kanal, delay, shift)?;
            c.echo.canceller = Some(canceller);
            c.echo.params = Some((delay, shift));
            tracing::debug!(kanal = %kanal, delay, shift, "Echo-Unterdrueckung an");
        }
        EchoCancelRequest::Off => {
            c.echo.canceller = None;
            c.echo.params = None;
            tracing::debug!(kanal = %kanal, "Echo-Unterdrueckung aus");
        }
    }
    auslagerung_neu_bewerten(s, kanal);
    Ok(())
}

// ---------------------------------------------------------------------------
// Verschluesselung
// ---------------------------------------------------------------------------

fn cipher_setzen(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    schluessel: &[u8],
    outbox: &mut Outbox,
) -> Result<()> {
    let c = kanal_in(&mut s.kanaele, kanal)?;

    if !(CIPHER_KEY_MIN..=CIPHER_KEY_MAX).contains(&schluessel.len()) {
        outbox.hoch(kanal, Upward::Indication(ControlIndication::CipherAbgelehnt));
        return Err(DspError::ungueltig(format!(
            "Schluessellaenge {} ausserhalb von {CIPHER_KEY_MIN}..={CIPHER_KEY_MAX}",
            schluessel.len()
        )));
    }

    // Schluessel niemals loggen
    match env.fabrik.cipher(kanal, schluessel) {
        Ok(cipher) => {
            c.cipher.cipher = Some(cipher);
            c.cipher.last_outcome = Some(CipherOutcome::Accepted);
            outbox.hoch(kanal, Upward::Indication(ControlIndication::CipherAkzeptiert));
            tracing::debug!(kanal = %kanal, laenge = schluessel.len(), "Verschluesselung an");
        }
        Err(e) => {
            c.cipher.last_outcome = Some(CipherOutcome::Rejected);
            outbox.hoch(kanal, Upward::Indication(ControlIndication::CipherAbgelehnt));
            tracing::warn!(kanal = %kanal, fehler = %e, "Schluessel abgelehnt");
        }
    }
    Ok(())
}
