//! Feature-Aushandlung
//!
//! `uninitialized` -> (Abfrage gesendet) -> `awaiting-capabilities` ->
//! (Antwort oder Guard-Timeout) -> `capabilities-received`.
//!
//! Beim Uebergang nach `capabilities-received` werden zurueckgestellte
//! Konferenz- und Echo-Cancel-Anforderungen genau einmal angewendet. Eine
//! Antwort wird in jedem Zustand angenommen; nach Abschluss aktualisiert sie
//! nur den Snapshot.

use crate::capability::{ConferenceRequest, FeatureSet, NegotiationState};
use crate::control::{echo_setzen, konferenz_setzen};
use crate::state::{auslagerung_neu_bewerten, features_setzen, Shared, Umgebung};
use crate::timer::TimerKind;
use bearer_core::ChannelId;

/// Die Abfrage wurde erfolgreich gesendet
pub(crate) fn abfrage_gesendet(s: &mut Shared, env: &Umgebung<'_>, kanal: &ChannelId) {
    let Some(c) = s.kanaele.get_mut(kanal) else {
        return;
    };
    // Eine schnelle Antwort kann den Kanal bereits abgeschlossen haben
    if c.negotiation == NegotiationState::Uninitialized {
        c.negotiation = NegotiationState::AwaitingCapabilities;
        s.timer
            .arm(kanal, TimerKind::Negotiation, env.optionen.negotiation_guard);
        tracing::debug!(kanal = %kanal, "Hardware-Faehigkeiten abgefragt");
    }
}

/// Antwort der Capability-Registry
pub(crate) fn antwort_erhalten(
    s: &mut Shared,
    env: &Umgebung<'_>,
    kanal: &ChannelId,
    features: FeatureSet,
) -> bearer_core::Result<()> {
    let c = crate::state::kanal_in(&mut s.kanaele, kanal)?;
    features_setzen(c, features);
    let war_offen = !c.negotiation.abgeschlossen();
    c.negotiation = NegotiationState::CapabilitiesReceived;
    s.timer.cancel(kanal, TimerKind::Negotiation);

    if war_offen {
        tracing::debug!(kanal = %kanal, "Aushandlung abgeschlossen");
        zurueckgestellte_anwenden(s, env, kanal);
    } else {
        tracing::debug!(kanal = %kanal, "Capability-Snapshot aktualisiert");
    }
    auslagerung_neu_bewerten(s, kanal);
    Ok(())
}

/// Guard-Timer abgelaufen: keine zusaetzlichen Faehigkeiten
pub(crate) fn guard_abgelaufen(s: &mut Shared, env: &Umgebung<'_>, kanal: &ChannelId) {
    let Some(c) = s.kanaele.get_mut(kanal) else {
        return;
    };
    if c.negotiation != NegotiationState::AwaitingCapabilities {
        return;
    }
    c.negotiation = NegotiationState::CapabilitiesReceived;
    tracing::info!(kanal = %kanal, "Keine Antwort auf Capability-Abfrage – alles in Software");

    zurueckgestellte_anwenden(s, env, kanal);
    auslagerung_neu_bewerten(s, kanal);
}

fn zurueckgestellte_anwenden(s: &mut Shared, env: &Umgebung<'_>, kanal: &ChannelId) {
    let anstehend = match s.kanaele.get_mut(kanal) {
        Some(c) => c.deferred.entnehmen(),
        None => return,
    };

    if let Some(anforderung) = anstehend.conference {
        let ziel = match anforderung {
            ConferenceRequest::Join(k) => Some(k),
            ConferenceRequest::Leave => None,
        };
        tracing::debug!(kanal = %kanal, ?anforderung, "Zurueckgestellte Konferenz wird angewendet");
        if let Err(e) = konferenz_setzen(s, kanal, ziel) {
            tracing::warn!(kanal = %kanal, fehler = %e, "Zurueckgestellte Konferenz fehlgeschlagen");
        }
        if env.optionen.conference_dump {
            s.konferenzen.dump();
        }
    }

    if let Some(anforderung) = anstehend.echo_cancel {
        tracing::debug!(kanal = %kanal, ?anforderung, "Zurueckgestelltes Echo-Cancel wird angewendet");
        if let Err(e) = echo_setzen(s, env, kanal, anforderung) {
            tracing::warn!(kanal = %kanal, fehler = %e, "Zurueckgestelltes Echo-Cancel fehlgeschlagen");
        }
    }
}
