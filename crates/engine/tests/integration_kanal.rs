//! Integration-Tests: Kanal-Lebenszyklus, Datenpfad, Verschluesselung, Ton

mod common;

use bearer_core::{ChannelId, ControlIndication, DspError, ToneId};
use bearer_engine::command::*;
use bearer_engine::{
    CipherOutcome, Downward, EngineOptions, LowerMessage, StageMode, UpperMessage, Upward,
};
use bytes::Bytes;
use common::*;
use std::sync::atomic::Ordering;

// ---------------------------------------------------------------------------
// Lebenszyklus
// ---------------------------------------------------------------------------

#[test]
fn test_kanal_anlegen_und_abbauen() {
    let p = software_pruefstand();
    let a = p.kanal("a");

    assert_eq!(p.engine.channel_count(), 1);
    assert!(p.transport.ist_registriert(&a));

    p.engine.destroy_channel(&a).expect("Abbau");
    assert_eq!(p.engine.channel_count(), 0);
    assert!(!p.transport.ist_registriert(&a));
    assert!(p.engine.channel_snapshot(&a).is_none());
}

#[test]
fn test_doppelter_kanal_wird_abgelehnt() {
    let p = software_pruefstand();
    let a = p.kanal("a");

    let ergebnis = p.engine.create_channel(a.clone());
    assert_eq!(ergebnis, Err(DspError::KanalExistiert(a)));
    assert_eq!(p.engine.channel_count(), 1);
}

#[test]
fn test_unbekannter_kanal() {
    let p = software_pruefstand();
    let x = ChannelId::new("x");

    assert_eq!(
        p.engine.destroy_channel(&x),
        Err(DspError::KanalNichtGefunden(x.clone()))
    );
    assert_eq!(
        p.engine.from_upper(&x, UpperMessage::DataResponse),
        Err(DspError::KanalNichtGefunden(x.clone()))
    );
    assert_eq!(
        p.engine.from_lower(&x, LowerMessage::Data(frame(&[1]))),
        Err(DspError::KanalNichtGefunden(x))
    );
}

#[test]
fn test_kommando_fuer_unbekannten_kanal() {
    let p = software_pruefstand();
    let x = ChannelId::new("nie_angelegt");

    // Falsche Payload-Laenge und unbekannter Opcode: der Kanal wird zuerst geprueft
    assert_eq!(
        p.kommando(&x, CMX_CONF_JOIN, &[1, 2]),
        Err(DspError::KanalNichtGefunden(x.clone()))
    );
    assert_eq!(
        p.kommando(&x, 0x7f00, &[]),
        Err(DspError::KanalNichtGefunden(x.clone()))
    );
    assert_eq!(
        p.kommando(&x, CMX_RECEIVE_OFF, &[]),
        Err(DspError::KanalNichtGefunden(x.clone()))
    );
    assert!(p.engine.stats().kanal(&x).is_none());

    // Viele erfundene Namen hinterlassen keine Zaehler
    for i in 0..1000 {
        let _ = p.kommando(&ChannelId::new(format!("erfunden{i}")), 0x7f00, &[]);
    }
    assert_eq!(p.engine.stats().anzahl(), 0);
    assert_eq!(p.engine.stats().gesamt().commands_rejected, 0);
}

#[test]
fn test_abgelehntes_kommando_zaehlt_beim_kanal() {
    let p = software_pruefstand();
    let a = p.kanal("a");

    assert!(matches!(
        p.kommando(&a, CMX_CONF_JOIN, &[1, 2]),
        Err(DspError::UngueltigesArgument(_))
    ));
    p.kommando(&a, CMX_RECEIVE_OFF, &[]).expect("Empfang aus");

    let zaehler = p.engine.stats().kanal(&a).expect("Zaehler");
    assert_eq!(zaehler.commands_rejected, 1);
    assert_eq!(zaehler.commands_ok, 1);
}

#[test]
fn test_registrierung_fehlgeschlagen() {
    let p = software_pruefstand();
    p.transport
        .registrierung_verweigern
        .store(true, Ordering::SeqCst);

    let a = ChannelId::new("a");
    let ergebnis = p.engine.create_channel(a.clone());
    assert!(matches!(ergebnis, Err(DspError::Registrierung(_))));
    assert_eq!(p.engine.channel_count(), 0);
    assert!(p.engine.stats().kanal(&a).is_none());

    // Der abgelehnte Kanal nimmt keine Kommandos an und hinterlaesst keine Konferenz
    assert_eq!(
        p.kommando_int(&a, CMX_CONF_JOIN, 3),
        Err(DspError::KanalNichtGefunden(a.clone()))
    );
    assert_eq!(p.engine.conference_count(), 0);
    assert!(!p.protokoll().iter().any(|e| e.starts_with("join")));

    // Nach Freigabe durch den Stack klappt das Anlegen
    p.transport
        .registrierung_verweigern
        .store(false, Ordering::SeqCst);
    p.engine.create_channel(a.clone()).expect("zweiter Versuch");
    assert!(p.transport.ist_registriert(&a));
    assert!(p.engine.stats().kanal(&a).is_some());
}

#[test]
fn test_kanal_obergrenze() {
    let p = pruefstand(EngineOptions {
        no_hardware: true,
        max_channels: 2,
        ..Default::default()
    });
    p.kanal("a");
    p.kanal("b");

    let ergebnis = p.engine.create_channel(ChannelId::new("c"));
    assert!(matches!(ergebnis, Err(DspError::RessourcenErschoepft(_))));
    assert_eq!(p.engine.channel_count(), 2);
}

#[test]
fn test_stack_kanalname() {
    let p = software_pruefstand();
    let id = p.engine.create_stack_channel(1, 0x1f).expect("Kanal");
    assert_eq!(id.as_str(), "DSP_S1/C1f");
    assert!(p.engine.channel_snapshot(&id).is_some());
}

#[test]
fn test_shutdown_baut_alles_ab() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    let b = p.aktiver_kanal("b");
    p.kommando_int(&a, CMX_CONF_JOIN, 3).unwrap();
    p.kommando_int(&b, CMX_CONF_JOIN, 3).unwrap();

    p.engine.shutdown();
    assert_eq!(p.engine.channel_count(), 0);
    assert_eq!(p.engine.conference_count(), 0);
    assert!(p.protokoll().contains(&"delete:3".to_string()));
}

// ---------------------------------------------------------------------------
// Aktivierung
// ---------------------------------------------------------------------------

#[test]
fn test_aktivierung_meldet_established() {
    let p = software_pruefstand();
    let a = p.kanal("a");
    assert!(!p.snapshot(&a).active);

    p.engine
        .from_lower(&a, LowerMessage::ActivateConfirm)
        .unwrap();

    let snap = p.snapshot(&a);
    assert!(snap.active);
    assert_eq!(snap.tx_cursors, (0, 0));
    assert_eq!(snap.rx_cursors, (None, None));
    assert_eq!(p.transport.hoch(&a), vec![Upward::Established]);
}

#[test]
fn test_aktivierungsanforderung_setzt_dtmf_zurueck() {
    let p = software_pruefstand();
    let a = p.kanal("a");
    p.kommando(&a, DTMF_TONE_START, &[]).unwrap();
    p.protokoll_leeren();

    p.engine
        .from_upper(&a, UpperMessage::ActivateRequest)
        .unwrap();

    assert_eq!(p.protokoll(), vec!["dtmf_reset:1000000".to_string()]);
    assert_eq!(p.transport.runter(&a), vec![Downward::ActivateRequest]);
}

#[test]
fn test_deaktivierung_stoppt_ton() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando_int(&a, TONE_PATT_ON, 0x20).unwrap();

    p.engine
        .from_upper(&a, UpperMessage::DeactivateRequest)
        .unwrap();
    assert_eq!(p.snapshot(&a).tone, None);
    assert!(p.transport.runter(&a).contains(&Downward::DeactivateRequest));

    p.engine
        .from_lower(&a, LowerMessage::DeactivateConfirm)
        .unwrap();
    assert!(!p.snapshot(&a).active);
    assert_eq!(p.transport.hoch(&a).last(), Some(&Upward::Released));
}

// ---------------------------------------------------------------------------
// Datenpfad
// ---------------------------------------------------------------------------

#[test]
fn test_sendedaten_ohne_stufen_unveraendert() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");

    p.engine
        .from_upper(&a, UpperMessage::Data(frame(&[1, 2, 3])))
        .unwrap();

    assert_eq!(
        p.transport.runter(&a),
        vec![Downward::Data(Bytes::from_static(&[1, 2, 3]))]
    );
    assert_eq!(p.engine.stats().kanal(&a).unwrap().frames_tx, 1);
}

#[test]
fn test_empfangsstufen_in_fester_reihenfolge() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando(&a, BF_ENABLE_KEY, &[0x10, 1, 2, 3]).unwrap();
    p.kommando(&a, DTMF_TONE_START, &[]).unwrap();
    let mut echo = 4u32.to_le_bytes().to_vec();
    echo.extend_from_slice(&2u32.to_le_bytes());
    p.kommando(&a, ECHOCAN_ON, &echo).unwrap();
    p.transport.leeren();
    p.protokoll_leeren();

    // "50" verschluesselt
    p.engine
        .from_lower(&a, LowerMessage::Data(frame(&[0x25, 0x20])))
        .unwrap();

    assert_eq!(
        p.protokoll(),
        vec![
            "decrypt:35".to_string(),
            "echo_rx:35".to_string(),
            "dtmf_decode:35".to_string(),
        ]
    );
    assert_eq!(
        p.transport.hoch(&a),
        vec![
            Upward::Indication(ControlIndication::DtmfZiffer('5')),
            Upward::Indication(ControlIndication::DtmfZiffer('0')),
            Upward::Data(Bytes::from_static(&[0x35, 0x30])),
        ]
    );
    let zaehler = p.engine.stats().kanal(&a).unwrap();
    assert_eq!(zaehler.dtmf_digits, 2);
    assert_eq!(zaehler.frames_rx, 1);
}

#[test]
fn test_sendestufen_in_fester_reihenfolge() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando(&a, BF_ENABLE_KEY, &[0x01, 1, 2, 3]).unwrap();
    let mut echo = 8u32.to_le_bytes().to_vec();
    echo.extend_from_slice(&0u32.to_le_bytes());
    p.kommando(&a, ECHOCAN_ON, &echo).unwrap();
    p.kommando_int(&a, TONE_PATT_ON, 0x20).unwrap();
    p.transport.leeren();
    p.protokoll_leeren();

    p.engine
        .from_upper(&a, UpperMessage::Data(frame(&[0; 2])))
        .unwrap();

    // Ton ueberschreibt, Echo sieht den Ton, danach Verschluesselung
    assert_eq!(
        p.protokoll(),
        vec!["echo_tx:42".to_string(), "encrypt:42".to_string()]
    );
    assert_eq!(
        p.transport.runter(&a),
        vec![Downward::Data(Bytes::from_static(&[0x43, 0x43]))]
    );
}

#[test]
fn test_empfangs_gate() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando(&a, CMX_RECEIVE_OFF, &[]).unwrap();
    p.kommando(&a, DTMF_TONE_START, &[]).unwrap();
    p.transport.leeren();

    p.engine
        .from_lower(&a, LowerMessage::Data(frame(b"7")))
        .unwrap();

    // Ziffern werden trotzdem gemeldet, die Daten nicht
    assert_eq!(
        p.transport.hoch(&a),
        vec![Upward::Indication(ControlIndication::DtmfZiffer('7'))]
    );
    assert_eq!(p.engine.stats().kanal(&a).unwrap().drops_rx_gate, 1);

    p.kommando(&a, CMX_RECEIVE_ON, &[]).unwrap();
    p.engine
        .from_lower(&a, LowerMessage::Data(frame(&[0xAA])))
        .unwrap();
    assert_eq!(
        p.transport.hoch(&a).last(),
        Some(&Upward::Data(Bytes::from_static(&[0xAA])))
    );
}

#[test]
fn test_verstaerkung_veraendert_daten() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    let law = p.engine.options().law;
    let sample = law.komprimieren(1000);
    p.kommando_int(&a, VOL_CHANGE_TX, 4).unwrap();
    p.transport.leeren();

    p.engine
        .from_upper(&a, UpperMessage::Data(frame(&[sample])))
        .unwrap();

    let Some(Downward::Data(daten)) = p.transport.runter(&a).pop() else {
        panic!("keine Sendedaten");
    };
    assert!(law.expandieren(daten[0]) > 1000);
}

#[test]
fn test_rueckstau_wird_gezaehlt() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.transport.rueckstau.store(true, Ordering::SeqCst);

    let ergebnis = p
        .engine
        .from_upper(&a, UpperMessage::Data(frame(&[1, 2])));

    assert!(ergebnis.is_ok());
    let zaehler = p.engine.stats().kanal(&a).unwrap();
    assert_eq!(zaehler.drops_backpressure, 1);
    assert_eq!(zaehler.frames_tx, 0);
}

// ---------------------------------------------------------------------------
// Kommandos
// ---------------------------------------------------------------------------

#[test]
fn test_unbekanntes_kommando_aendert_nichts() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    let vorher = p.snapshot(&a);

    let ergebnis = p.kommando(&a, 0x7777, &[]);
    assert!(matches!(ergebnis, Err(DspError::UngueltigesArgument(_))));
    assert_eq!(p.snapshot(&a), vorher);
    assert_eq!(p.engine.stats().kanal(&a).unwrap().commands_rejected, 1);
}

#[test]
fn test_kurze_payload_wird_abgelehnt() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    let vorher = p.snapshot(&a);

    assert!(p.kommando(&a, VOL_CHANGE_RX, &[1, 0]).is_err());
    assert!(p.kommando(&a, ECHOCAN_ON, &[1, 0, 0, 0]).is_err());
    assert!(p.kommando(&a, CMX_CONF_JOIN, &[]).is_err());
    assert_eq!(p.snapshot(&a), vorher);
}

#[test]
fn test_dtmf_schwelle_ausserhalb_des_bereichs() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");

    let ergebnis = p.kommando(&a, DTMF_TONE_START, &10u32.to_le_bytes());
    assert!(ergebnis.is_err());
    assert!(!p.snapshot(&a).flags.dtmf_enabled);

    p.kommando(&a, DTMF_TONE_START, &300u32.to_le_bytes())
        .unwrap();
    let snap = p.snapshot(&a);
    assert!(snap.flags.dtmf_enabled);
    assert_eq!(snap.dtmf_threshold, 300);
    assert_eq!(snap.offload.dtmf, StageMode::Software);
}

// ---------------------------------------------------------------------------
// Verschluesselung
// ---------------------------------------------------------------------------

#[test]
fn test_schluessel_wird_akzeptiert() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.transport.leeren();

    p.kommando(&a, BF_ENABLE_KEY, &[0x10, 2, 3, 4, 5]).unwrap();

    let snap = p.snapshot(&a);
    assert_eq!(snap.cipher_outcome, Some(CipherOutcome::Accepted));
    assert!(snap.flags.cipher_enabled);
    assert_eq!(
        p.transport.hoch(&a),
        vec![Upward::Indication(ControlIndication::CipherAkzeptiert)]
    );

    p.engine
        .from_upper(&a, UpperMessage::Data(frame(&[0x30, 0x31])))
        .unwrap();
    assert_eq!(
        p.transport.runter(&a),
        vec![Downward::Data(Bytes::from_static(&[0x20, 0x21]))]
    );

    p.kommando(&a, BF_DISABLE, &[]).unwrap();
    assert!(!p.snapshot(&a).flags.cipher_enabled);
}

#[test]
fn test_schluessellaenge_ausserhalb_des_bereichs() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.transport.leeren();

    for laenge in [3usize, 57] {
        let ergebnis = p.kommando(&a, BF_ENABLE_KEY, &vec![1u8; laenge]);
        assert!(matches!(ergebnis, Err(DspError::UngueltigesArgument(_))));
    }

    let snap = p.snapshot(&a);
    assert_eq!(snap.cipher_outcome, None);
    assert!(!snap.flags.cipher_enabled);
    assert_eq!(
        p.transport.hoch(&a),
        vec![
            Upward::Indication(ControlIndication::CipherAbgelehnt),
            Upward::Indication(ControlIndication::CipherAbgelehnt),
        ]
    );
}

#[test]
fn test_schluessel_von_stufe_abgelehnt() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.transport.leeren();

    let ergebnis = p.kommando(&a, BF_ENABLE_KEY, &[SCHLECHTER_SCHLUESSEL, 1, 2, 3]);

    assert!(ergebnis.is_ok());
    let snap = p.snapshot(&a);
    assert_eq!(snap.cipher_outcome, Some(CipherOutcome::Rejected));
    assert!(!snap.flags.cipher_enabled);
    assert_eq!(
        p.transport.hoch(&a),
        vec![Upward::Indication(ControlIndication::CipherAbgelehnt)]
    );
}

// ---------------------------------------------------------------------------
// Ton
// ---------------------------------------------------------------------------

#[test]
fn test_ton_ueberschreibt_sendedaten() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando_int(&a, TONE_PATT_ON, 0x20).unwrap();
    p.transport.leeren();

    let snap = p.snapshot(&a);
    assert_eq!(snap.tone, Some(ToneId(0x20)));
    assert_eq!(snap.offload.tone, StageMode::Software);

    p.engine
        .from_upper(&a, UpperMessage::Data(frame(&[1, 2, 3])))
        .unwrap();
    assert_eq!(
        p.transport.runter(&a),
        vec![Downward::Data(Bytes::from_static(&[TON_BYTE; 3]))]
    );
}

#[test]
fn test_unbekannter_ton_behaelt_alten_ton() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando_int(&a, TONE_PATT_ON, 0x20).unwrap();

    let ergebnis = p.kommando_int(&a, TONE_PATT_ON, UNBEKANNTER_TON as i32);
    assert!(matches!(ergebnis, Err(DspError::UngueltigesArgument(_))));
    assert_eq!(p.snapshot(&a).tone, Some(ToneId(0x20)));
}

#[test]
fn test_ton_null_schaltet_ab() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.kommando_int(&a, TONE_PATT_ON, 0x20).unwrap();

    p.kommando_int(&a, TONE_PATT_ON, 0).unwrap();

    let snap = p.snapshot(&a);
    assert_eq!(snap.tone, None);
    assert_eq!(snap.offload.tone, StageMode::Off);
    assert!(p.protokoll().contains(&"ton_stop".to_string()));
}

#[test]
fn test_hardware_ton_laesst_daten_durch() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.engine
        .from_lower(
            &a,
            LowerMessage::Features(bearer_engine::FeatureSet {
                hardware_tone_loops: true,
                ..Default::default()
            }),
        )
        .unwrap();
    p.kommando_int(&a, TONE_PATT_ON, 0x20).unwrap();
    assert_eq!(p.snapshot(&a).offload.tone, StageMode::Hardware);
    p.transport.leeren();

    p.engine
        .from_upper(&a, UpperMessage::Data(frame(&[1, 2])))
        .unwrap();
    assert_eq!(
        p.transport.runter(&a),
        vec![Downward::Data(Bytes::from_static(&[1, 2]))]
    );
}

// ---------------------------------------------------------------------------
// Hardware-Indikationen
// ---------------------------------------------------------------------------

#[test]
fn test_hardware_lautstaerke_indikation() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");

    p.engine
        .from_lower(
            &a,
            LowerMessage::Control {
                code: VOL_CHANGE_TX,
                payload: Bytes::copy_from_slice(&int_parameter(3)),
            },
        )
        .unwrap();
    assert_eq!(p.snapshot(&a).flags.tx_gain, 3);

    let kurz = p.engine.from_lower(
        &a,
        LowerMessage::Control {
            code: VOL_CHANGE_TX,
            payload: Bytes::from_static(&[1, 2]),
        },
    );
    assert!(kurz.is_err());
    assert_eq!(p.snapshot(&a).flags.tx_gain, 3);
}

#[test]
fn test_unerwartete_indikation_wird_gezaehlt() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");

    p.engine
        .from_lower(
            &a,
            LowerMessage::Control {
                code: 0x9999,
                payload: Bytes::new(),
            },
        )
        .unwrap();
    // Koeffizienten ohne Hardware-DTMF
    p.engine
        .from_lower(&a, LowerMessage::DtmfCoefficients(Bytes::from_static(b"1")))
        .unwrap();

    assert_eq!(p.engine.stats().kanal(&a).unwrap().unexpected_indications, 2);
    assert!(p
        .transport
        .hoch(&a)
        .iter()
        .all(|n| !matches!(n, Upward::Indication(_))));
}

#[test]
fn test_hardware_dtmf_koeffizienten() {
    let p = software_pruefstand();
    let a = p.aktiver_kanal("a");
    p.engine
        .from_lower(
            &a,
            LowerMessage::Features(bearer_engine::FeatureSet {
                hardware_dtmf: true,
                ..Default::default()
            }),
        )
        .unwrap();
    p.kommando(&a, DTMF_TONE_START, &[]).unwrap();
    assert_eq!(p.snapshot(&a).offload.dtmf, StageMode::Hardware);
    p.transport.leeren();
    p.protokoll_leeren();

    p.engine
        .from_lower(&a, LowerMessage::DtmfCoefficients(Bytes::from_static(b"#9")))
        .unwrap();
    // Im Datenpfad dekodiert die Software dann nicht
    p.engine
        .from_lower(&a, LowerMessage::Data(frame(b"4")))
        .unwrap();

    assert_eq!(
        p.transport.hoch(&a),
        vec![
            Upward::Indication(ControlIndication::DtmfZiffer('9')),
            Upward::Data(Bytes::from_static(b"4")),
        ]
    );
    assert!(p.protokoll().iter().all(|e| !e.starts_with("dtmf_decode")));
}
