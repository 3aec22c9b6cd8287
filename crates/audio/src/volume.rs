//! Lautstaerke-Stufen fuer Law-Samples
//!
//! Eine Verstaerkungsstufe ist eine ganze Zahl in `-8..=8`. Positive Stufen
//! verstaerken mit den Faktoren 1.10, 1.25, 1.50, 1.75, 2, 3, 4, 5; negative
//! Stufen daempfen mit dem Kehrwert. Stufe 0 laesst die Samples unveraendert.
//!
//! Pro Stufe wird beim Start eine 256-Byte-Tabelle Law -> Law berechnet, so
//! dass der Datenpfad nur einen Tabellenzugriff pro Sample kostet.

use crate::law::{Law, LawTable};

/// Groesste erlaubte Stufe (in beide Richtungen)
pub const MAX_GAIN_STEP: i32 = 8;

/// Verstaerkungsfaktoren in Hundertsteln fuer die Stufen 1..=8
const FAKTOREN_PROZENT: [i32; 8] = [110, 125, 150, 175, 200, 300, 400, 500];

/// Vorberechnete Lautstaerke-Tabellen fuer ein Gesetz
pub struct VolumeTables {
    law: Law,
    verstaerkung: [[u8; 256]; 8],
    daempfung: [[u8; 256]; 8],
}

impl VolumeTables {
    pub fn new(law: Law) -> Self {
        let tabelle = LawTable::new(law);
        let mut verstaerkung = [[0u8; 256]; 8];
        let mut daempfung = [[0u8; 256]; 8];

        for (stufe, &faktor) in FAKTOREN_PROZENT.iter().enumerate() {
            for wert in 0..=255u8 {
                let linear = tabelle.linear(wert) as i32;
                verstaerkung[stufe][wert as usize] = tabelle.law_wert(linear * faktor / 100);
                daempfung[stufe][wert as usize] = tabelle.law_wert(linear * 100 / faktor);
            }
        }

        tracing::debug!(?law, "Lautstaerke-Tabellen berechnet");
        Self {
            law,
            verstaerkung,
            daempfung,
        }
    }

    pub fn law(&self) -> Law {
        self.law
    }

    /// Wendet die Stufe in-place an; Werte ausserhalb von ±8 werden geklemmt
    pub fn apply(&self, daten: &mut [u8], stufe: i32) {
        let stufe = stufe.clamp(-MAX_GAIN_STEP, MAX_GAIN_STEP);
        let tabelle = match stufe {
            0 => return,
            s if s > 0 => &self.verstaerkung[(s - 1) as usize],
            s => &self.daempfung[(-s - 1) as usize],
        };
        for byte in daten.iter_mut() {
            *byte = tabelle[*byte as usize];
        }
    }
}

impl std::fmt::Debug for VolumeTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeTables").field("law", &self.law).finish()
    }
}
