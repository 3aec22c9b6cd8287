//! G.711 Kompandierung (A-law / µ-law)
//!
//! Ein Bearer-Kanal traegt 8-Bit-Law-Samples. Fuer Stufen, die linear
//! rechnen muessen (Lautstaerke), werden die Samples ueber eine
//! 256-Eintraege-Tabelle expandiert und per Kompressionsfunktion
//! zurueckgewandelt.

use serde::{Deserialize, Serialize};

/// Kompandierungsgesetz eines Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Law {
    /// A-law (Europa, Standard fuer ISDN)
    #[default]
    Alaw,
    /// µ-law (Nordamerika, Japan)
    Ulaw,
}

impl Law {
    /// Law-Byte fuer digitale Stille
    pub fn stille(&self) -> u8 {
        match self {
            Law::Alaw => 0xD5,
            Law::Ulaw => 0xFF,
        }
    }

    /// Expandiert ein Law-Sample zu 16 Bit linear
    pub fn expandieren(&self, wert: u8) -> i16 {
        match self {
            Law::Alaw => alaw_expand(wert),
            Law::Ulaw => ulaw_expand(wert),
        }
    }

    /// Komprimiert ein lineares Sample zu einem Law-Byte
    pub fn komprimieren(&self, sample: i16) -> u8 {
        match self {
            Law::Alaw => alaw_compress(sample),
            Law::Ulaw => ulaw_compress(sample),
        }
    }
}

/// Vorberechnete Expansionstabelle fuer ein Gesetz
#[derive(Clone)]
pub struct LawTable {
    law: Law,
    linear: [i16; 256],
}

impl LawTable {
    pub fn new(law: Law) -> Self {
        let mut linear = [0i16; 256];
        for (i, eintrag) in linear.iter_mut().enumerate() {
            *eintrag = law.expandieren(i as u8);
        }
        Self { law, linear }
    }

    pub fn law(&self) -> Law {
        self.law
    }

    #[inline]
    pub fn linear(&self, wert: u8) -> i16 {
        self.linear[wert as usize]
    }

    #[inline]
    pub fn law_wert(&self, sample: i32) -> u8 {
        let geklemmt = sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        self.law.komprimieren(geklemmt)
    }
}

impl std::fmt::Debug for LawTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LawTable").field("law", &self.law).finish()
    }
}

// ---------------------------------------------------------------------------
// ITU-T G.711 Referenz-Algorithmen
// ---------------------------------------------------------------------------

fn alaw_compress(sample: i16) -> u8 {
    // 13 MSBs, Einerkomplement fuer negative Werte
    let mut ix: i16 = if sample < 0 {
        ((!sample) as u16 >> 4) as i16
    } else {
        sample >> 4
    };

    if ix > 15 {
        let mut exponent = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            exponent += 1;
        }
        ix -= 16;
        ix += exponent << 4;
    }

    if sample >= 0 {
        ix |= 0x0080;
    }

    (ix ^ 0x0055) as u8
}

fn alaw_expand(wert: u8) -> i16 {
    let ix = ((wert ^ 0x55) & 0x7F) as i16;
    let exponent = ix >> 4;
    let mut mantisse = ix & 0x0F;

    if exponent > 0 {
        mantisse += 16;
    }
    mantisse = (mantisse << 4) + 0x0008;
    if exponent > 1 {
        mantisse <<= exponent - 1;
    }

    if wert > 127 {
        mantisse
    } else {
        -mantisse
    }
}

fn ulaw_compress(sample: i16) -> u8 {
    // 14 MSBs plus Bias 33
    let betrag: i16 = if sample < 0 {
        ((!sample) as u16 >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };
    let betrag = betrag.min(0x1FFF);

    let mut i = betrag >> 6;
    let mut segment: i16 = 1;
    while i != 0 {
        segment += 1;
        i >>= 1;
    }

    let hoch = 0x0008 - segment;
    let tief = 0x000F - ((betrag >> segment) & 0x000F);
    let mut ergebnis = (hoch << 4) | tief;

    if sample >= 0 {
        ergebnis |= 0x0080;
    }
    ergebnis as u8
}

fn ulaw_expand(wert: u8) -> i16 {
    let vorzeichen: i16 = if wert < 0x80 { -1 } else { 1 };
    let invertiert = (!wert) as i16;
    let exponent = (invertiert >> 4) & 0x07;
    let mantisse = invertiert & 0x0F;
    let schritt: i16 = 4 << (exponent + 1);

    vorzeichen * ((0x0080 << exponent) + schritt * mantisse + schritt / 2 - 4 * 33)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stille_expandiert_nahe_null() {
        for law in [Law::Alaw, Law::Ulaw] {
            let linear = law.expandieren(law.stille());
            assert!(linear.abs() <= 8, "{law:?}: Stille ergab {linear}");
        }
    }

    #[test]
    fn alaw_kompression_ist_stabil() {
        // Jeder Law-Wert muss nach Expansion wieder auf sich selbst abbilden
        for wert in 0..=255u8 {
            let linear = Law::Alaw.expandieren(wert);
            assert_eq!(Law::Alaw.komprimieren(linear), wert, "A-law {wert:#x}");
        }
    }

    #[test]
    fn ulaw_kompression_ist_stabil() {
        // 0x7F und 0xFF sind beide "Null" – nur die positive Null ist kanonisch
        for wert in 0..=255u8 {
            if wert == 0x7F {
                continue;
            }
            let linear = Law::Ulaw.expandieren(wert);
            assert_eq!(Law::Ulaw.komprimieren(linear), wert, "µ-law {wert:#x}");
        }
    }

    #[test]
    fn tabelle_entspricht_funktion() {
        let tabelle = LawTable::new(Law::Ulaw);
        for wert in 0..=255u8 {
            assert_eq!(tabelle.linear(wert), Law::Ulaw.expandieren(wert));
        }
    }

    #[test]
    fn law_wert_klemmt() {
        let tabelle = LawTable::new(Law::Alaw);
        assert_eq!(tabelle.law_wert(1_000_000), tabelle.law_wert(i16::MAX as i32));
        assert_eq!(tabelle.law_wert(-1_000_000), tabelle.law_wert(i16::MIN as i32));
    }

    #[test]
    fn law_serde_kleinbuchstaben() {
        let json = serde_json::to_string(&Law::Ulaw).unwrap();
        assert_eq!(json, "\"ulaw\"");
    }
}
