//! Konferenz-Tabelle – Mitgliedschaften aller Konferenzen
//!
//! Ein Kanal gehoert hoechstens einer Konferenz an. Beitritt zu einer neuen
//! Konferenz verlaesst automatisch die alte; eine Konferenz ohne Mitglieder
//! wird entfernt.
//!
//! Die Tabelle liegt im globalen Zustand der Engine und wird nur unter dem
//! globalen Lock benutzt, daher reichen einfache Maps.

use bearer_core::{ChannelId, ConferenceId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Ergebnis eines Austritts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verlassen {
    pub konferenz: ConferenceId,
    /// Die Konferenz hat danach kein Mitglied mehr
    pub leer: bool,
}

#[derive(Debug, Default)]
pub struct ConferenceTable {
    /// Mitglieder pro Konferenz (sortiert fuer deterministische Dumps)
    konferenzen: BTreeMap<ConferenceId, BTreeSet<ChannelId>>,
    /// Kanal -> Konferenz fuer schnelles Verlassen
    kanal_konferenz: HashMap<ChannelId, ConferenceId>,
}

impl ConferenceTable {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Ein Kanal tritt einer Konferenz bei
    ///
    /// Liefert den Austritt aus der vorherigen Konferenz, falls es einen gab.
    /// Erneuter Beitritt zur selben Konferenz aendert nichts.
    pub fn beitreten(&mut self, konferenz: ConferenceId, kanal: &ChannelId) -> Option<Verlassen> {
        let verlassen = match self.kanal_konferenz.get(kanal) {
            Some(alt) if *alt == konferenz => return None,
            Some(_) => self.verlassen(kanal),
            None => None,
        };

        self.konferenzen
            .entry(konferenz)
            .or_default()
            .insert(kanal.clone());
        self.kanal_konferenz.insert(kanal.clone(), konferenz);

        tracing::debug!(kanal = %kanal, konferenz = %konferenz, "Konferenz beigetreten");
        verlassen
    }

    /// Ein Kanal verlaesst seine Konferenz
    pub fn verlassen(&mut self, kanal: &ChannelId) -> Option<Verlassen> {
        let konferenz = self.kanal_konferenz.remove(kanal)?;

        let leer = match self.konferenzen.get_mut(&konferenz) {
            Some(mitglieder) => {
                mitglieder.remove(kanal);
                mitglieder.is_empty()
            }
            None => true,
        };

        if leer {
            self.konferenzen.remove(&konferenz);
            tracing::debug!(konferenz = %konferenz, "Leere Konferenz entfernt");
        }

        tracing::debug!(kanal = %kanal, konferenz = %konferenz, "Konferenz verlassen");
        Some(Verlassen { konferenz, leer })
    }

    pub fn konferenz_von(&self, kanal: &ChannelId) -> Option<ConferenceId> {
        self.kanal_konferenz.get(kanal).copied()
    }

    pub fn mitglieder(&self, konferenz: ConferenceId) -> Vec<ChannelId> {
        self.konferenzen
            .get(&konferenz)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn konferenzen(&self) -> Vec<ConferenceId> {
        self.konferenzen.keys().copied().collect()
    }

    pub fn anzahl(&self) -> usize {
        self.konferenzen.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.konferenzen.is_empty()
    }

    /// Debug-Ausgabe aller Konferenzen und Mitglieder
    pub fn dump(&self) {
        if self.konferenzen.is_empty() {
            tracing::debug!("Konferenz-Dump: keine Konferenzen");
            return;
        }
        for (konferenz, mitglieder) in &self.konferenzen {
            let namen: Vec<&str> = mitglieder.iter().map(|k| k.as_str()).collect();
            tracing::debug!(
                konferenz = %konferenz,
                mitglieder = ?namen,
                "Konferenz-Dump"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn konf(n: u32) -> ConferenceId {
        ConferenceId::from_raw(n).unwrap()
    }

    #[test]
    fn beitreten_und_verlassen() {
        let mut t = ConferenceTable::neu();
        let a = ChannelId::new("A");
        let b = ChannelId::new("B");

        assert_eq!(t.beitreten(konf(7), &a), None);
        assert_eq!(t.beitreten(konf(7), &b), None);
        assert_eq!(t.mitglieder(konf(7)), vec![a.clone(), b.clone()]);

        let v = t.verlassen(&a).unwrap();
        assert_eq!(v, Verlassen { konferenz: konf(7), leer: false });
        assert_eq!(t.mitglieder(konf(7)), vec![b.clone()]);

        let v = t.verlassen(&b).unwrap();
        assert!(v.leer);
        assert!(t.ist_leer());
    }

    #[test]
    fn wechsel_verlaesst_alte_konferenz() {
        let mut t = ConferenceTable::neu();
        let a = ChannelId::new("A");

        t.beitreten(konf(1), &a);
        let v = t.beitreten(konf(2), &a).unwrap();
        assert_eq!(v, Verlassen { konferenz: konf(1), leer: true });
        assert_eq!(t.konferenz_von(&a), Some(konf(2)));
        assert_eq!(t.konferenzen(), vec![konf(2)]);
    }

    #[test]
    fn erneuter_beitritt_ist_idempotent() {
        let mut t = ConferenceTable::neu();
        let a = ChannelId::new("A");

        t.beitreten(konf(3), &a);
        assert_eq!(t.beitreten(konf(3), &a), None);
        assert_eq!(t.mitglieder(konf(3)).len(), 1);
    }

    #[test]
    fn verlassen_ohne_konferenz() {
        let mut t = ConferenceTable::neu();
        assert_eq!(t.verlassen(&ChannelId::new("X")), None);
    }
}
