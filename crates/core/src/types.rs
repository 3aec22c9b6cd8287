//! Gemeinsame Identifikationstypen
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Kanalnamen, Konferenznummern und Ton-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Stabile Kennung eines Bearer-Kanals
///
/// Intern ein `Arc<str>`, damit Klone im Datenpfad keine Allokation kosten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    /// Erstellt eine Kanal-ID aus einem beliebigen Namen
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Erstellt den Namen aus Stack- und Kanalnummer (`DSP_S<stack>/C<kanal>`)
    pub fn aus_stack(stack: u32, kanal: u32) -> Self {
        Self::new(format!("DSP_S{stack:x}/C{kanal:x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Konferenznummer (niemals 0 – die 0 bedeutet "keine Konferenz")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConferenceId(NonZeroU32);

impl ConferenceId {
    /// Wandelt die Rohnummer aus einem Kommando um; 0 ergibt `None`
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conf:{}", self.0)
    }
}

/// Kennung eines Tonmusters, wie sie der Ton-Generator versteht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToneId(pub u32);

impl std::fmt::Display for ToneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tone:{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kanalname_aus_stack() {
        let id = ChannelId::aus_stack(0x1a, 2);
        assert_eq!(id.as_str(), "DSP_S1a/C2");
        assert_eq!(id.to_string(), "DSP_S1a/C2");
    }

    #[test]
    fn konferenz_null_ist_keine_konferenz() {
        assert!(ConferenceId::from_raw(0).is_none());
        assert_eq!(ConferenceId::from_raw(7).map(|c| c.get()), Some(7));
    }

    #[test]
    fn kanal_id_klone_sind_gleich() {
        let a = ChannelId::new("DSP_S1/C1");
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, ChannelId::new("DSP_S1/C2"));
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let id = ChannelId::new("DSP_S1/C1");
        let json = serde_json::to_string(&id).unwrap();
        let id2: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, id2);

        let conf = ConferenceId::from_raw(7).unwrap();
        let json = serde_json::to_string(&conf).unwrap();
        assert_eq!(json, "7");
    }
}
