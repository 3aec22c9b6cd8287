//! bearer-engine – Kern der Bearer-DSP
//!
//! Sitzt zwischen Protokoll-Stack (obere Schicht) und Hardware-Treiber
//! (untere Schicht) eines Bearer-Kanals und leitet Sprachframes durch eine
//! feste Stufenfolge. Alle Zustaende liegen in einer [`DspEngine`].
//!
//! ## Module
//! - [`engine`] – Lebenszyklus, Einstiegspunkte, globale kritische Sektion
//! - [`command`] – Opcodes und Dekodierung der Control-Kommandos
//! - [`channel`] – Kanal-Kontext, Ringpuffer, Snapshot
//! - [`offload`] – Ableitung des Hardware-Auslagerungsplans
//! - [`capability`] – Feature-Snapshot und zurueckgestellte Anforderungen
//! - [`conference`] – Konferenz-Mitgliedschaften
//! - [`stages`] – Schnittstellen der externen Stufen-Engines
//! - [`passive`] – eingebaute Stufen ohne externe Bibliotheken
//! - [`transport`] – Zustellung an beide Schichten
//! - [`timer`] / [`clock`] – Guard-/Ton-Timer und Sample-Clock
//! - [`stats`] – Zaehler pro Kanal

pub mod capability;
pub mod channel;
pub mod clock;
pub mod command;
pub mod conference;
pub mod config;
pub mod engine;
pub mod message;
pub mod offload;
pub mod passive;
pub mod stages;
pub mod stats;
pub mod timer;
pub mod transport;

mod control;
mod data;
mod negotiation;
mod state;

pub use capability::{FeatureSet, NegotiationState};
pub use channel::{ChannelSnapshot, CipherOutcome};
pub use clock::{ClockTick, SampleClock};
pub use command::ControlCommand;
pub use config::EngineOptions;
pub use engine::DspEngine;
pub use message::{Downward, LowerMessage, UpperMessage, Upward};
pub use offload::{HardwareBinding, OffloadPlan, StageMode};
pub use passive::{PassiveStages, SoftwareConference};
pub use stages::{ConferenceEngine, StageError, StageFactory};
pub use stats::{ChannelCounters, EngineStats};
pub use timer::TimerEvent;
pub use transport::{FrameTransport, QueueTransport, TransportError, TransportReceivers};
