//! bearer-audio – Audio-Bausteine der Bearer-DSP
//!
//! - `Frame`: besitzender Puffer fuer Law-Samples
//! - G.711 Expansion/Kompression (A-law, µ-law)
//! - Lautstaerke-Stufen als Law -> Law Tabellen

pub mod error;
pub mod frame;
pub mod law;
pub mod volume;

pub use error::FrameError;
pub use frame::{Frame, MAX_FRAME_LEN};
pub use law::{Law, LawTable};
pub use volume::{VolumeTables, MAX_GAIN_STEP};
