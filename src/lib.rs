//! LUMI GW
//!
//! Drives the lights of a ROLI LUMI Keys block over MIDI: sysex command
//! framing, and ripple animations launched from live key presses.

pub mod api;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod midi;
pub mod ripple;
pub mod router;
pub mod sysex;
pub mod transport;

pub use config::AppConfig;
pub use error::LumiError;
