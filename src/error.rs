//! Error types for the LUMI gateway

use thiserror::Error;

/// Errors raised by the codec, the device driver and the animation tasks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LumiError {
    /// A byte above 0x7F was handed to frame building
    #[error("Invalid payload: byte 0x{byte:02X} at offset {offset} is not 7-bit clean")]
    InvalidPayload { offset: usize, byte: u8 },

    /// A token in a manual command string is not a hex byte
    #[error("Malformed hex token: '{0}'")]
    MalformedHex(String),

    /// The target MIDI endpoint is not currently present
    #[error("Device not found: {0}")]
    DeviceUnavailable(String),

    /// The MIDI output rejected an already-accepted message
    #[error("Transport write failed: {0}")]
    TransportWriteFailure(String),
}

pub type Result<T, E = LumiError> = std::result::Result<T, E>;
