//! MIDI message types
//!
//! Parsing and encoding of the messages exchanged with the keyboard. Only the
//! messages the gateway acts on get their own variant; everything else is kept
//! as raw bytes so it can be logged and skipped.

use std::fmt;

/// Status byte opening a system-exclusive message
pub const SYSEX_START: u8 = 0xF0;
/// Status byte closing a system-exclusive message
pub const SYSEX_END: u8 = 0xF7;

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    ///
    /// Velocity 0 is kept as-is; use [`MidiMessage::key_state`] to read it
    /// as a release.
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive body, without the F0/F7 markers
    SysEx { data: Vec<u8> },

    /// Any other well-formed message, kept verbatim
    Other { data: Vec<u8> },
}

/// Pressed/released view of a note message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed { note: u8, velocity: u8 },
    Released { note: u8 },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not used by the keyboard
        if status < 0x80 {
            return None;
        }

        match status {
            0x80..=0x9F | 0xB0..=0xBF => {
                if rest.len() < 2 {
                    return None;
                }
                let channel = status & 0x0F;
                let (a, b) = (rest[0] & 0x7F, rest[1] & 0x7F);
                Some(match status & 0xF0 {
                    0x80 => MidiMessage::NoteOff { channel, note: a, velocity: b },
                    0x90 => MidiMessage::NoteOn { channel, note: a, velocity: b },
                    _ => MidiMessage::ControlChange { channel, cc: a, value: b },
                })
            }
            SYSEX_START => {
                let end = rest.iter().position(|&b| b == SYSEX_END)?;
                Some(MidiMessage::SysEx { data: rest[..end].to_vec() })
            }
            _ => Some(MidiMessage::Other { data: data.to_vec() }),
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::SysEx { data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(SYSEX_START);
                result.extend_from_slice(data);
                result.push(SYSEX_END);
                result
            }
            MidiMessage::Other { data } => data.clone(),
        }
    }

    /// Read a note message as a key press or release
    pub fn key_state(&self) -> Option<KeyState> {
        match *self {
            MidiMessage::NoteOn { note, velocity, .. } if velocity > 0 => {
                Some(KeyState::Pressed { note, velocity })
            }
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => {
                Some(KeyState::Released { note })
            }
            _ => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { data } => write!(f, "SysEx {} bytes", data.len()),
            MidiMessage::Other { data } => write!(f, "Other {}", format_hex(data)),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
