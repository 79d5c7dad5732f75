//! LUMI lighting commands
//!
//! Each command is a fixed 8-group payload packed LSB-first with [`BitPacker`]:
//! a 7-bit command group (`0x10`), a 7-bit selector, a 5-bit marker (`0b00100`)
//! and the command arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::bits::BitPacker;

const COMMAND_GROUP: u64 = 0x10;
const SELECT_COLOR: u64 = 0x20;
const SELECT_BRIGHTNESS: u64 = 0x40;
const ARGUMENT_MARKER: u64 = 0b00100;

/// Highest accepted brightness level
pub const MAX_BRIGHTNESS: u8 = 100;

/// Key colour slot on the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSlot {
    /// Colour of regular keys
    Primary,
    /// Colour of the scale root keys
    Root,
}

impl ColorSlot {
    fn index(self) -> u64 {
        match self {
            ColorSlot::Primary => 0,
            ColorSlot::Root => 1,
        }
    }
}

/// 24-bit colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Parse `RRGGBB`, with or without a leading `#`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("invalid colour '{}' (expected RRGGBB)", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("invalid colour '{}' (expected RRGGBB)", s))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Commands understood by the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LumiCommand {
    /// Global LED brightness, 0-100 (higher values are clamped)
    Brightness(u8),
    /// Key colour for one slot
    KeyColor { slot: ColorSlot, color: Rgb },
}

impl LumiCommand {
    /// Pack the command into its 7-bit payload
    pub fn payload(&self) -> Vec<u8> {
        let mut bits = BitPacker::new();
        bits.append(COMMAND_GROUP, 7);

        match *self {
            LumiCommand::Brightness(level) => {
                bits.append(SELECT_BRIGHTNESS, 7)
                    .append(ARGUMENT_MARKER, 5)
                    .append(u64::from(level.min(MAX_BRIGHTNESS)), 7);
            }
            LumiCommand::KeyColor { slot, color } => {
                bits.append(SELECT_COLOR + slot.index() * 0x10, 7)
                    .append(ARGUMENT_MARKER, 5)
                    .append(u64::from(color.b), 8)
                    .append(u64::from(color.g), 8)
                    .append(u64::from(color.r), 8)
                    .append(0xFF, 8);
            }
        }

        bits.padded()
    }
}

impl fmt::Display for LumiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LumiCommand::Brightness(level) => write!(f, "brightness {}", level),
            LumiCommand::KeyColor { slot, color } => write!(f, "{:?} colour {}", slot, color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysex::SysexHeader;

    #[test]
    fn test_brightness_payload() {
        assert_eq!(
            LumiCommand::Brightness(50).payload(),
            vec![0x10, 0x40, 0x44, 0x0C, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_brightness_clamped() {
        assert_eq!(LumiCommand::Brightness(200).payload(), LumiCommand::Brightness(100).payload());
    }

    #[test]
    fn test_key_color_payloads() {
        let red = LumiCommand::KeyColor { slot: ColorSlot::Primary, color: Rgb::new(0xFF, 0, 0) };
        assert_eq!(red.payload(), vec![0x10, 0x20, 0x04, 0x00, 0x00, 0x7F, 0x7F, 0x03]);

        let root = LumiCommand::KeyColor { slot: ColorSlot::Root, color: Rgb::new(0x12, 0x34, 0x56) };
        assert_eq!(root.payload(), vec![0x10, 0x30, 0x44, 0x15, 0x1A, 0x12, 0x7E, 0x03]);
    }

    #[test]
    fn test_commands_frame_cleanly() {
        let header = SysexHeader::default();
        for command in [
            LumiCommand::Brightness(100),
            LumiCommand::KeyColor { slot: ColorSlot::Root, color: Rgb::new(0xFF, 0xFF, 0xFF) },
        ] {
            let frame = header.frame(&command.payload()).unwrap();
            assert_eq!(frame.data.len(), 14);
            assert!(frame.data.iter().all(|&b| b <= 0x7F));
        }
    }

    #[test]
    fn test_rgb_parsing() {
        assert_eq!("#FF8000".parse::<Rgb>().unwrap(), Rgb::new(0xFF, 0x80, 0x00));
        assert_eq!("00ff00".parse::<Rgb>().unwrap(), Rgb::new(0, 0xFF, 0));
        assert!("FF80".parse::<Rgb>().is_err());
        assert!("GG0000".parse::<Rgb>().is_err());
        assert_eq!(Rgb::new(1, 2, 3).to_string(), "#010203");
    }
}
