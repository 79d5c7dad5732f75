//! LUMI sysex codec
//!
//! Commands travel as `F0 <manufacturer> <sub-id> <device-id> <payload> <checksum> F7`.
//! The F0/F7 markers are added by [`MidiMessage::encode`](crate::midi::MidiMessage::encode);
//! everything in this module works on the bytes between them.

pub mod bits;
pub mod commands;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LumiError, Result};
use crate::midi::{format_hex, MidiMessage};

pub use bits::{BitPacker, BitReader};
pub use commands::{ColorSlot, LumiCommand, Rgb};

/// ROLI manufacturer id
pub const ROLI_MANUFACTURER: [u8; 3] = [0x00, 0x21, 0x10];
/// Sub-id used by every LUMI command
pub const LUMI_SUB_ID: [u8; 1] = [0x77];
/// Device id addressing the connected block
pub const LUMI_DEVICE_ID: [u8; 1] = [0x00];

/// Identity frame the block sends periodically
pub const HEARTBEAT: [u8; 13] = [0, 33, 16, 119, 102, 0, 0, 0, 0, 32, 0, 0, 109];

/// Rolling checksum over a command payload
///
/// Seeded with the payload length, then `acc = acc * 3 + byte (mod 256)` for
/// every byte, keeping the low 7 bits of the result. The constants match the
/// block firmware and must not change.
pub fn checksum(payload: &[u8]) -> u8 {
    let seed = payload.len() as u8;
    let acc = payload
        .iter()
        .fold(seed, |acc, &b| acc.wrapping_mul(3).wrapping_add(b));
    acc & 0x7F
}

/// Id bytes preceding every payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SysexHeader {
    #[serde(default = "default_manufacturer")]
    pub manufacturer: Vec<u8>,
    #[serde(default = "default_sub_id")]
    pub sub_id: Vec<u8>,
    #[serde(default = "default_device_id")]
    pub device_id: Vec<u8>,
}

impl Default for SysexHeader {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            sub_id: default_sub_id(),
            device_id: default_device_id(),
        }
    }
}

impl SysexHeader {
    /// Total length of the id bytes
    pub fn len(&self) -> usize {
        self.manufacturer.len() + self.sub_id.len() + self.device_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject header bytes that are not 7-bit clean
    pub fn validate(&self) -> Result<()> {
        ensure_seven_bit(self.manufacturer.iter().chain(&self.sub_id).chain(&self.device_id))
    }

    /// Frame a command payload with this header and its checksum
    pub fn frame(&self, command: &[u8]) -> Result<Frame> {
        build_frame(&self.manufacturer, &self.sub_id, &self.device_id, command)
    }
}

fn default_manufacturer() -> Vec<u8> {
    ROLI_MANUFACTURER.to_vec()
}

fn default_sub_id() -> Vec<u8> {
    LUMI_SUB_ID.to_vec()
}

fn default_device_id() -> Vec<u8> {
    LUMI_DEVICE_ID.to_vec()
}

/// A framed sysex body, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    /// Hex dump, e.g. `00 21 10 77 00 10 20 62`
    pub fn hex(&self) -> String {
        format_hex(&self.data)
    }

    pub fn into_message(self) -> MidiMessage {
        MidiMessage::SysEx { data: self.data }
    }
}

/// Reject the first byte above 0x7F, reporting its offset
pub(crate) fn ensure_seven_bit<'a>(bytes: impl IntoIterator<Item = &'a u8>) -> Result<()> {
    match bytes.into_iter().enumerate().find(|&(_, &b)| b > 0x7F) {
        Some((offset, &byte)) => Err(LumiError::InvalidPayload { offset, byte }),
        None => Ok(()),
    }
}

/// Concatenate the id bytes and `command`, then append `checksum(command)`
pub fn build_frame(
    manufacturer: &[u8],
    sub_id: &[u8],
    device_id: &[u8],
    command: &[u8],
) -> Result<Frame> {
    let mut data = Vec::with_capacity(manufacturer.len() + sub_id.len() + device_id.len() + command.len() + 1);
    data.extend_from_slice(manufacturer);
    data.extend_from_slice(sub_id);
    data.extend_from_slice(device_id);
    data.extend_from_slice(command);

    ensure_seven_bit(&data)?;

    data.push(checksum(command));

    Ok(Frame { data })
}

/// Fields of an inbound frame that carries the configured header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub manufacturer: Vec<u8>,
    pub sub_id: Vec<u8>,
    pub device_id: Vec<u8>,
    pub payload: Vec<u8>,
    pub checksum: Option<u8>,
    pub checksum_valid: bool,
}

/// Result of classifying an inbound sysex body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Periodic identity frame, nothing to act on
    Heartbeat,
    /// A reply from the block, split into its fields
    Reply(DecodedFrame),
    /// Sysex from another manufacturer or product
    Foreign(Vec<u8>),
}

/// Classify an inbound sysex body
///
/// Replies are decoded and logged; no reply triggers any further behaviour.
pub fn parse_frame(header: &SysexHeader, raw: &[u8]) -> Inbound {
    if raw == HEARTBEAT {
        return Inbound::Heartbeat;
    }

    debug!("[Received]: '{}'", format_hex(raw));

    let prefix_len = header.manufacturer.len() + header.sub_id.len();
    let matches_header = raw.len() >= header.len()
        && raw[..header.manufacturer.len()] == header.manufacturer[..]
        && raw[header.manufacturer.len()..prefix_len] == header.sub_id[..];

    if !matches_header {
        debug!("Ignoring foreign sysex ({} bytes)", raw.len());
        return Inbound::Foreign(raw.to_vec());
    }

    let (ids, body) = raw.split_at(header.len());
    let (manufacturer, rest) = ids.split_at(header.manufacturer.len());
    let (sub_id, device_id) = rest.split_at(header.sub_id.len());

    let (payload, trailing) = match body.split_last() {
        Some((&last, payload)) => (payload, Some(last)),
        None => (body, None),
    };
    let checksum_valid = trailing == Some(checksum(payload));

    let decoded = DecodedFrame {
        manufacturer: manufacturer.to_vec(),
        sub_id: sub_id.to_vec(),
        device_id: device_id.to_vec(),
        payload: payload.to_vec(),
        checksum: trailing,
        checksum_valid,
    };

    debug!(
        "Device {} reply: payload '{}' checksum {:?} ({})",
        format_hex(&decoded.device_id),
        format_hex(&decoded.payload),
        decoded.checksum,
        if checksum_valid { "ok" } else { "mismatch" }
    );

    Inbound::Reply(decoded)
}

/// Parse whitespace separated hex tokens, e.g. `"00 21 10 77"`
pub fn parse_hex_string(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|token| {
            u8::from_str_radix(token, 16).map_err(|_| LumiError::MalformedHex(token.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_checksum_known_values() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2]), 23);
        assert_eq!(checksum(&[2, 1]), 25);
        assert_eq!(checksum(&[0x10, 0x20]), 98);
    }

    #[test]
    fn test_checksum_of_heartbeat_payload() {
        // The heartbeat trailer is the checksum of its payload
        assert_eq!(checksum(&[0, 0, 0, 0, 32, 0, 0]), 109);
    }

    #[test]
    fn test_build_frame_layout() {
        let frame = SysexHeader::default().frame(&[0x10, 0x20]).unwrap();
        assert_eq!(frame.data, vec![0x00, 0x21, 0x10, 0x77, 0x00, 0x10, 0x20, 98]);
        assert_eq!(frame.hex(), "00 21 10 77 00 10 20 62");
    }

    #[test]
    fn test_build_frame_rejects_high_bit() {
        let err = build_frame(&ROLI_MANUFACTURER, &LUMI_SUB_ID, &LUMI_DEVICE_ID, &[0x10, 0x80]).unwrap_err();
        assert_eq!(err, LumiError::InvalidPayload { offset: 6, byte: 0x80 });

        let err = build_frame(&[0xF0], &LUMI_SUB_ID, &LUMI_DEVICE_ID, &[]).unwrap_err();
        assert!(matches!(err, LumiError::InvalidPayload { offset: 0, byte: 0xF0 }));
    }

    #[test]
    fn test_heartbeat_is_discarded() {
        assert_eq!(parse_frame(&SysexHeader::default(), &HEARTBEAT), Inbound::Heartbeat);
    }

    #[test]
    fn test_reply_is_decoded() {
        let raw = [0x00, 0x21, 0x10, 0x77, 0x66, 0x10, 0x20, 98];
        let Inbound::Reply(decoded) = parse_frame(&SysexHeader::default(), &raw) else {
            panic!("expected a reply");
        };
        assert_eq!(decoded.manufacturer, ROLI_MANUFACTURER);
        assert_eq!(decoded.sub_id, LUMI_SUB_ID);
        assert_eq!(decoded.device_id, vec![0x66]);
        assert_eq!(decoded.payload, vec![0x10, 0x20]);
        assert_eq!(decoded.checksum, Some(98));
        assert!(decoded.checksum_valid);
    }

    #[test]
    fn test_near_heartbeat_is_decoded() {
        let mut raw = HEARTBEAT;
        raw[12] = 0;
        let Inbound::Reply(decoded) = parse_frame(&SysexHeader::default(), &raw) else {
            panic!("expected a reply");
        };
        assert!(!decoded.checksum_valid);
    }

    #[test]
    fn test_foreign_sysex() {
        let raw = [0x7E, 0x7F, 0x06, 0x01];
        assert_eq!(parse_frame(&SysexHeader::default(), &raw), Inbound::Foreign(raw.to_vec()));
        assert!(matches!(parse_frame(&SysexHeader::default(), &[0x00]), Inbound::Foreign(_)));
    }

    #[test]
    fn test_parse_hex_string() {
        assert_eq!(parse_hex_string("00 21 10 77 66").unwrap(), vec![0x00, 0x21, 0x10, 0x77, 0x66]);
        assert_eq!(parse_hex_string("  7f\n6A  ").unwrap(), vec![0x7F, 0x6A]);
        assert_eq!(parse_hex_string("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_hex_string_rejects_garbage() {
        assert_eq!(parse_hex_string("00 ZZ 10"), Err(LumiError::MalformedHex("ZZ".to_string())));
        assert!(parse_hex_string("100").is_err());
    }

    proptest! {
        #[test]
        fn prop_checksum_in_range(payload in prop::collection::vec(any::<u8>(), 0..64)) {
            let sum = checksum(&payload);
            prop_assert!(sum <= 0x7F);
            prop_assert_eq!(sum, checksum(&payload));
        }

        #[test]
        fn prop_valid_frames_are_seven_bit(command in prop::collection::vec(0u8..=0x7F, 0..32)) {
            let frame = SysexHeader::default().frame(&command).unwrap();
            prop_assert!(frame.data.iter().all(|&b| b <= 0x7F));
            prop_assert_eq!(frame.data.len(), 5 + command.len() + 1);
        }
    }
}
