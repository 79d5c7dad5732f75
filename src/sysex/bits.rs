//! 7-bit group packing for sysex payloads
//!
//! Sysex data bytes must never set the high bit, so wide values are spread
//! across consecutive 7-bit groups, least significant bits first.

/// Bits carried by one group
pub const GROUP_BITS: usize = 7;

/// Minimum groups returned by [`BitPacker::padded`]
pub const DEFAULT_MIN_GROUPS: usize = 8;

const GROUP_MASK: u64 = 0x7F;

/// Accumulates values of arbitrary bit width into 7-bit groups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitPacker {
    groups: Vec<u8>,
    total_bits: usize,
}

impl BitPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value`
    ///
    /// A partially filled last group is completed first; the remainder
    /// carries into fresh groups.
    pub fn append(&mut self, value: u64, width: usize) -> &mut Self {
        if width == 0 {
            return self;
        }

        let mut value = if width >= 64 { value } else { value & ((1u64 << width) - 1) };
        let mut used = self.total_bits % GROUP_BITS;
        let mut packed = if used > 0 { self.groups.pop().unwrap_or(0) } else { 0 };

        self.total_bits += width;

        let mut remaining = width;
        loop {
            packed |= ((value << used) & GROUP_MASK) as u8;
            self.groups.push(packed);

            let consumed = GROUP_BITS - used;
            if remaining <= consumed {
                break;
            }
            remaining -= consumed;
            value >>= consumed;
            packed = 0;
            used = 0;
        }

        self
    }

    /// Stored groups, right-padded with zero groups up to `min_groups`
    pub fn snapshot(&self, min_groups: usize) -> Vec<u8> {
        let mut groups = self.groups.clone();
        if groups.len() < min_groups {
            groups.resize(min_groups, 0);
        }
        groups
    }

    /// Stored groups padded to the fixed command length
    pub fn padded(&self) -> Vec<u8> {
        self.snapshot(DEFAULT_MIN_GROUPS)
    }

    pub fn bit_len(&self) -> usize {
        self.total_bits
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Reads values back out of 7-bit groups in packing order
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    groups: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(groups: &'a [u8]) -> Self {
        Self { groups, position: 0 }
    }

    /// Read the next `width` bits, or `None` past the end of the data
    pub fn read(&mut self, width: usize) -> Option<u64> {
        if width > 64 || self.position + width > self.groups.len() * GROUP_BITS {
            return None;
        }

        let mut value = 0u64;
        for i in 0..width {
            let bit_pos = self.position + i;
            let group = self.groups[bit_pos / GROUP_BITS];
            let bit = (group >> (bit_pos % GROUP_BITS)) & 1;
            value |= u64::from(bit) << i;
        }
        self.position += width;

        Some(value)
    }
}
