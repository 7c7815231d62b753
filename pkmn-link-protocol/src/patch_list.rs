//! Patch list codec.
//!
//! The link cannot carry `0xFE` as ordinary data: it is the "no data" byte a
//! unit shifts out when it has nothing ready. Before the party payloads are
//! sent, every `0xFE` in them is replaced with `0xFF` and its 1-based position
//! is recorded in a patch list, which is transmitted after the block so the
//! receiver can put the `0xFE`s back.
//!
//! Wire format:
//! ```text
//! [part 1 offsets...][0xFF][part 2 offsets...][0xFF][0x00 padding...]
//! ```
//!
//! An offset byte can only address 255 positions, so the range is split:
//! part 1 covers range offsets `0x00..=0xFB` (value `v` patches `v - 1`),
//! part 2 covers `0xFC..` (value `v` patches `0xFB + v`).

use crate::trade_block::{TradeBlock, PARTY_RANGE, TRADE_BLOCK_SIZE};

/// The value that must never appear as data on the link
pub const NO_DATA_BYTE: u8 = 0xFE;

/// What a [`NO_DATA_BYTE`] is replaced with before transmission
pub const SUBSTITUTE_BYTE: u8 = 0xFF;

/// Ends each part of the patch list
pub const PART_TERMINATOR: u8 = 0xFF;

/// First range offset addressed by part 2
pub const PART_BOUNDARY: usize = 0xFC;

/// Room for every byte of the patched range plus both terminators
pub const PATCH_LIST_CAPACITY: usize = PARTY_RANGE.end - PARTY_RANGE.start + 2;

/// An encoded patch list: both parts, terminators included.
#[derive(Clone, PartialEq, Eq)]
pub struct PatchList {
    bytes: [u8; PATCH_LIST_CAPACITY],
    len: usize,
    part2_start: usize,
}

impl PatchList {
    /// Replace every [`NO_DATA_BYTE`] in `range` with [`SUBSTITUTE_BYTE`] and
    /// return the list that undoes it.
    ///
    /// Offsets past what a part-2 entry can address are still substituted
    /// but cannot be recorded; the party range never gets that long.
    pub fn encode(range: &mut [u8]) -> PatchList {
        let mut list = PatchList {
            bytes: [0; PATCH_LIST_CAPACITY],
            len: 0,
            part2_start: 0,
        };

        let split = PART_BOUNDARY.min(range.len());
        let (part1, part2) = range.split_at_mut(split);

        for (i, byte) in part1.iter_mut().enumerate() {
            if *byte == NO_DATA_BYTE {
                *byte = SUBSTITUTE_BYTE;
                list.push((i + 1) as u8);
            }
        }
        list.push(PART_TERMINATOR);
        list.part2_start = list.len;

        for (i, byte) in part2.iter_mut().enumerate() {
            if *byte == NO_DATA_BYTE {
                *byte = SUBSTITUTE_BYTE;
                if let Ok(v) = u8::try_from(i + 1) {
                    if v != PART_TERMINATOR {
                        list.push(v);
                    }
                }
            }
        }
        list.push(PART_TERMINATOR);

        list
    }

    /// Undo an encoding: apply a full patch stream to `range`.
    pub fn decode(stream: &[u8], range: &mut [u8]) {
        let mut decoder = PatchDecoder::new();
        for &byte in stream {
            decoder.apply(byte, range);
        }
    }

    fn push(&mut self, byte: u8) {
        if let Some(slot) = self.bytes.get_mut(self.len) {
            *slot = byte;
            self.len += 1;
        }
    }

    /// Part 1 offsets followed by its terminator
    pub fn part1(&self) -> &[u8] {
        &self.bytes[..self.part2_start]
    }

    /// Part 2 offsets followed by its terminator
    pub fn part2(&self) -> &[u8] {
        &self.bytes[self.part2_start..self.len]
    }

    /// Both parts back to back, as transmitted
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Stream byte at `index`, zero once the list is exhausted
    pub fn byte_at(&self, index: usize) -> u8 {
        self.as_bytes().get(index).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for PatchList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchList")
            .field("part1", &self.part1())
            .field("part2", &self.part2())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    First,
    Second,
    Done,
}

/// Applies a patch stream one byte at a time, as it arrives on the link.
///
/// `0x00` padding is ignored, each [`PART_TERMINATOR`] moves to the next part,
/// and everything after the second terminator is ignored. Offsets that point
/// outside their part or outside `range` are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchDecoder {
    part: Part,
}

impl PatchDecoder {
    pub const fn new() -> Self {
        PatchDecoder { part: Part::First }
    }

    pub fn apply(&mut self, byte: u8, range: &mut [u8]) {
        match (self.part, byte) {
            (Part::Done, _) | (_, 0) => {}
            (Part::First, PART_TERMINATOR) => self.part = Part::Second,
            (Part::Second, PART_TERMINATOR) => self.part = Part::Done,
            (Part::First, v) => {
                let index = v as usize - 1;
                if index < PART_BOUNDARY {
                    patch(range, index);
                }
            }
            (Part::Second, v) => patch(range, PART_BOUNDARY - 1 + v as usize),
        }
    }

    /// True once both parts have been terminated
    pub fn is_done(&self) -> bool {
        self.part == Part::Done
    }
}

impl Default for PatchDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn patch(range: &mut [u8], index: usize) {
    if let Some(byte) = range.get_mut(index) {
        *byte = NO_DATA_BYTE;
    }
}

/// The local block as it goes out on the link: party payloads with
/// [`NO_DATA_BYTE`]s substituted, plus the patch list that restores them.
///
/// Building this walks the whole party range, so the engine only rebuilds
/// it outside the byte callback.
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingBlock {
    bytes: [u8; TRADE_BLOCK_SIZE],
    patches: PatchList,
}

impl OutgoingBlock {
    pub fn build(block: &TradeBlock) -> Self {
        let mut bytes = *block.as_bytes();
        let patches = PatchList::encode(&mut bytes[PARTY_RANGE]);
        OutgoingBlock { bytes, patches }
    }

    /// Block byte to transmit at `offset`, zero past the end
    pub fn byte_at(&self, offset: usize) -> u8 {
        self.bytes.get(offset).copied().unwrap_or(0)
    }

    pub fn as_bytes(&self) -> &[u8; TRADE_BLOCK_SIZE] {
        &self.bytes
    }

    pub fn patches(&self) -> &PatchList {
        &self.patches
    }
}

impl std::fmt::Debug for OutgoingBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingBlock")
            .field("patches", &self.patches)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade_block::MEMBER_PAYLOAD_SIZE;
    use proptest::prelude::*;

    #[test]
    fn test_encode_short_range() {
        let original = [0x01, 0xFE, 0x02, 0xFE, 0x00];
        let mut data = original;
        let list = PatchList::encode(&mut data);

        assert_eq!(data, [0x01, 0xFF, 0x02, 0xFF, 0x00]);
        assert_eq!(list.part1(), &[0x02, 0x04, 0xFF]);
        assert_eq!(list.part2(), &[0xFF]);

        PatchList::decode(list.as_bytes(), &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_encode_no_patches() {
        let mut data = [0x10u8; 300];
        let list = PatchList::encode(&mut data);
        assert_eq!(list.as_bytes(), &[0xFF, 0xFF]);
        assert_eq!(list.byte_at(2), 0);
        assert_eq!(list.byte_at(500), 0);
    }

    #[test]
    fn test_encode_part_two() {
        let mut data = [0u8; 264];
        data[0xFB] = NO_DATA_BYTE;
        data[0xFC] = NO_DATA_BYTE;
        data[0x107] = NO_DATA_BYTE;
        let list = PatchList::encode(&mut data);

        assert_eq!(list.part1(), &[0xFC, 0xFF]);
        assert_eq!(list.part2(), &[0x01, 0x0C, 0xFF]);
    }

    #[test]
    fn test_decoder_ignores_padding_and_trailing_data() {
        let mut data = [0u8; 264];
        let mut decoder = PatchDecoder::new();
        for byte in [0x00, 0x03, 0xFF, 0x00, 0x02, 0xFF, 0x05, 0x07] {
            decoder.apply(byte, &mut data);
        }
        assert!(decoder.is_done());
        assert_eq!(data[2], NO_DATA_BYTE);
        assert_eq!(data[0xFD], NO_DATA_BYTE);
        assert_eq!(data.iter().filter(|&&b| b == NO_DATA_BYTE).count(), 2);
    }

    #[test]
    fn test_decoder_drops_out_of_range_offsets() {
        let mut data = [0u8; 264];
        let mut decoder = PatchDecoder::new();

        // 0xFD in part 1 would address 0xFC, which belongs to part 2
        decoder.apply(0xFD, &mut data);
        decoder.apply(PART_TERMINATOR, &mut data);
        // 0xFB + 0x40 is past the end of the range
        decoder.apply(0x40, &mut data);

        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_outgoing_block_substitutes_party_only() {
        let mut block = TradeBlock::default();
        block.set_species(0, 0x15).unwrap();
        block.payload_mut(1).unwrap()[5] = NO_DATA_BYTE;
        let outgoing = OutgoingBlock::build(&block);

        let index = MEMBER_PAYLOAD_SIZE + 5;
        assert_eq!(outgoing.as_bytes()[PARTY_RANGE.start + index], SUBSTITUTE_BYTE);
        assert_eq!(outgoing.patches().part1(), &[(index + 1) as u8, 0xFF]);
        // Species terminator stays as it is
        assert_eq!(outgoing.byte_at(PARTY_RANGE.start - 1), 0xFF);
        assert_eq!(outgoing.byte_at(TRADE_BLOCK_SIZE), 0);
    }

    proptest! {
        #[test]
        fn prop_round_trip(original in proptest::collection::vec(
            prop_oneof![Just(NO_DATA_BYTE), any::<u8>()], 264)) {
            let mut data = original.clone();
            let list = PatchList::encode(&mut data);
            prop_assert!(!data.contains(&NO_DATA_BYTE));
            PatchList::decode(list.as_bytes(), &mut data);
            prop_assert_eq!(data, original);
        }

        #[test]
        fn prop_offsets_strictly_increasing(original in proptest::collection::vec(any::<u8>(), 264)) {
            let mut data = original;
            let list = PatchList::encode(&mut data);
            for part in [list.part1(), list.part2()] {
                let (terminator, entries) = part.split_last().unwrap();
                prop_assert_eq!(*terminator, PART_TERMINATOR);
                prop_assert!(entries.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
