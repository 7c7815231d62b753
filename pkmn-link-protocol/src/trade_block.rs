//! Fixed-layout trade block exchanged between the two units.
//!
//! Layout (Gen I, 415 bytes):
//! ```text
//! [trainer_name:11][party_count:1][species:7][party:6*44][ot_names:6*11][nicknames:6*11]
//! ```
//!
//! The party payloads are opaque to the engine. They are only ever copied
//! from the partner's block into ours when a trade completes.

use std::ops::Range;

use thiserror::Error;

/// Number of party slots in a trade block
pub const PARTY_SIZE: usize = 6;

/// Size of one opaque party member payload
pub const MEMBER_PAYLOAD_SIZE: usize = 44;

/// Size of an encoded name buffer, terminator included
pub const NAME_SIZE: usize = 11;

/// Total serialized size of a trade block
pub const TRADE_BLOCK_SIZE: usize = NAME_SIZE + 1 + (PARTY_SIZE + 1)
    + PARTY_SIZE * MEMBER_PAYLOAD_SIZE
    + PARTY_SIZE * NAME_SIZE
    + PARTY_SIZE * NAME_SIZE;

/// Species value of an empty party slot, also terminates the species list
pub const NO_SPECIES: u8 = 0xFF;

/// Name terminator and padding character
pub const NAME_TERMINATOR: u8 = 0x50;

/// Longest trainer / original trainer name
pub const MAX_TRAINER_NAME_LEN: usize = 7;

/// Longest nickname
pub const MAX_NICKNAME_LEN: usize = 10;

/// Byte offsets of each field inside the serialized block
mod offset {
    use super::*;

    pub const TRAINER_NAME: usize = 0;
    pub const PARTY_COUNT: usize = TRAINER_NAME + NAME_SIZE;
    pub const SPECIES: usize = PARTY_COUNT + 1;
    pub const PARTY: usize = SPECIES + PARTY_SIZE + 1;
    pub const OT_NAMES: usize = PARTY + PARTY_SIZE * MEMBER_PAYLOAD_SIZE;
    pub const NICKNAMES: usize = OT_NAMES + PARTY_SIZE * NAME_SIZE;
}

/// Byte range of the party payloads, the only region covered by the patch list
pub const PARTY_RANGE: Range<usize> =
    offset::PARTY..offset::PARTY + PARTY_SIZE * MEMBER_PAYLOAD_SIZE;

/// Errors building or editing a trade block
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("trade block must be {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("party slot {0} out of range")]
    InvalidSlot(usize),
    #[error("name is {len} characters, at most {max} fit")]
    NameTooLong { len: usize, max: usize },
    #[error("character {0:?} has no encoding")]
    UnsupportedChar(char),
}

/// A serialized trade block
#[derive(Clone, PartialEq, Eq)]
pub struct TradeBlock {
    raw: [u8; TRADE_BLOCK_SIZE],
}

impl TradeBlock {
    /// An all-zero block, used as scratch space for the partner's data
    pub const fn zeroed() -> Self {
        TradeBlock {
            raw: [0; TRADE_BLOCK_SIZE],
        }
    }

    /// A block holding a single party member in slot 0.
    ///
    /// Every other species slot is marked empty and the trainer / OT names
    /// of all slots are set to `trainer`.
    pub fn single(
        trainer: &str,
        species: u8,
        payload: &[u8; MEMBER_PAYLOAD_SIZE],
        nickname: &str,
    ) -> Result<Self, RecordError> {
        let mut block = TradeBlock::zeroed();
        block.raw[offset::SPECIES..offset::PARTY].fill(NO_SPECIES);
        block.raw[offset::PARTY_COUNT] = 1;

        let trainer = encode_name(trainer, MAX_TRAINER_NAME_LEN)?;
        block.raw[offset::TRAINER_NAME..offset::TRAINER_NAME + NAME_SIZE].copy_from_slice(&trainer);
        for slot in 0..PARTY_SIZE {
            block.ot_name_mut(slot)?.copy_from_slice(&trainer);
            block.nickname_mut(slot)?.fill(NAME_TERMINATOR);
        }

        block.set_species(0, species)?;
        block.payload_mut(0)?.copy_from_slice(payload);
        block.set_nickname(0, nickname)?;
        Ok(block)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let raw: [u8; TRADE_BLOCK_SIZE] =
            bytes.try_into().map_err(|_| RecordError::WrongLength {
                expected: TRADE_BLOCK_SIZE,
                actual: bytes.len(),
            })?;
        Ok(TradeBlock { raw })
    }

    pub fn as_bytes(&self) -> &[u8; TRADE_BLOCK_SIZE] {
        &self.raw
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8; TRADE_BLOCK_SIZE] {
        &mut self.raw
    }

    /// The patched region (party payloads)
    pub(crate) fn party_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.raw[PARTY_RANGE]
    }

    pub fn party_count(&self) -> u8 {
        self.raw[offset::PARTY_COUNT]
    }

    pub fn trainer_name(&self) -> String {
        decode_name(&self.raw[offset::TRAINER_NAME..offset::TRAINER_NAME + NAME_SIZE])
    }

    pub fn species(&self, slot: usize) -> Result<u8, RecordError> {
        check_slot(slot)?;
        Ok(self.raw[offset::SPECIES + slot])
    }

    pub fn set_species(&mut self, slot: usize, species: u8) -> Result<(), RecordError> {
        check_slot(slot)?;
        self.raw[offset::SPECIES + slot] = species;
        Ok(())
    }

    pub fn payload(&self, slot: usize) -> Result<&[u8], RecordError> {
        check_slot(slot)?;
        Ok(&self.raw[payload_range(slot)])
    }

    pub fn payload_mut(&mut self, slot: usize) -> Result<&mut [u8], RecordError> {
        check_slot(slot)?;
        Ok(&mut self.raw[payload_range(slot)])
    }

    pub fn ot_name(&self, slot: usize) -> Result<&[u8], RecordError> {
        check_slot(slot)?;
        Ok(&self.raw[name_range(offset::OT_NAMES, slot)])
    }

    fn ot_name_mut(&mut self, slot: usize) -> Result<&mut [u8], RecordError> {
        check_slot(slot)?;
        Ok(&mut self.raw[name_range(offset::OT_NAMES, slot)])
    }

    pub fn nickname(&self, slot: usize) -> Result<&[u8], RecordError> {
        check_slot(slot)?;
        Ok(&self.raw[name_range(offset::NICKNAMES, slot)])
    }

    fn nickname_mut(&mut self, slot: usize) -> Result<&mut [u8], RecordError> {
        check_slot(slot)?;
        Ok(&mut self.raw[name_range(offset::NICKNAMES, slot)])
    }

    pub fn set_nickname(&mut self, slot: usize, name: &str) -> Result<(), RecordError> {
        let encoded = encode_name(name, MAX_NICKNAME_LEN)?;
        self.nickname_mut(slot)?.copy_from_slice(&encoded);
        Ok(())
    }

    pub fn set_ot_name(&mut self, slot: usize, name: &str) -> Result<(), RecordError> {
        let encoded = encode_name(name, MAX_TRAINER_NAME_LEN)?;
        self.ot_name_mut(slot)?.copy_from_slice(&encoded);
        Ok(())
    }

    /// Copy the partner's `slot` into our slot 0: species, payload, nickname
    /// and OT name. Nothing else in the block changes.
    ///
    /// `slot` is masked into range so this can run inside the link callback.
    pub(crate) fn take_member(&mut self, partner: &TradeBlock, slot: usize) {
        let slot = slot % PARTY_SIZE;
        self.raw[offset::SPECIES] = partner.raw[offset::SPECIES + slot];
        self.raw[payload_range(0)].copy_from_slice(&partner.raw[payload_range(slot)]);
        self.raw[name_range(offset::NICKNAMES, 0)]
            .copy_from_slice(&partner.raw[name_range(offset::NICKNAMES, slot)]);
        self.raw[name_range(offset::OT_NAMES, 0)]
            .copy_from_slice(&partner.raw[name_range(offset::OT_NAMES, slot)]);
    }

    /// Species in slot 0, what the trade screen shows
    pub(crate) fn lead_species(&self) -> u8 {
        self.raw[offset::SPECIES]
    }
}

impl Default for TradeBlock {
    /// The block a fresh session starts with: one (empty) party member
    /// owned by "Flipper".
    fn default() -> Self {
        let mut block = TradeBlock::zeroed();
        block.raw[offset::SPECIES..offset::PARTY].fill(NO_SPECIES);
        block.raw[offset::PARTY_COUNT] = 1;
        block.raw[offset::OT_NAMES..].fill(NAME_TERMINATOR);
        let name = encode_flipper();
        block.raw[offset::TRAINER_NAME..offset::TRAINER_NAME + NAME_SIZE].copy_from_slice(&name);
        block.raw[name_range(offset::OT_NAMES, 0)].copy_from_slice(&name);
        block
    }
}

impl std::fmt::Debug for TradeBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeBlock")
            .field("trainer", &self.trainer_name())
            .field("party_count", &self.party_count())
            .field("species", &&self.raw[offset::SPECIES..offset::PARTY])
            .finish_non_exhaustive()
    }
}

fn check_slot(slot: usize) -> Result<(), RecordError> {
    if slot < PARTY_SIZE {
        Ok(())
    } else {
        Err(RecordError::InvalidSlot(slot))
    }
}

fn payload_range(slot: usize) -> Range<usize> {
    let start = offset::PARTY + slot * MEMBER_PAYLOAD_SIZE;
    start..start + MEMBER_PAYLOAD_SIZE
}

fn name_range(base: usize, slot: usize) -> Range<usize> {
    let start = base + slot * NAME_SIZE;
    start..start + NAME_SIZE
}

fn encode_flipper() -> [u8; NAME_SIZE] {
    // "Flipper" only uses letters, so this cannot fail
    encode_name("Flipper", MAX_TRAINER_NAME_LEN).unwrap_or([NAME_TERMINATOR; NAME_SIZE])
}

/// Encode a name into the game's character set, padded with terminators.
pub fn encode_name(name: &str, max_len: usize) -> Result<[u8; NAME_SIZE], RecordError> {
    let len = name.chars().count();
    if len > max_len.min(NAME_SIZE - 1) {
        return Err(RecordError::NameTooLong { len, max: max_len });
    }

    let mut out = [NAME_TERMINATOR; NAME_SIZE];
    for (dst, c) in out.iter_mut().zip(name.chars()) {
        *dst = encode_char(c).ok_or(RecordError::UnsupportedChar(c))?;
    }
    Ok(out)
}

/// Decode a name buffer up to its first terminator. Unknown codes become `?`.
pub fn decode_name(buf: &[u8]) -> String {
    buf.iter()
        .take_while(|&&b| b != NAME_TERMINATOR)
        .map(|&b| decode_char(b).unwrap_or('?'))
        .collect()
}

fn encode_char(c: char) -> Option<u8> {
    let code = match c {
        'A'..='Z' => 0x80 + (c as u8 - b'A'),
        'a'..='z' => 0xA0 + (c as u8 - b'a'),
        '0'..='9' => 0xF6 + (c as u8 - b'0'),
        ' ' => 0x7F,
        '(' => 0x9A,
        ')' => 0x9B,
        ':' => 0x9C,
        ';' => 0x9D,
        '[' => 0x9E,
        ']' => 0x9F,
        '-' => 0xE3,
        '?' => 0xE6,
        '!' => 0xE7,
        '.' => 0xE8,
        '/' => 0xF3,
        ',' => 0xF4,
        _ => return None,
    };
    Some(code)
}

fn decode_char(b: u8) -> Option<char> {
    let c = match b {
        0x80..=0x99 => (b'A' + (b - 0x80)) as char,
        0xA0..=0xB9 => (b'a' + (b - 0xA0)) as char,
        0xF6..=0xFF => (b'0' + (b - 0xF6)) as char,
        0x7F => ' ',
        0x9A => '(',
        0x9B => ')',
        0x9C => ':',
        0x9D => ';',
        0x9E => '[',
        0x9F => ']',
        0xE3 => '-',
        0xE6 => '?',
        0xE7 => '!',
        0xE8 => '.',
        0xF3 => '/',
        0xF4 => ',',
        _ => return None,
    };
    Some(c)
}
