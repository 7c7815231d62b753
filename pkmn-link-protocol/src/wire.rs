//! Byte values with a fixed meaning on the link.

pub use crate::patch_list::{NO_DATA_BYTE, PART_TERMINATOR};

/// Idle / filler byte
pub const BLANK: u8 = 0x00;

/// Sent by the unit that drives the clock while roles are negotiated
pub const LEADER: u8 = 0x01;
/// Our answer to [`LEADER`]
pub const FOLLOWER: u8 = 0x02;

/// Echoed by both sides once the link is up
pub const CONNECTED: u8 = 0x60;

/// Link menu selections
pub const TRADE_CENTRE_SELECTED: u8 = 0xD4;
pub const COLOSSEUM_SELECTED: u8 = 0xD5;
pub const BREAK_LINK: u8 = 0xD6;

/// Marks phase boundaries during the block exchange
pub const PREAMBLE: u8 = 0xFD;

/// Trade table bytes
pub const SELECT_MASK: u8 = 0x60;
pub const TRADE_REJECT: u8 = 0x61;
pub const TRADE_ACCEPT: u8 = 0x62;
pub const TABLE_LEAVE: u8 = 0x6F;

/// Preamble bytes that open a block exchange
pub const INTRO_PREAMBLE_LEN: u8 = 10;
/// Random seed bytes that follow the intro preamble
pub const RANDOM_SEED_LEN: u8 = 10;
/// Preamble bytes between the random seed and the trade block
pub const TRADE_PREAMBLE_LEN: u8 = 9;
/// Preamble bytes that separate the block from the patch list
pub const PATCH_PREAMBLE_LEN: u8 = 6;
/// Filler bytes at the start of the patch phase
pub const PATCH_FILLER_LEN: u8 = 7;
/// Bytes counted through the patch phase
pub const PATCH_PHASE_LEN: u8 = 196;

/// Selection byte for a party slot
pub const fn select_slot(slot: u8) -> u8 {
    SELECT_MASK | slot
}

/// Party slot named by a selection byte, if it is one
pub const fn selected_slot(byte: u8) -> Option<u8> {
    match byte {
        0x60..=0x65 => Some(byte & 0x0F),
        _ => None,
    }
}

/// Bytes the partner may send at the trade table before the exchange
/// starts that mean it is already past the table.
pub const fn is_table_action(byte: u8) -> bool {
    byte & SELECT_MASK == SELECT_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_bytes() {
        assert_eq!(select_slot(0), 0x60);
        assert_eq!(selected_slot(0x63), Some(3));
        assert_eq!(selected_slot(0x65), Some(5));
        assert_eq!(selected_slot(0x66), None);
        assert_eq!(selected_slot(TABLE_LEAVE), None);
        assert_eq!(selected_slot(BLANK), None);
    }

    #[test]
    fn test_table_action() {
        assert!(is_table_action(TABLE_LEAVE));
        assert!(is_table_action(TRADE_ACCEPT));
        assert!(!is_table_action(TRADE_CENTRE_SELECTED));
        assert!(!is_table_action(BLANK));
    }
}
