//! Role negotiation and the link menu.
//!
//! The partner drives the clock, so it announces itself with [`LEADER`] and
//! we always answer [`FOLLOWER`]. Once it starts sending [`CONNECTED`] the
//! link is up and we mirror whatever it highlights in the link menu until it
//! actually picks an entry.

use crate::view::LinkStatus;
use crate::wire::{
    BLANK, BREAK_LINK, COLOSSEUM_SELECTED, CONNECTED, FOLLOWER, LEADER, TRADE_CENTRE_SELECTED,
};

/// Reply to `in_byte` and update `status`.
///
/// Only meaningful while `status` is [`LinkStatus::Disconnected`] or
/// [`LinkStatus::Connected`]; any other status is left alone and echoed.
pub(crate) fn respond(status: &mut LinkStatus, in_byte: u8) -> u8 {
    match *status {
        LinkStatus::Disconnected => connect_response(status, in_byte),
        LinkStatus::Connected => menu_response(status, in_byte),
        _ => in_byte,
    }
}

fn connect_response(status: &mut LinkStatus, in_byte: u8) -> u8 {
    match in_byte {
        CONNECTED => {
            *status = LinkStatus::Connected;
            CONNECTED
        }
        LEADER => FOLLOWER,
        BLANK => BLANK,
        _ => {
            *status = LinkStatus::Disconnected;
            BREAK_LINK
        }
    }
}

fn menu_response(status: &mut LinkStatus, in_byte: u8) -> u8 {
    match in_byte {
        CONNECTED => CONNECTED,
        TRADE_CENTRE_SELECTED => {
            *status = LinkStatus::Ready;
            BLANK
        }
        COLOSSEUM_SELECTED => {
            *status = LinkStatus::Colosseum;
            BLANK
        }
        BREAK_LINK | LEADER => {
            *status = LinkStatus::Disconnected;
            BREAK_LINK
        }
        // Highlighted menu entries and filler are mirrored back
        other => other,
    }
}

/// Battle link: echo everything until the partner breaks the link.
pub(crate) fn passthrough(status: &mut LinkStatus, in_byte: u8) -> u8 {
    if in_byte == BREAK_LINK {
        *status = LinkStatus::Disconnected;
    }
    in_byte
}
