//! Trade centre exchange.
//!
//! Once the partner sits down at the trade table it sends, in order:
//!
//! 1. 10x [`PREAMBLE`], then 10 random seed bytes and 9x [`PREAMBLE`]
//! 2. its 415 byte trade block, while we send ours
//! 3. 3 trailer bytes and 6x [`PREAMBLE`], then 7 filler bytes and its
//!    patch list, while we send ours
//! 4. the party slot it offers, then accept or reject
//!
//! After an accepted trade the partner animates and starts over at step 1,
//! which re-syncs both blocks.
//!
//! Every reply is computed from the current state and the byte just
//! received. Bytes that do not fit a state are echoed back.

use crate::patch_list::{OutgoingBlock, PatchDecoder};
use crate::trade_block::{TradeBlock, TRADE_BLOCK_SIZE};
use crate::view::LinkStatus;
use crate::wire::{
    is_table_action, select_slot, selected_slot, BLANK, INTRO_PREAMBLE_LEN, PATCH_FILLER_LEN,
    PATCH_PHASE_LEN, PATCH_PREAMBLE_LEN, PREAMBLE, RANDOM_SEED_LEN, TABLE_LEAVE, TRADE_ACCEPT,
    TRADE_PREAMBLE_LEN, TRADE_REJECT,
};

/// Where the exchange currently is. Counters restart at zero in every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeState {
    #[default]
    Reset,
    /// Counting the intro preamble
    Init { preamble: u8 },
    /// Skipping the random seed and the trade preamble
    Random { count: u8 },
    /// Swapping trade blocks, `offset` is the next byte
    Data { offset: usize },
    /// Counting the preamble between block and patch list
    PatchHeader { preamble: u8 },
    /// Swapping patch lists
    PatchData { count: u8, decoder: PatchDecoder },
    /// Waiting for the partner to start choosing
    Select,
    /// Partner is choosing, `slot` is its latest offer
    Pending { slot: Option<u8> },
    /// Partner offered `slot`, waiting for accept / reject
    Confirmation { slot: u8 },
    /// Accepted, the swap happens on the next blank
    Done { slot: u8 },
}

impl TradeState {
    pub fn name(&self) -> &'static str {
        match self {
            TradeState::Reset => "reset",
            TradeState::Init { .. } => "init",
            TradeState::Random { .. } => "random",
            TradeState::Data { .. } => "data",
            TradeState::PatchHeader { .. } => "patch_header",
            TradeState::PatchData { .. } => "patch_data",
            TradeState::Select => "select",
            TradeState::Pending { .. } => "pending",
            TradeState::Confirmation { .. } => "confirmation",
            TradeState::Done { .. } => "done",
        }
    }
}

/// Everything a trade step reads or writes besides its own state
pub(crate) struct Link<'a> {
    pub status: &'a mut LinkStatus,
    pub local: &'a mut TradeBlock,
    pub incoming: &'a mut TradeBlock,
    pub outgoing: &'a OutgoingBlock,
    /// Set when a trade completed during this call
    pub traded: bool,
}

enum Step {
    Reply(u8),
    /// The state changed and wants to see the same byte again
    Redispatch,
}

/// Trade exchange state machine
#[derive(Debug, Clone, Default)]
pub(crate) struct TradeMachine {
    state: TradeState,
}

impl TradeMachine {
    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = TradeState::Reset;
    }

    pub fn respond(&mut self, link: &mut Link<'_>, in_byte: u8) -> u8 {
        // A transition re-dispatches at most once, so this is bounded
        match self.step(link, in_byte) {
            Step::Reply(byte) => byte,
            Step::Redispatch => match self.step(link, in_byte) {
                Step::Reply(byte) => byte,
                Step::Redispatch => in_byte,
            },
        }
    }

    fn step(&mut self, link: &mut Link<'_>, in_byte: u8) -> Step {
        let mut reply = in_byte;
        let state = self.state;

        self.state = match state {
            TradeState::Reset => {
                self.state = TradeState::Init { preamble: 0 };
                return Step::Redispatch;
            }

            TradeState::Init { mut preamble } => {
                if in_byte == PREAMBLE {
                    preamble += 1;
                    *link.status = LinkStatus::Waiting;
                } else if is_table_action(in_byte) {
                    // Partner is already acting at the table without a
                    // fresh exchange, make it leave and sit down again
                    reply = TABLE_LEAVE;
                    *link.status = LinkStatus::Ready;
                }
                if preamble >= INTRO_PREAMBLE_LEN {
                    TradeState::Random { count: 0 }
                } else {
                    TradeState::Init { preamble }
                }
            }

            TradeState::Random { count } => {
                let count = count + 1;
                if count >= RANDOM_SEED_LEN + TRADE_PREAMBLE_LEN {
                    TradeState::Data { offset: 0 }
                } else {
                    TradeState::Random { count }
                }
            }

            TradeState::Data { offset } => {
                if let Some(byte) = link.incoming.as_bytes_mut().get_mut(offset) {
                    *byte = in_byte;
                }
                reply = link.outgoing.byte_at(offset);
                let offset = offset + 1;
                if offset >= TRADE_BLOCK_SIZE {
                    TradeState::PatchHeader { preamble: 0 }
                } else {
                    TradeState::Data { offset }
                }
            }

            TradeState::PatchHeader { mut preamble } => {
                if in_byte == PREAMBLE {
                    preamble += 1;
                }
                if preamble >= PATCH_PREAMBLE_LEN {
                    self.state = TradeState::PatchData {
                        count: 0,
                        decoder: PatchDecoder::new(),
                    };
                    return Step::Redispatch;
                }
                TradeState::PatchHeader { preamble }
            }

            TradeState::PatchData { count, mut decoder } => {
                let count = count + 1;
                reply = if count > PATCH_FILLER_LEN {
                    link.outgoing
                        .patches()
                        .byte_at(usize::from(count - PATCH_FILLER_LEN - 1))
                } else {
                    BLANK
                };
                decoder.apply(in_byte, link.incoming.party_bytes_mut());
                if count >= PATCH_PHASE_LEN {
                    TradeState::Select
                } else {
                    TradeState::PatchData { count, decoder }
                }
            }

            TradeState::Select => {
                if in_byte == BLANK {
                    TradeState::Pending { slot: None }
                } else {
                    TradeState::Select
                }
            }

            TradeState::Pending { slot } => {
                if in_byte == TABLE_LEAVE {
                    reply = TABLE_LEAVE;
                    *link.status = LinkStatus::Ready;
                    TradeState::Reset
                } else if let Some(offered) = selected_slot(in_byte) {
                    // We always offer our first party member
                    reply = select_slot(0);
                    *link.status = LinkStatus::TradePending;
                    TradeState::Pending {
                        slot: Some(offered),
                    }
                } else if let (BLANK, Some(slot)) = (in_byte, slot) {
                    reply = BLANK;
                    TradeState::Confirmation { slot }
                } else {
                    TradeState::Pending { slot }
                }
            }

            TradeState::Confirmation { slot } => match in_byte {
                TRADE_REJECT => {
                    *link.status = LinkStatus::Waiting;
                    TradeState::Select
                }
                TRADE_ACCEPT => TradeState::Done { slot },
                _ => TradeState::Confirmation { slot },
            },

            TradeState::Done { slot } => {
                if in_byte == BLANK {
                    link.local.take_member(link.incoming, usize::from(slot));
                    link.traded = true;
                    *link.status = LinkStatus::Trading;
                    TradeState::Reset
                } else {
                    TradeState::Done { slot }
                }
            }
        };

        Step::Reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade_block::{MEMBER_PAYLOAD_SIZE, PARTY_RANGE};
    use crate::wire::NO_DATA_BYTE;

    struct Harness {
        machine: TradeMachine,
        status: LinkStatus,
        local: TradeBlock,
        incoming: TradeBlock,
        outgoing: OutgoingBlock,
        traded: bool,
    }

    impl Harness {
        fn new(local: TradeBlock) -> Self {
            let outgoing = OutgoingBlock::build(&local);
            Harness {
                machine: TradeMachine::default(),
                status: LinkStatus::Ready,
                local,
                incoming: TradeBlock::zeroed(),
                outgoing,
                traded: false,
            }
        }

        fn send(&mut self, in_byte: u8) -> u8 {
            let mut link = Link {
                status: &mut self.status,
                local: &mut self.local,
                incoming: &mut self.incoming,
                outgoing: &self.outgoing,
                traded: false,
            };
            let reply = self.machine.respond(&mut link, in_byte);
            self.traded |= link.traded;
            reply
        }

        fn send_all(&mut self, bytes: &[u8]) -> Vec<u8> {
            bytes.iter().map(|&b| self.send(b)).collect()
        }

        /// Drive from `reset` up to the start of the block data
        fn preamble(&mut self) {
            self.send_all(&[PREAMBLE; 10]);
            self.send_all(&[0x5A; 10]);
            self.send_all(&[PREAMBLE; 9]);
        }
    }

    fn partner_block() -> TradeBlock {
        let mut block =
            TradeBlock::single("Gary", 0x24, &[0x33; MEMBER_PAYLOAD_SIZE], "PIDGEY").unwrap();
        block.set_species(1, 0xB0).unwrap();
        block.payload_mut(1).unwrap().fill(0x44);
        block.set_nickname(1, "CHARMANDER").unwrap();
        block
    }

    #[test]
    fn test_preamble_reaches_data() {
        let mut h = Harness::new(TradeBlock::default());
        h.send_all(&[PREAMBLE; 9]);
        assert_eq!(h.machine.state(), TradeState::Init { preamble: 9 });
        assert_eq!(h.status, LinkStatus::Waiting);

        h.send(PREAMBLE);
        assert_eq!(h.machine.state(), TradeState::Random { count: 0 });

        h.send_all(&[0x12; 18]);
        assert_eq!(h.machine.state(), TradeState::Random { count: 18 });
        h.send(PREAMBLE);
        assert_eq!(h.machine.state(), TradeState::Data { offset: 0 });
    }

    #[test]
    fn test_noise_before_preamble_is_echoed() {
        let mut h = Harness::new(TradeBlock::default());
        assert_eq!(h.send_all(&[BLANK, 0x11, BLANK]), vec![BLANK, 0x11, BLANK]);
        assert_eq!(h.machine.state(), TradeState::Init { preamble: 0 });
    }

    #[test]
    fn test_table_action_during_init_asks_partner_to_leave() {
        let mut h = Harness::new(TradeBlock::default());
        h.status = LinkStatus::Waiting;
        assert_eq!(h.send(select_slot(2)), TABLE_LEAVE);
        assert_eq!(h.status, LinkStatus::Ready);
        assert_eq!(h.machine.state(), TradeState::Init { preamble: 0 });
    }

    #[test]
    fn test_block_exchange_and_patch_list() {
        let mut local = TradeBlock::default();
        local.payload_mut(0).unwrap()[0] = NO_DATA_BYTE;
        let mut h = Harness::new(local);

        let mut partner = partner_block();
        partner.payload_mut(0).unwrap()[3] = NO_DATA_BYTE;
        let partner_out = OutgoingBlock::build(&partner);

        h.preamble();
        let replies = h.send_all(partner_out.as_bytes());
        assert_eq!(&replies[..], &h.outgoing.as_bytes()[..]);
        assert_eq!(replies[PARTY_RANGE.start], 0xFF);
        assert_eq!(h.machine.state(), TradeState::PatchHeader { preamble: 0 });

        // Trailer, then 6 preambles; the last one falls straight into the patch data
        h.send_all(&[0xDF, 0xFE, 0x15]);
        h.send_all(&[PREAMBLE; 5]);
        assert_eq!(h.send(PREAMBLE), BLANK);
        assert!(matches!(h.machine.state(), TradeState::PatchData { count: 1, .. }));

        // 7 filler bytes, then our list goes out while theirs comes in
        let mut replies = h.send_all(&[BLANK; 6]);
        assert!(replies.iter().all(|&b| b == BLANK));
        let mut stream = partner_out.patches().as_bytes().to_vec();
        stream.resize(196 - 7, 0);
        replies = h.send_all(&stream);
        assert_eq!(&replies[..3], &[0x01, 0xFF, 0xFF]);
        assert!(replies[3..].iter().all(|&b| b == 0));
        assert_eq!(h.machine.state(), TradeState::Select);

        assert_eq!(h.incoming, partner);
    }

    #[test]
    fn test_selection_reject_then_accept_swaps() {
        let mut h = Harness::new(TradeBlock::default());
        h.incoming = partner_block();
        h.status = LinkStatus::Waiting;
        h.machine.state = TradeState::Select;

        h.send(BLANK);
        assert_eq!(h.machine.state(), TradeState::Pending { slot: None });
        // A blank without an offer keeps waiting
        assert_eq!(h.send(BLANK), BLANK);
        assert_eq!(h.machine.state(), TradeState::Pending { slot: None });

        assert_eq!(h.send(select_slot(1)), select_slot(0));
        assert_eq!(h.status, LinkStatus::TradePending);
        assert_eq!(h.send(BLANK), BLANK);
        assert_eq!(h.machine.state(), TradeState::Confirmation { slot: 1 });

        h.send(TRADE_REJECT);
        assert_eq!(h.machine.state(), TradeState::Select);
        assert_eq!(h.status, LinkStatus::Waiting);

        h.send_all(&[BLANK, select_slot(1), BLANK, TRADE_ACCEPT]);
        assert_eq!(h.machine.state(), TradeState::Done { slot: 1 });
        assert!(!h.traded);
        h.send(TRADE_ACCEPT);
        h.send(BLANK);

        assert!(h.traded);
        assert_eq!(h.status, LinkStatus::Trading);
        assert_eq!(h.machine.state(), TradeState::Reset);
        assert_eq!(h.local.species(0).unwrap(), 0xB0);
        assert_eq!(h.local.payload(0).unwrap(), &[0x44; MEMBER_PAYLOAD_SIZE][..]);
        assert_eq!(h.local.trainer_name(), "Flipper");
    }

    #[test]
    fn test_leave_table_while_pending() {
        let mut h = Harness::new(TradeBlock::default());
        h.status = LinkStatus::TradePending;
        h.machine.state = TradeState::Pending { slot: Some(3) };

        assert_eq!(h.send(TABLE_LEAVE), TABLE_LEAVE);
        assert_eq!(h.status, LinkStatus::Ready);
        assert_eq!(h.machine.state(), TradeState::Reset);
    }
}
