//! The entry point the link transport calls once per received byte.

use tracing::debug;

use crate::negotiation;
use crate::patch_list::OutgoingBlock;
use crate::trade::{Link, TradeMachine, TradeState};
use crate::trade_block::TradeBlock;
use crate::view::{LinkStatus, TradeView};

/// Follower side of the link for one trade session.
///
/// The transport calls [`TradeEngine::on_byte_received`] from its byte
/// callback and transmits the returned byte. That call never blocks or
/// allocates. Work that is too heavy for the callback is flagged instead and
/// must be run by the host through [`TradeEngine::run_deferred_rebuild`].
pub struct TradeEngine {
    status: LinkStatus,
    trade: TradeMachine,
    /// Owned by the application, only changed here when a trade completes
    local: TradeBlock,
    /// Partner's block, overwritten by every exchange
    incoming: TradeBlock,
    /// Cached wire encoding of `local`
    outgoing: OutgoingBlock,
    rebuild_pending: bool,
    completed_trade: Option<u8>,
    view: TradeView,
}

impl TradeEngine {
    /// Start a session for `local`, disconnected and at the start of the
    /// trade exchange.
    pub fn new(local: TradeBlock) -> Self {
        let outgoing = OutgoingBlock::build(&local);
        let view = TradeView::new(LinkStatus::Disconnected, local.lead_species());
        TradeEngine {
            status: LinkStatus::Disconnected,
            trade: TradeMachine::default(),
            local,
            incoming: TradeBlock::zeroed(),
            outgoing,
            rebuild_pending: false,
            completed_trade: None,
            view,
        }
    }

    /// Handle one byte from the partner and return the byte to send next.
    ///
    /// Nothing is logged from here; hosts read [`TradeEngine::status`] and
    /// [`TradeEngine::take_completed_trade`] after the call.
    pub fn on_byte_received(&mut self, in_byte: u8) -> u8 {
        let before = self.status;

        let reply = if self.status.is_negotiating() {
            let reply = negotiation::respond(&mut self.status, in_byte);
            if self.status == LinkStatus::Ready {
                self.trade.reset();
            }
            reply
        } else if self.status == LinkStatus::Colosseum {
            negotiation::passthrough(&mut self.status, in_byte)
        } else {
            let mut link = Link {
                status: &mut self.status,
                local: &mut self.local,
                incoming: &mut self.incoming,
                outgoing: &self.outgoing,
                traded: false,
            };
            let reply = self.trade.respond(&mut link, in_byte);
            if link.traded {
                self.rebuild_pending = true;
                self.completed_trade = Some(self.local.lead_species());
                self.view.publish_species(self.local.lead_species());
            }
            reply
        };

        if self.status != before {
            self.view.publish_status(self.status);
        }
        reply
    }

    /// Species received by the last completed trade, if one completed since
    /// the previous call
    pub fn take_completed_trade(&mut self) -> Option<u8> {
        self.completed_trade.take()
    }

    /// Back to a fresh session: disconnected, exchange reset.
    ///
    /// Any pending rebuild is dropped and the outgoing encoding is rebuilt
    /// right away.
    pub fn reset(&mut self) {
        debug!(from = ?self.status, "engine reset");
        self.status = LinkStatus::Disconnected;
        self.trade.reset();
        self.completed_trade = None;
        self.rebuild_now();
        self.view.publish_status(self.status);
    }

    /// The trade screen was left and entered again within the same session.
    ///
    /// A negotiated link survives this, but the partner has to sit down at
    /// the table again: anything past [`LinkStatus::Ready`] drops back to it
    /// and a battle link drops to disconnected.
    pub fn reenter(&mut self) {
        debug!(from = ?self.status, "trade screen re-entered");
        self.status = match self.status {
            LinkStatus::Colosseum => LinkStatus::Disconnected,
            status if status > LinkStatus::Ready => LinkStatus::Ready,
            status => status,
        };
        self.trade.reset();
        self.rebuild_now();
        self.view.publish_status(self.status);
    }

    /// True when [`TradeEngine::run_deferred_rebuild`] has work to do
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Re-encode the local block after it changed. Call this outside the
    /// byte callback whenever [`TradeEngine::rebuild_pending`] is set, and
    /// before the partner starts its next block exchange.
    ///
    /// Returns whether a rebuild ran.
    pub fn run_deferred_rebuild(&mut self) -> bool {
        if !self.rebuild_pending {
            return false;
        }
        self.rebuild_now();
        debug!(
            patches = self.outgoing.patches().as_bytes().len().saturating_sub(2),
            "outgoing block rebuilt"
        );
        true
    }

    fn rebuild_now(&mut self) {
        self.outgoing = OutgoingBlock::build(&self.local);
        self.rebuild_pending = false;
        self.view.publish_species(self.local.lead_species());
    }

    /// Replace the local block, e.g. after the user edited it. The new
    /// encoding is built on the next deferred rebuild.
    pub fn set_local_block(&mut self, block: TradeBlock) {
        self.local = block;
        self.rebuild_pending = true;
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn trade_state(&self) -> TradeState {
        self.trade.state()
    }

    pub fn local_block(&self) -> &TradeBlock {
        &self.local
    }

    pub fn incoming_block(&self) -> &TradeBlock {
        &self.incoming
    }

    pub fn outgoing_block(&self) -> &OutgoingBlock {
        &self.outgoing
    }

    /// Hand the local block back to the application
    pub fn into_local_block(self) -> TradeBlock {
        self.local
    }

    /// Handle for the UI thread
    pub fn view(&self) -> TradeView {
        self.view.clone()
    }
}

impl Default for TradeEngine {
    fn default() -> Self {
        Self::new(TradeBlock::default())
    }
}

impl std::fmt::Debug for TradeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeEngine")
            .field("status", &self.status)
            .field("trade", &self.trade.state())
            .field("rebuild_pending", &self.rebuild_pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade_block::MEMBER_PAYLOAD_SIZE;
    use crate::wire::*;
    use proptest::prelude::*;

    fn engine() -> TradeEngine {
        let block = TradeBlock::single("Ash", 0x15, &[0x07; MEMBER_PAYLOAD_SIZE], "MEW").unwrap();
        TradeEngine::new(block)
    }

    fn connect(engine: &mut TradeEngine) {
        for byte in [LEADER, BLANK, CONNECTED, CONNECTED, BLANK, 0xD0, TRADE_CENTRE_SELECTED] {
            engine.on_byte_received(byte);
        }
    }

    #[test]
    fn test_new_engine_is_disconnected() {
        let engine = engine();
        assert_eq!(engine.status(), LinkStatus::Disconnected);
        assert_eq!(engine.trade_state(), TradeState::Reset);
        assert!(!engine.rebuild_pending());
        assert_eq!(engine.view().species(), 0x15);
    }

    #[test]
    fn test_connect_reaches_ready() {
        let mut engine = engine();
        let view = engine.view();
        connect(&mut engine);
        assert_eq!(engine.status(), LinkStatus::Ready);
        assert_eq!(view.status(), LinkStatus::Ready);
        assert_eq!(engine.trade_state(), TradeState::Reset);
    }

    #[test]
    fn test_trade_bytes_dispatch_to_exchange() {
        let mut engine = engine();
        connect(&mut engine);
        engine.on_byte_received(PREAMBLE);
        assert_eq!(engine.status(), LinkStatus::Waiting);
        assert_eq!(engine.trade_state(), TradeState::Init { preamble: 1 });
    }

    #[test]
    fn test_colosseum_echoes() {
        let mut engine = engine();
        for byte in [LEADER, CONNECTED, COLOSSEUM_SELECTED] {
            engine.on_byte_received(byte);
        }
        assert_eq!(engine.status(), LinkStatus::Colosseum);
        for byte in [PREAMBLE, 0x33, LEADER, TABLE_LEAVE] {
            assert_eq!(engine.on_byte_received(byte), byte);
        }
        assert_eq!(engine.status(), LinkStatus::Colosseum);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut engine = engine();
        connect(&mut engine);
        engine.on_byte_received(PREAMBLE);

        engine.reset();
        let once = format!("{:?}", engine);
        let outgoing = engine.outgoing_block().clone();
        engine.reset();

        assert_eq!(format!("{:?}", engine), once);
        assert_eq!(engine.outgoing_block(), &outgoing);
        assert_eq!(engine.status(), LinkStatus::Disconnected);
        assert_eq!(engine.trade_state(), TradeState::Reset);
    }

    #[test]
    fn test_reenter_keeps_link() {
        let mut engine = engine();
        connect(&mut engine);
        engine.on_byte_received(PREAMBLE);
        assert_eq!(engine.status(), LinkStatus::Waiting);

        engine.reenter();
        assert_eq!(engine.status(), LinkStatus::Ready);
        assert_eq!(engine.trade_state(), TradeState::Reset);

        let mut engine = self::engine();
        for byte in [LEADER, CONNECTED, COLOSSEUM_SELECTED] {
            engine.on_byte_received(byte);
        }
        engine.reenter();
        assert_eq!(engine.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_set_local_block_defers_rebuild() {
        let mut engine = engine();
        let mut block = engine.local_block().clone();
        block.payload_mut(0).unwrap()[0] = NO_DATA_BYTE;
        engine.set_local_block(block);

        assert!(engine.rebuild_pending());
        assert_eq!(engine.outgoing_block().patches().part1(), &[0xFF]);

        assert!(engine.run_deferred_rebuild());
        assert!(!engine.rebuild_pending());
        assert_eq!(engine.outgoing_block().patches().part1(), &[0x01, 0xFF]);
        assert!(!engine.run_deferred_rebuild());
    }

    #[test]
    fn test_reset_cancels_pending_rebuild() {
        let mut engine = engine();
        let mut block = engine.local_block().clone();
        block.payload_mut(0).unwrap()[1] = NO_DATA_BYTE;
        engine.set_local_block(block);

        engine.reset();
        assert!(!engine.rebuild_pending());
        assert_eq!(engine.outgoing_block().patches().part1(), &[0x02, 0xFF]);
    }

    #[test]
    fn test_negotiating_statuses_dispatch_to_negotiation() {
        let mut engine = engine();
        assert!(engine.status().is_negotiating());
        // A preamble is a protocol break before the link is up
        assert_eq!(engine.on_byte_received(PREAMBLE), BREAK_LINK);
        assert_eq!(engine.trade_state(), TradeState::Reset);

        engine.on_byte_received(CONNECTED);
        assert!(engine.status().is_negotiating());
        assert_eq!(engine.on_byte_received(0xD1), 0xD1);
        assert_eq!(engine.trade_state(), TradeState::Reset);
    }

    #[test]
    fn test_completed_trade_is_reported_once() {
        let mut engine = engine();
        let mut partner = TradeBlock::default();
        partner.set_species(1, 0xB0).unwrap();
        connect(&mut engine);

        let outgoing = OutgoingBlock::build(&partner);
        for byte in [PREAMBLE; 10].into_iter().chain([0x01; 19]) {
            engine.on_byte_received(byte);
        }
        for &byte in outgoing.as_bytes().iter() {
            engine.on_byte_received(byte);
        }
        for byte in [PREAMBLE; 6].into_iter().chain([BLANK; 196]) {
            engine.on_byte_received(byte);
        }
        assert_eq!(engine.take_completed_trade(), None);

        for byte in [select_slot(1), BLANK, TRADE_ACCEPT, BLANK] {
            engine.on_byte_received(byte);
        }
        assert_eq!(engine.status(), LinkStatus::Trading);
        assert_eq!(engine.take_completed_trade(), Some(0xB0));
        assert_eq!(engine.take_completed_trade(), None);
        assert!(engine.run_deferred_rebuild());
    }

    fn feed(engine: &mut TradeEngine, bytes: &[u8]) {
        for &byte in bytes {
            engine.on_byte_received(byte);
            if engine.rebuild_pending() {
                engine.run_deferred_rebuild();
            }
        }
    }

    proptest! {
        #[test]
        fn prop_arbitrary_bytes_from_disconnected(
            bytes in proptest::collection::vec(any::<u8>(), 0..3000)
        ) {
            let mut engine = engine();
            feed(&mut engine, &bytes);
            prop_assert!(!engine.rebuild_pending());
        }

        #[test]
        fn prop_arbitrary_bytes_from_ready(
            bytes in proptest::collection::vec(
                prop_oneof![
                    Just(PREAMBLE),
                    Just(BLANK),
                    Just(NO_DATA_BYTE),
                    0x60u8..=0x6F,
                    any::<u8>(),
                ],
                0..3000,
            )
        ) {
            let mut engine = engine();
            connect(&mut engine);
            feed(&mut engine, &bytes);
            prop_assert!(!engine.rebuild_pending());
        }
    }
}
