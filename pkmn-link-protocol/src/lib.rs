//! # Pokémon link protocol
//!
//! Follower side of the Game Boy link cable protocol used by the Gen I
//! games to trade Pokémon. The partner drives the clock; we get one call per
//! received byte and must return the byte to shift out next.
//!
//! ## Phases
//!
//! | Status | Handler | What happens |
//! |--------|---------|--------------|
//! | Disconnected | negotiation | `0x01` leader / `0x02` follower, then `0x60` connected |
//! | Connected | negotiation | link menu bytes are mirrored until a selection |
//! | Colosseum | passthrough | every byte echoed until `0xD6` break link |
//! | Ready .. Trading | trade | preamble, 415 byte block, patch list, selection |
//!
//! ## Usage
//!
//! ```
//! use pkmn_link_protocol::{LinkStatus, TradeBlock, TradeEngine};
//!
//! let mut engine = TradeEngine::new(TradeBlock::default());
//! assert_eq!(engine.on_byte_received(0x01), 0x02);
//! assert_eq!(engine.on_byte_received(0x60), 0x60);
//! assert_eq!(engine.status(), LinkStatus::Connected);
//!
//! // Outside the byte callback
//! if engine.rebuild_pending() {
//!     engine.run_deferred_rebuild();
//! }
//! ```

mod engine;
mod negotiation;
mod patch_list;
mod trade;
mod trade_block;
mod view;
pub mod wire;

pub use engine::TradeEngine;
pub use patch_list::{OutgoingBlock, PatchDecoder, PatchList, PART_BOUNDARY, SUBSTITUTE_BYTE};
pub use trade::TradeState;
pub use trade_block::{
    decode_name, encode_name, RecordError, TradeBlock, MAX_NICKNAME_LEN, MAX_TRAINER_NAME_LEN,
    MEMBER_PAYLOAD_SIZE, NAME_SIZE, NO_SPECIES, PARTY_RANGE, PARTY_SIZE, TRADE_BLOCK_SIZE,
};
pub use view::{LinkStatus, TradeView};
