//! Coarse link status and the read-only view the UI polls.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::trade_block::NO_SPECIES;

/// Coarse state of the link, also what the trade screen draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum LinkStatus {
    /// Roles not negotiated yet
    #[default]
    Disconnected = 0,
    /// Link up, partner is in the link menu
    Connected = 1,
    /// Partner picked the trade centre
    Ready = 2,
    /// Block exchange in progress or done, waiting for a selection
    Waiting = 3,
    /// Partner offered a party member, waiting for accept / reject
    TradePending = 4,
    /// Trade accepted, partner is animating and will re-send its block
    Trading = 5,
    /// Battle link, every byte is echoed
    Colosseum = 6,
}

impl LinkStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        let status = match value {
            0 => LinkStatus::Disconnected,
            1 => LinkStatus::Connected,
            2 => LinkStatus::Ready,
            3 => LinkStatus::Waiting,
            4 => LinkStatus::TradePending,
            5 => LinkStatus::Trading,
            6 => LinkStatus::Colosseum,
            _ => return None,
        };
        Some(status)
    }

    /// Whether bytes in this status go to the link negotiation handler
    pub fn is_negotiating(self) -> bool {
        matches!(self, LinkStatus::Disconnected | LinkStatus::Connected)
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LinkStatus::Disconnected => "Connect GB",
            LinkStatus::Connected => "Connected!",
            LinkStatus::Ready => "READY",
            LinkStatus::Waiting => "WAITING",
            LinkStatus::TradePending => "DEAL?",
            LinkStatus::Trading => "TRADING",
            LinkStatus::Colosseum => "FIGHT!",
        };
        f.write_str(label)
    }
}

struct ViewInner {
    status: AtomicU8,
    species: AtomicU8,
}

/// Snapshot handle shared between the link callback and the UI.
///
/// The engine is the only writer. Readers on other threads see each field
/// atomically, which is all the trade screen needs to draw.
#[derive(Clone)]
pub struct TradeView {
    inner: Arc<ViewInner>,
}

impl TradeView {
    pub(crate) fn new(status: LinkStatus, species: u8) -> Self {
        TradeView {
            inner: Arc::new(ViewInner {
                status: AtomicU8::new(status as u8),
                species: AtomicU8::new(species),
            }),
        }
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.inner.status.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Species in the local slot 0
    pub fn species(&self) -> u8 {
        self.inner.species.load(Ordering::Acquire)
    }

    /// True when the local slot 0 is empty
    pub fn is_empty(&self) -> bool {
        self.species() == NO_SPECIES
    }

    pub(crate) fn publish_status(&self, status: LinkStatus) {
        self.inner.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn publish_species(&self, species: u8) {
        self.inner.species.store(species, Ordering::Release);
    }
}

impl std::fmt::Debug for TradeView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeView")
            .field("status", &self.status())
            .field("species", &self.species())
            .finish()
    }
}
