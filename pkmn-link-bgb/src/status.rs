//! Periodic status line for the operator, fed from the engine's view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use pkmn_link_protocol::{LinkStatus, TradeView};
use tracing::info;

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Last values reported, so only changes are printed
#[derive(Debug, Default, PartialEq, Eq)]
struct Snapshot {
    status: LinkStatus,
    species: u8,
}

impl Snapshot {
    fn take(view: &TradeView) -> Self {
        Snapshot {
            status: view.status(),
            species: view.species(),
        }
    }
}

/// Start a thread that logs status and species changes until `shutdown`
/// is set.
pub fn spawn_reporter(view: TradeView, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last = Snapshot::take(&view);
        info!("{}, offering species 0x{:02X}", last.status, last.species);

        while !shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(POLL_INTERVAL);
            let now = Snapshot::take(&view);
            if now != last {
                if now.species != last.species {
                    info!("now offering species 0x{:02X}", now.species);
                }
                if now.status != last.status {
                    info!("{}", now.status);
                }
                last = now;
            }
        }
    })
}
