//! Drives a [`TradeEngine`] from BGB link packets.
//!
//! The emulator is the leader and clocks every transfer with SYNC1. We are
//! the externally clocked side: the byte we shift out must be ready before
//! the transfer, so each SYNC2 carries the engine's reply to the previous
//! byte and the reply to this one is kept for the next transfer.

use pkmn_link_protocol::wire::{LEADER, NO_DATA_BYTE};
use pkmn_link_protocol::{LinkStatus, TradeEngine, TradeState};
use tracing::{debug, info, trace, warn};

use crate::bgb::{status, BgbError, Packet, PROTOCOL_VERSION};
use crate::logger::LINK_BYTES_TARGET;
use crate::socket::LinkConnection;

/// Why a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer said goodbye or closed the socket
    Disconnected,
    /// A trade completed and the session was asked to stop after one
    Traded,
}

pub struct LinkSession<'a> {
    conn: LinkConnection,
    engine: &'a mut TradeEngine,
    /// Shifted out on the next transfer
    prepared: u8,
    last_sync3: Option<u32>,
    stop_after_trade: bool,
    trades: u32,
}

impl<'a> LinkSession<'a> {
    pub fn new(conn: LinkConnection, engine: &'a mut TradeEngine, stop_after_trade: bool) -> Self {
        LinkSession {
            conn,
            engine,
            prepared: NO_DATA_BYTE,
            last_sync3: None,
            stop_after_trade,
            trades: 0,
        }
    }

    /// Number of trades completed in this session
    pub fn trades(&self) -> u32 {
        self.trades
    }

    /// Exchange VERSION, then announce that we are running.
    fn handshake(&mut self) -> Result<(), BgbError> {
        debug!("-> VERSION {:?}", PROTOCOL_VERSION);
        self.conn.send(&Packet::version())?;

        match self.conn.recv()? {
            Packet::Version {
                major,
                minor,
                patch,
            } => {
                debug!("<- VERSION {}.{}.{}", major, minor, patch);
                if (major, minor) != (PROTOCOL_VERSION.0, PROTOCOL_VERSION.1) {
                    return Err(BgbError::VersionMismatch(major, minor, patch));
                }
            }
            other => return Err(BgbError::UnexpectedPacket(other)),
        }

        self.conn.send(&Packet::running())?;
        Ok(())
    }

    /// Handshake, then serve transfers until the peer leaves.
    ///
    /// The engine is reset first so every connection starts a fresh link.
    pub fn run(&mut self) -> Result<SessionEnd, BgbError> {
        self.engine.reset();
        self.handshake()?;
        info!(peer = self.conn.peer(), "link established");

        loop {
            let packet = match self.conn.recv() {
                Ok(packet) => packet,
                Err(BgbError::UnknownCommand(command)) => {
                    trace!("ignoring unknown command {}", command);
                    continue;
                }
                Err(BgbError::ConnectionClosed) => return Ok(SessionEnd::Disconnected),
                Err(e) => return Err(e),
            };

            let traded = self.handle_packet(packet)?;

            // Heavy work happens here, between transfers
            self.engine.run_deferred_rebuild();

            if traded {
                self.trades += 1;
                if self.stop_after_trade {
                    self.say_goodbye();
                    return Ok(SessionEnd::Traded);
                }
            }
            if packet == Packet::WantDisconnect {
                return Ok(SessionEnd::Disconnected);
            }
        }
    }

    /// Best effort: the session is over whether or not the peer hears it.
    fn say_goodbye(&mut self) {
        if let Err(e) = self.conn.send(&Packet::WantDisconnect) {
            debug!("-> WANTDISCONNECT failed: {}", e);
        }
        if let Err(e) = self.conn.shutdown() {
            debug!("socket shutdown failed: {}", e);
        }
    }

    /// A leader byte at the trade table means the partner went back to the
    /// link menu. The trade machine would echo it forever, so start over.
    fn renegotiation_requested(&self, data: u8) -> bool {
        let status = self.engine.status();
        data == LEADER
            && !status.is_negotiating()
            && status != LinkStatus::Colosseum
            && matches!(
                self.engine.trade_state(),
                TradeState::Reset | TradeState::Init { .. }
            )
    }

    /// Feed one transferred byte to the engine and log what changed.
    /// Returns true when a trade just completed.
    fn transfer(&mut self, data: u8) -> bool {
        if self.renegotiation_requested(data) {
            debug!(status = ?self.engine.status(), "partner is negotiating again");
            self.engine.reset();
        }

        let status = self.engine.status();
        let state = self.engine.trade_state().name();
        self.prepared = self.engine.on_byte_received(data);

        if self.engine.status() != status {
            debug!(from = ?status, to = ?self.engine.status(), "link status");
        }
        let next = self.engine.trade_state().name();
        if next != state {
            trace!(from = state, to = next, "trade state");
        }
        match self.engine.take_completed_trade() {
            Some(species) => {
                info!(species, "trade completed");
                true
            }
            None => false,
        }
    }

    /// Handle one packet; returns true when a trade just completed.
    fn handle_packet(&mut self, packet: Packet) -> Result<bool, BgbError> {
        match packet {
            Packet::Sync1 { data, .. } => {
                let sent = self.prepared;
                self.conn.send(&Packet::reply(sent))?;
                trace!(target: LINK_BYTES_TARGET, "<- {:02X} -> {:02X}", data, sent);
                return Ok(self.transfer(data));
            }
            Packet::Sync3 { ack: false, timestamp } => {
                // Echo each timestamp once, echoing echoes would ping-pong
                if self.last_sync3 != Some(timestamp) {
                    self.last_sync3 = Some(timestamp);
                    self.conn.send(&Packet::Sync3 {
                        ack: false,
                        timestamp,
                    })?;
                }
            }
            Packet::Sync3 { ack: true, .. } => trace!("<- SYNC3 ack"),
            Packet::Status { flags } => {
                debug!(
                    running = flags & status::RUNNING != 0,
                    paused = flags & status::PAUSED != 0,
                    reconnect = flags & status::SUPPORT_RECONNECT != 0,
                    "<- STATUS"
                );
            }
            Packet::Version { .. } => trace!("late VERSION packet"),
            Packet::Joypad { .. } => {}
            Packet::Sync2 { .. } => warn!("<- SYNC2 without a transfer of ours"),
            Packet::WantDisconnect => debug!("<- WANTDISCONNECT"),
        }
        Ok(false)
    }
}
