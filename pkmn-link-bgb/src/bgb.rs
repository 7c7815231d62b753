//! Packet types and encoding/decoding for the BGB 1.4 link cable protocol.
//!
//! Every packet is 8 bytes: `[b1 b2 b3 b4 i1:u32-LE]`, `b1` being the
//! command. See <https://bgb.bircd.org/bgblink.html>.

use std::io::{Read, Write};

use thiserror::Error;

/// Protocol version we speak, sent in the VERSION packet
pub const PROTOCOL_VERSION: (u8, u8, u8) = (1, 4, 0);

/// Size of every packet on the wire
pub const PACKET_SIZE: usize = 8;

/// Command constants
mod cmd {
    pub const VERSION: u8 = 1;
    pub const JOYPAD: u8 = 101;
    pub const SYNC1: u8 = 104;
    pub const SYNC2: u8 = 105;
    pub const SYNC3: u8 = 106;
    pub const STATUS: u8 = 108;
    pub const WANTDISCONNECT: u8 = 109;
}

/// STATUS flags
pub mod status {
    pub const RUNNING: u8 = 0x01;
    pub const PAUSED: u8 = 0x02;
    pub const SUPPORT_RECONNECT: u8 = 0x04;
}

/// SYNC2 control byte for a passive (externally clocked) reply
const SYNC2_CONTROL: u8 = 0x80;

#[derive(Debug, Error)]
pub enum BgbError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),
    #[error("unknown command: {0}")]
    UnknownCommand(u8),
    #[error("unsupported protocol version {0}.{1}.{2}")]
    VersionMismatch(u8, u8, u8),
    #[error("unexpected packet: {0:?}")]
    UnexpectedPacket(Packet),
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for BgbError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BgbError::ConnectionClosed
        } else {
            BgbError::Io(e)
        }
    }
}

/// Packets exchanged with the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// Sent by both sides right after connecting
    Version { major: u8, minor: u8, patch: u8 },

    /// Remote joypad input, ignored
    Joypad { key: u8 },

    /// The emulator clocked a byte out with its internal clock
    Sync1 { data: u8, control: u8, timestamp: u32 },

    /// Reply to SYNC1 carrying the byte we shifted out
    Sync2 { data: u8, control: u8 },

    /// `ack` means "not ready, retry"; otherwise a timestamp sync
    Sync3 { ack: bool, timestamp: u32 },

    /// Running / paused / reconnect support
    Status { flags: u8 },

    /// Peer is about to close the connection
    WantDisconnect,
}

impl Packet {
    pub fn version() -> Self {
        let (major, minor, patch) = PROTOCOL_VERSION;
        Packet::Version {
            major,
            minor,
            patch,
        }
    }

    pub fn running() -> Self {
        Packet::Status {
            flags: status::RUNNING,
        }
    }

    /// Answer to a SYNC1 with the byte we shift out
    pub fn reply(data: u8) -> Self {
        Packet::Sync2 {
            data,
            control: SYNC2_CONTROL,
        }
    }

    /// Encode packet to wire format
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let (b1, b2, b3, b4, i1) = match *self {
            Packet::Version {
                major,
                minor,
                patch,
            } => (cmd::VERSION, major, minor, patch, 0),
            Packet::Joypad { key } => (cmd::JOYPAD, key, 0, 0, 0),
            Packet::Sync1 {
                data,
                control,
                timestamp,
            } => (cmd::SYNC1, data, control, 0, timestamp),
            // b4 = 1 marks a response to SYNC1
            Packet::Sync2 { data, control } => (cmd::SYNC2, data, control, 1, 0),
            Packet::Sync3 { ack, timestamp } => {
                (cmd::SYNC3, u8::from(ack), 0, 0, timestamp & 0x7FFF_FFFF)
            }
            Packet::Status { flags } => (cmd::STATUS, flags, 0, 0, 0),
            Packet::WantDisconnect => (cmd::WANTDISCONNECT, 0, 0, 0, 0),
        };

        let mut buf = [0u8; PACKET_SIZE];
        buf[..4].copy_from_slice(&[b1, b2, b3, b4]);
        buf[4..].copy_from_slice(&i1.to_le_bytes());
        buf
    }

    /// Decode packet from wire format
    pub fn decode(buf: &[u8; PACKET_SIZE]) -> Result<Packet, BgbError> {
        let [b1, b2, b3, b4, ..] = *buf;
        let i1 = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);

        let packet = match b1 {
            cmd::VERSION => Packet::Version {
                major: b2,
                minor: b3,
                patch: b4,
            },
            cmd::JOYPAD => Packet::Joypad { key: b2 },
            cmd::SYNC1 => Packet::Sync1 {
                data: b2,
                control: b3,
                timestamp: i1,
            },
            cmd::SYNC2 => Packet::Sync2 {
                data: b2,
                control: b3,
            },
            cmd::SYNC3 => Packet::Sync3 {
                ack: b2 == 1,
                timestamp: i1,
            },
            cmd::STATUS => Packet::Status { flags: b2 },
            cmd::WANTDISCONNECT => Packet::WantDisconnect,
            other => return Err(BgbError::UnknownCommand(other)),
        };
        Ok(packet)
    }

    /// Write packet to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), BgbError> {
        writer.write_all(&self.encode())?;
        writer.flush()?;
        Ok(())
    }

    /// Read packet from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Packet, BgbError> {
        let mut buf = [0u8; PACKET_SIZE];
        reader.read_exact(&mut buf)?;
        Packet::decode(&buf)
    }
}
