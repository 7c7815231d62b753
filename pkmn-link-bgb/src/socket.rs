//! TCP connection to the emulator's link port.

use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::bgb::{BgbError, Packet};

/// Default address to listen on
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";

/// Listens for an emulator that connects to us
pub struct LinkListener {
    inner: TcpListener,
}

impl LinkListener {
    /// Bind to an address and start listening
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, std::io::Error> {
        Ok(LinkListener {
            inner: TcpListener::bind(addr)?,
        })
    }

    /// Accept a new connection (blocking)
    pub fn accept(&self) -> Result<LinkConnection, std::io::Error> {
        let (stream, _) = self.inner.accept()?;
        LinkConnection::from_tcp(stream)
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

/// A connection to the emulator
pub struct LinkConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: String,
}

impl LinkConnection {
    fn from_tcp(stream: TcpStream) -> Result<Self, std::io::Error> {
        // Every transfer is a round trip, don't let Nagle batch them
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".to_string());
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(LinkConnection {
            reader,
            writer,
            peer,
        })
    }

    /// Connect to an emulator that is listening
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, std::io::Error> {
        Self::from_tcp(TcpStream::connect(addr)?)
    }

    /// Peer address, for logging
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send a packet
    pub fn send(&mut self, packet: &Packet) -> Result<(), BgbError> {
        packet.write_to(&mut self.writer)
    }

    /// Receive a packet (blocking)
    pub fn recv(&mut self) -> Result<Packet, BgbError> {
        Packet::read_from(&mut self.reader)
    }

    /// Shutdown the connection
    pub fn shutdown(&self) -> Result<(), std::io::Error> {
        self.writer.get_ref().shutdown(std::net::Shutdown::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_tcp_communication() {
        let listener = LinkListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let mut conn = listener.accept().unwrap();
            assert_eq!(conn.recv().unwrap(), Packet::version());
            conn.send(&Packet::version()).unwrap();

            let packet = conn.recv().unwrap();
            assert!(matches!(packet, Packet::Sync1 { data: 0x01, .. }));
            conn.send(&Packet::reply(0x02)).unwrap();
        });

        let mut conn = LinkConnection::connect(addr).unwrap();
        conn.send(&Packet::version()).unwrap();
        assert_eq!(conn.recv().unwrap(), Packet::version());

        conn.send(&Packet::Sync1 {
            data: 0x01,
            control: 0x81,
            timestamp: 0,
        })
        .unwrap();
        assert_eq!(conn.recv().unwrap(), Packet::reply(0x02));

        server_thread.join().unwrap();
    }

    #[test]
    fn test_closed_peer() {
        let listener = LinkListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let conn = listener.accept().unwrap();
            conn.shutdown().unwrap();
        });

        let mut conn = LinkConnection::connect(addr).unwrap();
        server_thread.join().unwrap();
        assert!(matches!(conn.recv(), Err(BgbError::ConnectionClosed)));
    }
}
