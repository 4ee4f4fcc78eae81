//! Host-facing connection facade.

use std::net::SocketAddr;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Result, TransportError};
use crate::packet::{PacketHeader, HEADER_LEN};
use crate::reliability::{Reliability, Stats};
use crate::socket::Socket;

/// A two-way connection with reliability bookkeeping.
///
/// Every outgoing datagram carries a 16-byte header with the local
/// sequence number and piggybacked acks for the peer's packets. Every
/// incoming datagram feeds the reliability engine before its payload is
/// surfaced. Payloads come out in arrival order; the engine only reports
/// which sequences were acknowledged or lost, and retransmission stays
/// with the host.
///
/// # Locking discipline
///
/// The reliability state sits behind one mutex shared by `send`, `recv`
/// and `tick`, so a host may drive a sender thread, a receiver thread and
/// a tick loop concurrently. The blocking socket read in `recv` happens
/// outside the lock. `open` and `close` take `&mut self` and therefore
/// require exclusive access.
///
/// # Example
///
/// ```no_run
/// use relnet::config::Config;
/// use relnet::connection::Connection;
///
/// let mut conn = Connection::new(Config::default());
/// conn.open(30000)?;
///
/// let peer = "127.0.0.1:30001".parse().unwrap();
/// conn.send(peer, b"hello")?;
///
/// let (from, payload) = conn.recv()?;
/// conn.tick(1.0 / 30.0);
/// # Ok::<(), relnet::error::TransportError>(())
/// ```
pub struct Connection {
    config: Config,
    socket: Socket,
    reliability: Mutex<Reliability>,
}

impl Connection {
    /// Creates a closed connection with the given configuration.
    pub fn new(config: Config) -> Self {
        let reliability = Reliability::with_rtt_max(config.rtt_max);

        Self {
            config,
            socket: Socket::new(),
            reliability: Mutex::new(reliability),
        }
    }

    /// Binds the local port. Fails with [`TransportError::AlreadyOpen`]
    /// if the connection is already open.
    pub fn open(&mut self, port: u16) -> Result<()> {
        self.socket.open(port)?;
        debug!(protocol = self.config.protocol_id, "connection opened");
        Ok(())
    }

    /// Tears down the reliability state and closes the socket.
    ///
    /// Fails with [`TransportError::AlreadyClosed`] when called twice.
    /// A closed connection is not reusable; construct a new one instead.
    pub fn close(&mut self) -> Result<()> {
        if !self.socket.is_open() {
            return Err(TransportError::AlreadyClosed);
        }

        self.reliability.lock().reset();
        self.socket.close()?;
        debug!("connection closed");
        Ok(())
    }

    /// Returns true while the connection is open.
    pub fn is_open(&self) -> bool {
        self.socket.is_open()
    }

    /// The local address the connection is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The connection configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sends `payload` to `dest` with a reliability header prepended.
    ///
    /// Fails with [`TransportError::PacketTooLarge`] when the payload plus
    /// header does not fit the configured MTU. The reliability engine is
    /// only updated once the full datagram was handed to the kernel; a
    /// short write leaves the engine untouched.
    pub fn send(&self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        let size = payload.len() + HEADER_LEN;
        let max = self.config.max_datagram();

        if size > max {
            return Err(TransportError::PacketTooLarge { size, max });
        }

        // The lock spans header construction through the sent notification
        // so concurrent senders cannot interleave sequence numbers.
        let mut reliability = self.reliability.lock();

        let header = PacketHeader {
            protocol: self.config.protocol_id,
            sequence: reliability.local_sequence(),
            ack: reliability.remote_sequence(),
            ack_vector: reliability.ack_vector(),
        };

        let mut datagram = vec![0u8; size];
        header.encode(&mut datagram[..HEADER_LEN])?;
        datagram[HEADER_LEN..].copy_from_slice(payload);

        self.socket.send_to(dest, &datagram)?;
        reliability.packet_sent(size as u32);
        Ok(())
    }

    /// Receives the next datagram addressed to us, blocking until one
    /// arrives.
    ///
    /// Datagrams shorter than a header or carrying a foreign protocol id
    /// are skipped silently and the read is retried. Valid datagrams feed
    /// the reliability engine; their payload is returned together with the
    /// sender address.
    pub fn recv(&self) -> Result<(SocketAddr, Vec<u8>)> {
        let mut buf = vec![0u8; self.config.max_datagram()];

        loop {
            let (n, from) = self.socket.recv_from(&mut buf)?;

            if n < HEADER_LEN {
                trace!(%from, size = n, "discarding undersized datagram");
                continue;
            }

            let header = PacketHeader::decode(&buf[..n])?;

            if header.protocol != self.config.protocol_id {
                trace!(%from, protocol = header.protocol, "discarding foreign datagram");
                continue;
            }

            self.reliability.lock().packet_received(
                header.sequence,
                header.ack,
                header.ack_vector,
                n as u32,
            );

            return Ok((from, buf[HEADER_LEN..n].to_vec()));
        }
    }

    /// Advances packet ages by `delta` seconds.
    ///
    /// Hosts call this on a steady cadence, conventionally once per game
    /// frame at around 30 Hz. Loss notifications fire synchronously from
    /// inside this call.
    pub fn tick(&self, delta: f32) {
        self.reliability.lock().tick(delta);
    }

    /// Snapshot of the connection statistics.
    pub fn stats(&self) -> Stats {
        self.reliability.lock().stats()
    }

    /// Registers a handler invoked once for every acknowledged sequence.
    /// The handler runs on the thread calling [`recv`](Self::recv) and
    /// must not call back into the connection.
    pub fn set_acked_handler(&self, handler: impl FnMut(u32) + Send + 'static) {
        self.reliability.lock().set_acked_handler(handler);
    }

    /// Registers a handler invoked once for every lost sequence.
    /// The handler runs on the thread calling [`tick`](Self::tick) and
    /// must not call back into the connection.
    pub fn set_lost_handler(&self, handler: impl FnMut(u32) + Send + 'static) {
        self.reliability.lock().set_lost_handler(handler);
    }
}
