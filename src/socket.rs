//! Thin wrapper over an OS UDP socket.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Blocking UDP socket with an explicit open and close lifecycle.
///
/// No read or write deadlines are set, so `recv_from` blocks until a
/// datagram arrives and `send_to` blocks until the datagram is handed to
/// the kernel. Operating system errors surface verbatim.
#[derive(Debug, Default)]
pub struct Socket {
    udp: Option<UdpSocket>,
}

impl Socket {
    /// Creates a socket in the closed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the socket to the given local port. Port 0 binds an
    /// ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn open(&mut self, port: u16) -> Result<()> {
        if self.udp.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let udp = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        let local = udp.local_addr()?;
        debug!(%local, "socket opened");
        self.udp = Some(udp);
        Ok(())
    }

    /// Closes the socket. Closing an already closed socket fails with
    /// [`TransportError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<()> {
        match self.udp.take() {
            Some(_) => {
                debug!("socket closed");
                Ok(())
            }
            None => Err(TransportError::AlreadyClosed),
        }
    }

    /// Returns true while the socket is open.
    pub fn is_open(&self) -> bool {
        self.udp.is_some()
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket()?.local_addr()?)
    }

    /// Sends `payload` to `dest` as one datagram.
    ///
    /// A partial write is reported as [`TransportError::ShortWrite`].
    pub fn send_to(&self, dest: SocketAddr, payload: &[u8]) -> Result<usize> {
        let written = self.socket()?.send_to(payload, dest)?;

        if written != payload.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: payload.len(),
            });
        }

        Ok(written)
    }

    /// Receives one datagram into `buf`, blocking until data arrives.
    /// Returns the datagram length and the sender address.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket()?.recv_from(buf)?)
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.udp.as_ref().ok_or(TransportError::AlreadyClosed)
    }
}
