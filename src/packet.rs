//! Packet header format and serialization.

use crate::error::TransportError;

/// Header size in bytes.
pub const HEADER_LEN: usize = 16;

/// Size of the UDP datagram header handled by the operating system.
/// It is never visible to us but counts towards the MTU.
pub const UDP_HEADER_LEN: usize = 22;

/// Packet header structure.
///
/// Fixed 16-byte big-endian header carried at the front of every datagram.
/// Acknowledgements piggyback on regular data packets: each outgoing header
/// echoes the newest remote sequence plus a bit vector of up to 32 older
/// sequences, so no dedicated ack packets exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Application-chosen discriminator; mismatching packets are dropped
    pub protocol: u32,
    /// Sender's local sequence number for this datagram
    pub sequence: u32,
    /// Newest sequence the sender has received from us
    pub ack: u32,
    /// Bit vector of received sequences older than `ack`.
    /// Bit 0 acknowledges `ack - 1`, bit 1 acknowledges `ack - 2`,
    /// down to bit 31 for `ack - 32`.
    pub ack_vector: u32,
}

impl PacketHeader {
    /// Encode the header into a 16-byte buffer.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), TransportError> {
        if buf.len() < HEADER_LEN {
            return Err(TransportError::TruncatedHeader);
        }

        buf[0..4].copy_from_slice(&self.protocol.to_be_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ack.to_be_bytes());
        buf[12..16].copy_from_slice(&self.ack_vector.to_be_bytes());

        Ok(())
    }

    /// Decode a header from a buffer.
    pub fn decode(buf: &[u8]) -> Result<Self, TransportError> {
        if buf.len() < HEADER_LEN {
            return Err(TransportError::TruncatedHeader);
        }

        Ok(Self {
            protocol: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            sequence: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            ack: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
            ack_vector: u32::from_be_bytes(buf[12..16].try_into().unwrap()),
        })
    }
}
