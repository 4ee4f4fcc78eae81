//! Connection configuration.

use crate::packet::{HEADER_LEN, UDP_HEADER_LEN};

/// Default protocol identifier, `b"rlnt"` packed big-endian.
pub const DEFAULT_PROTOCOL_ID: u32 =
    (b'r' as u32) << 24 | (b'l' as u32) << 16 | (b'n' as u32) << 8 | b't' as u32;

/// Configuration for a connection.
///
/// All values are fixed for the lifetime of the connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum size of a single datagram in bytes, UDP header included.
    ///
    /// Common values: 1500 for plain Ethernet, 1492 for PPPoE, 1400 for
    /// most DSL and VPN links, 576 for dial-up.
    pub mtu: u32,

    /// Numerical identifier for the packets of this application.
    /// Inbound datagrams whose first four bytes differ are dropped silently.
    pub protocol_id: u32,

    /// Maximum expected round trip time in seconds.
    ///
    /// Used as the pending-ack timeout and as the accounting window for the
    /// bandwidth estimates.
    pub rtt_max: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mtu: 1400,
            protocol_id: DEFAULT_PROTOCOL_ID,
            rtt_max: 1.0,
        }
    }
}

impl Config {
    /// Configuration with the given protocol identifier and default MTU.
    pub fn with_protocol_id(protocol_id: u32) -> Self {
        Self {
            protocol_id,
            ..Self::default()
        }
    }

    /// Largest payload that fits a single datagram under this MTU.
    ///
    /// The UDP header and our own packet header both count towards the MTU:
    ///
    /// ```text
    /// max_payload = mtu - UDP_HEADER_LEN - HEADER_LEN
    /// ```
    pub fn max_payload(&self) -> usize {
        (self.mtu as usize)
            .saturating_sub(UDP_HEADER_LEN)
            .saturating_sub(HEADER_LEN)
    }

    /// Largest datagram this configuration accepts, our header included.
    pub fn max_datagram(&self) -> usize {
        (self.mtu as usize).saturating_sub(UDP_HEADER_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sizes() {
        let config = Config::default();
        assert_eq!(config.mtu, 1400);
        assert_eq!(config.max_datagram(), 1378);
        assert_eq!(config.max_payload(), 1362);
    }

    #[test]
    fn tiny_mtu_saturates() {
        let config = Config {
            mtu: 16,
            ..Config::default()
        };
        assert_eq!(config.max_payload(), 0);
    }
}
