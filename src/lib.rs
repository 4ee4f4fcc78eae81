#![doc = include_str!("../README.md")]
#![deny(unsafe_code, missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod packet;
pub mod queue;
pub mod reliability;
pub mod sequence;
pub mod socket;

#[cfg(test)]
mod tests {
    use crate::packet::PacketHeader;
    use crate::queue::{PacketQueue, PacketRecord};
    use crate::reliability::Reliability;
    use crate::sequence::is_more_recent;

    #[test]
    fn test_packet_header_encode_decode() {
        let header = PacketHeader {
            protocol: 12345,
            sequence: 1,
            ack: 0,
            ack_vector: 0,
        };

        let mut buf = [0u8; 16];
        header.encode(&mut buf).expect("failed to encode header");

        let decoded = PacketHeader::decode(&buf).expect("failed to decode header");
        assert_eq!(decoded.protocol, 12345);
        assert_eq!(decoded.sequence, 1);
    }

    #[test]
    fn test_sequence_wrap() {
        assert!(is_more_recent(0, u32::MAX));
        assert!(!is_more_recent(u32::MAX, 0));
    }

    #[test]
    fn test_queue_rejects_duplicates() {
        let mut q = PacketQueue::new();

        q.insert(PacketRecord::new(1, 0));
        q.insert(PacketRecord::new(1, 0));
        q.insert(PacketRecord::new(2, 0));

        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_reliability_piggyback_roundtrip() {
        // Two engines exchanging headers in memory, no sockets involved.
        let mut alice = Reliability::new();
        let mut bob = Reliability::new();

        // Alice sends one packet, bob receives it.
        let hello = (
            alice.local_sequence(),
            alice.remote_sequence(),
            alice.ack_vector(),
        );
        alice.packet_sent(100);
        bob.packet_received(hello.0, hello.1, hello.2, 100);

        // Bob replies; his header acks alice's packet.
        let reply = (bob.local_sequence(), bob.remote_sequence(), bob.ack_vector());
        bob.packet_sent(100);
        alice.packet_received(reply.0, reply.1, reply.2, 100);

        assert_eq!(alice.stats().acked_packets, 1);
        assert_eq!(bob.stats().recv_packets, 1);
    }
}
