use relnet::config::Config;
use relnet::connection::Connection;
use relnet::error::TransportError;
use relnet::packet::{PacketHeader, HEADER_LEN};
use relnet::socket::Socket;

use parking_lot::Mutex;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

fn loopback(conn: &Connection) -> SocketAddr {
    let port = conn.local_addr().expect("connection not bound").port();
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[test]
fn header_survives_loopback() {
    let mut tx = Socket::new();
    let mut rx = Socket::new();
    tx.open(0).expect("failed to open sender");
    rx.open(0).expect("failed to open receiver");

    let header = PacketHeader {
        protocol: 0xBADB_EEF,
        sequence: 2,
        ack: 1,
        ack_vector: 0x0000_ffff,
    };

    let mut datagram = [0u8; HEADER_LEN + 5];
    header.encode(&mut datagram).expect("failed to encode");
    datagram[HEADER_LEN..].copy_from_slice(b"hello");

    let port = rx.local_addr().expect("receiver not bound").port();
    tx.send_to(SocketAddr::from(([127, 0, 0, 1], port)), &datagram)
        .expect("send failed");

    let mut buf = [0u8; 64];
    let (n, _from) = rx.recv_from(&mut buf).expect("recv failed");

    assert_eq!(n, datagram.len());
    let decoded = PacketHeader::decode(&buf[..n]).expect("failed to decode");
    assert_eq!(decoded, header);
    assert_eq!(&buf[HEADER_LEN..n], b"hello");
}

#[test]
fn payload_exchange_with_piggybacked_acks() {
    let config = Config::with_protocol_id(0xBADB_EEF);

    let mut bob = Connection::new(config.clone());
    let mut jane = Connection::new(config);
    bob.open(0).expect("failed to open bob");
    jane.open(0).expect("failed to open jane");

    let acked = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&acked);
    jane.set_acked_handler(move |seq| sink.lock().push(seq));

    jane.send(loopback(&bob), b"Hi").expect("jane send failed");

    let (from, payload) = bob.recv().expect("bob recv failed");
    assert_eq!(payload, b"Hi");
    assert_eq!(from.port(), loopback(&jane).port());

    // Bob's reply carries an ack for jane's packet in its header.
    bob.send(from, b"sup").expect("bob send failed");

    let (_, payload) = jane.recv().expect("jane recv failed");
    assert_eq!(payload, b"sup");

    assert_eq!(&*acked.lock(), &[0]);

    let jane_stats = jane.stats();
    assert_eq!(jane_stats.sent_packets, 1);
    assert_eq!(jane_stats.recv_packets, 1);
    assert_eq!(jane_stats.acked_packets, 1);
    assert_eq!(jane_stats.lost_packets, 0);

    let bob_stats = bob.stats();
    assert_eq!(bob_stats.recv_packets, 1);
    assert_eq!(bob_stats.remote_sequence, 0);

    bob.close().expect("failed to close bob");
    jane.close().expect("failed to close jane");
}

#[test]
fn foreign_datagrams_are_skipped() {
    let config = Config::with_protocol_id(0x5EED_F00D);

    let mut receiver = Connection::new(config.clone());
    let mut sender = Connection::new(config);
    receiver.open(0).expect("failed to open receiver");
    sender.open(0).expect("failed to open sender");

    let dest = loopback(&receiver);
    let raw = UdpSocket::bind("127.0.0.1:0").expect("failed to bind raw socket");

    // Too short to hold a header.
    raw.send_to(b"runt", dest).expect("raw send failed");

    // Full-size header with a foreign protocol id.
    let header = PacketHeader {
        protocol: 0x0BAD_1DEA,
        sequence: 9,
        ack: 9,
        ack_vector: 9,
    };
    let mut foreign = [0u8; HEADER_LEN + 4];
    header.encode(&mut foreign).expect("failed to encode");
    raw.send_to(&foreign, dest).expect("raw send failed");

    sender.send(dest, b"valid").expect("send failed");

    let (_, payload) = receiver.recv().expect("recv failed");
    assert_eq!(payload, b"valid");

    // Only the valid datagram reached the reliability engine.
    assert_eq!(receiver.stats().recv_packets, 1);
}

#[test]
fn unacked_packets_are_reported_lost() {
    let config = Config::with_protocol_id(0xD15C_A2D);

    let mut conn = Connection::new(config);
    let mut sink_sock = Socket::new();
    conn.open(0).expect("failed to open connection");
    sink_sock.open(0).expect("failed to open sink");

    let lost = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lost);
    conn.set_lost_handler(move |seq| sink.lock().push(seq));

    // The sink never replies, so no ack ever comes back.
    let port = sink_sock.local_addr().expect("sink not bound").port();
    let dest = SocketAddr::from(([127, 0, 0, 1], port));
    conn.send(dest, b"one").expect("send failed");
    conn.send(dest, b"two").expect("send failed");

    conn.tick(1.5);

    assert_eq!(&*lost.lock(), &[0, 1]);
    let stats = conn.stats();
    assert_eq!(stats.lost_packets, 2);
    assert_eq!(stats.acked_packets, 0);
}

#[test]
fn lifecycle_errors() {
    let mut conn = Connection::new(Config::default());

    assert!(matches!(conn.close(), Err(TransportError::AlreadyClosed)));

    conn.open(0).expect("failed to open connection");
    assert!(matches!(conn.open(0), Err(TransportError::AlreadyOpen)));
    assert!(conn.is_open());

    conn.close().expect("failed to close connection");
    assert!(!conn.is_open());
    assert!(matches!(
        conn.recv(),
        Err(TransportError::AlreadyClosed)
    ));
}
