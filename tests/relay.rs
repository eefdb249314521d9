#![cfg(all(unix, feature = "io-fd", feature = "proto-ipsec"))]

use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixDatagram, UnixStream};

use relaybuf::detect::{self, Detection, Ipsec, Protocol};
use relaybuf::socket::MsgFlags;
use relaybuf::storage::{Mode, RingBuffer};
use relaybuf::time::{Duration, Instant};

fn setup_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[rustfmt::skip]
const IKE_SA_INIT: [u8; 30] = [
    0x00, 0x00, 0x00, 0x00,
    0xe5, 0xbc, 0x67, 0x55, 0x0f, 0xd4, 0xd3, 0xea,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x21, 0x20, 0x22, 0x08,
    0x00, 0x00, 0x00, 0x00,
    0xad, 0x92,
];

/// Client datagrams are sniffed, then replayed unchanged and in order.
#[test]
fn datagram_sniff_and_replay() {
    setup_logging();
    let (client, listener) = UnixDatagram::pair().unwrap();
    let (upstream, backend) = UnixDatagram::pair().unwrap();
    let mut clock = Instant::from_secs(100);
    let mut ring = RingBuffer::with_default_capacity(Mode::Datagram, clock).unwrap();

    client.send(&IKE_SA_INIT).unwrap();
    client.send(b"\x00\x00\x00\x01esp").unwrap();

    clock += Duration::from_millis(5);
    assert_eq!(ring.recv(listener.as_raw_fd(), MsgFlags::DONTWAIT, clock).unwrap(), 30);
    assert_eq!(ring.recv(listener.as_raw_fd(), MsgFlags::DONTWAIT, clock).unwrap(), 7);

    let detection = detect::probe(&mut ring, &Ipsec).unwrap();
    assert!(detection.is_match());
    assert_eq!(detection.hostname(), None);
    assert_eq!(Ipsec.default_port(), 500);

    clock += Duration::from_millis(5);
    let mut out = [0u8; 64];
    assert_eq!(ring.send(upstream.as_raw_fd(), MsgFlags::empty(), clock).unwrap(), 30);
    assert_eq!(backend.recv(&mut out).unwrap(), 30);
    assert_eq!(&out[..30], &IKE_SA_INIT);
    assert_eq!(ring.send(upstream.as_raw_fd(), MsgFlags::empty(), clock).unwrap(), 7);
    assert_eq!(backend.recv(&mut out).unwrap(), 7);
    assert_eq!(&out[..7], b"\x00\x00\x00\x01esp");

    assert!(ring.is_empty());
    assert_eq!(ring.rx_bytes(), ring.tx_bytes());
    assert_eq!(ring.idle_time(clock + Duration::from_secs(1)), Duration::from_secs(1));
}

/// A stream that arrives in pieces and outgrows its buffer mid-connection.
#[test]
fn stream_grow_and_forward() {
    setup_logging();
    let (mut client, listener) = UnixStream::pair().unwrap();
    let (mut upstream, mut backend) = UnixStream::pair().unwrap();
    listener.set_nonblocking(true).unwrap();
    let mut ring = RingBuffer::with_capacity(Mode::Stream, 16, Instant::ZERO).unwrap();

    client.write_all(b"0123456789abcdefghij").unwrap();
    assert_eq!(ring.read_from(&mut &listener, Instant::ZERO).unwrap(), 16);
    assert!(ring.is_full());

    let err = ring.read_from(&mut &listener, Instant::ZERO).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

    assert_eq!(ring.resize(64), Ok(16));
    assert_eq!(ring.read_from(&mut &listener, Instant::ZERO).unwrap(), 4);

    let err = ring.read_from(&mut &listener, Instant::ZERO).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

    assert_eq!(ring.coalesce().unwrap(), b"0123456789abcdefghij");
    assert_eq!(ring.write_to(&mut upstream, Instant::ZERO).unwrap(), 20);
    drop(upstream);

    let mut forwarded = Vec::new();
    backend.read_to_end(&mut forwarded).unwrap();
    assert_eq!(&forwarded[..], b"0123456789abcdefghij");
}

/// A datagram detector is never run against a stream connection.
#[test]
fn stream_is_not_ipsec() {
    setup_logging();
    let mut ring = RingBuffer::with_capacity(Mode::Stream, 64, Instant::ZERO).unwrap();
    let mut source = io::Cursor::new(IKE_SA_INIT.to_vec());
    assert_eq!(ring.read_from(&mut source, Instant::ZERO).unwrap(), 30);

    let detection = detect::probe(&mut ring, &Ipsec).unwrap();
    assert_eq!(detection, Detection::Mismatch(detect::MODE_MISMATCH));
    assert_eq!(ring.len(), 30);
}
