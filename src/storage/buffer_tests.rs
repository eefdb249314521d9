//! Generic tests for both buffer modes.
//!
//! Each test runs once over a stream buffer and once over a datagram buffer.
//! A small model of the expected contents tracks what the buffer should hand
//! back, so the same assertions hold whatever the framing.

use super::{LengthPrefix, Mode, RingBuffer};
use crate::time::Instant;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn buffer(mode: Mode, capacity: usize) -> RingBuffer<'static> {
    RingBuffer::with_capacity(mode, capacity, Instant::ZERO).unwrap()
}

/// What a buffer of the given mode should contain.
struct Model {
    mode: Mode,
    bytes: VecDeque<u8>,
    messages: VecDeque<Vec<u8>>,
}

impl Model {
    fn new(mode: Mode) -> Model {
        Model {
            mode,
            bytes: VecDeque::new(),
            messages: VecDeque::new(),
        }
    }

    fn push(&mut self, data: &[u8]) {
        match self.mode {
            Mode::Stream => self.bytes.extend(data),
            Mode::Datagram => self.messages.push_back(data.to_vec()),
        }
    }

    fn peek(&self, max: usize) -> Vec<u8> {
        match self.mode {
            Mode::Stream => self.bytes.iter().take(max).copied().collect(),
            Mode::Datagram => self
                .messages
                .front()
                .map(|m| m[..max.min(m.len())].to_vec())
                .unwrap_or_default(),
        }
    }

    fn pop(&mut self, max: usize) -> Vec<u8> {
        match self.mode {
            Mode::Stream => self.bytes.drain(..max.min(self.bytes.len())).collect(),
            Mode::Datagram => {
                // Whole messages while they fit; only a first message that
                // is longer than `max` is cut short.
                let mut out = Vec::new();
                while let Some(m) = self.messages.front() {
                    let left = max - out.len();
                    if left == 0 || (!out.is_empty() && m.len() > left) {
                        break;
                    }
                    out.extend_from_slice(&m[..m.len().min(left)]);
                    self.messages.pop_front();
                }
                out
            }
        }
    }

    fn len(&self) -> usize {
        match self.mode {
            Mode::Stream => self.bytes.len(),
            Mode::Datagram => self.messages.iter().map(|m| m.len() + 2).sum(),
        }
    }
}

// =============================================================================
// Generic test functions
// =============================================================================

fn test_capacity_len_room(mode: Mode) {
    let mut buf = buffer(mode, 64);

    assert_eq!(buf.mode(), mode);
    assert_eq!(buf.capacity(), 64);
    assert_eq!(buf.len(), 0);
    assert!(buf.is_empty());
    assert!(!buf.is_full());
    assert_eq!(buf.room(), 64);

    assert_eq!(buf.push(&[1, 2, 3, 4], LengthPrefix::Add), 4);
    assert_eq!(buf.len(), 4 + mode.prefix_len());
    assert_eq!(buf.room(), 60 - mode.prefix_len());
    assert_eq!(buf.rx_bytes(), buf.len() as u64);
}

fn test_peek_is_repeatable(mode: Mode) {
    let mut buf = buffer(mode, 64);
    assert_eq!(buf.push(b"hello world", LengthPrefix::Add), 11);

    let mut first = [0u8; 11];
    let mut second = [0u8; 11];
    assert_eq!(buf.peek(&mut first), 11);
    assert_eq!(buf.peek(&mut second), 11);
    assert_eq!(first, second);
    assert_eq!(&first, b"hello world");
    assert_eq!(buf.tx_bytes(), 0);
}

fn test_drain_exhaustion(mode: Mode) {
    let mut buf = buffer(mode, 64);
    assert_eq!(buf.push(b"abc", LengthPrefix::Add), 3);
    assert_eq!(buf.push(b"de", LengthPrefix::Add), 2);

    let mut out = [0u8; 8];
    assert_eq!(buf.pop(&mut out), 5);
    assert_eq!(&out[..5], b"abcde");
    assert!(buf.is_empty());
    let counters = (buf.rx_bytes(), buf.tx_bytes());
    assert_eq!(buf.pop(&mut out), 0);
    assert_eq!(buf.pop(&mut out), 0);
    assert_eq!(counters, (buf.rx_bytes(), buf.tx_bytes()));
}

fn test_insufficient_room_unchanged(mode: Mode) {
    let mut buf = buffer(mode, 32);
    assert_eq!(buf.push(&[9; 20], LengthPrefix::Add), 20);

    let before = (buf.len(), buf.room(), buf.rx_bytes(), buf.tx_bytes());
    let too_big = [7u8; 13];
    assert!(too_big.len() + mode.prefix_len() > buf.room());
    assert_eq!(buf.push(&too_big, LengthPrefix::Add), 0);
    assert_eq!(before, (buf.len(), buf.room(), buf.rx_bytes(), buf.tx_bytes()));

    let mut out = [0u8; 32];
    assert_eq!(buf.peek(&mut out), 20);
    assert_eq!(&out[..20], &[9; 20]);
}

fn test_resize_preserves_content(mode: Mode) {
    let mut buf = buffer(mode, 32);
    assert_eq!(buf.push(&[1; 16], LengthPrefix::Add), 16);
    assert_eq!(buf.push(b"0123456789", LengthPrefix::Add), 10);
    let mut out = [0u8; 32];
    assert_eq!(buf.pop(&mut out[..16]), 16);
    // Leave data resident across the end of the store.
    assert_eq!(buf.push(b"abcdefghij", LengthPrefix::Add), 10);

    let occupied = buf.len();
    assert_eq!(buf.resize(128), Ok(occupied));
    assert_eq!(buf.capacity(), 128);
    assert_eq!(buf.room(), 128 - occupied);

    let mut all = Vec::new();
    loop {
        let n = buf.pop(&mut out);
        if n == 0 {
            break;
        }
        all.extend_from_slice(&out[..n]);
    }
    assert_eq!(&all[..], b"0123456789abcdefghij");
}

fn test_coalesce_matches_pop(mode: Mode) {
    let mut buf = buffer(mode, 32);
    assert_eq!(buf.push(&[1; 20], LengthPrefix::Add), 20);
    assert_eq!(buf.push(&[2; 4], LengthPrefix::Add), 4);
    let mut out = [0u8; 32];
    assert_eq!(buf.pop(&mut out[..20]), 20);
    assert_eq!(buf.push(b"wrapped around", LengthPrefix::Add), 14);
    assert_eq!(buf.push(b"tail", LengthPrefix::Add), 4);

    let len = buf.len();
    let mut expected = [0u8; 32];
    let n = buf.peek(&mut expected);

    assert_eq!(buf.coalesce().unwrap(), &expected[..n]);
    assert_eq!(buf.len(), len);
    assert_eq!(buf.pop(&mut out[..n]), n);
    assert_eq!(&out[..n], &expected[..n]);
}

fn test_random_traffic(mode: Mode) {
    let mut rng = ChaCha8Rng::seed_from_u64(0x0b5e_55ed);
    let mut buf = buffer(mode, 64);
    let mut model = Model::new(mode);

    for round in 0..5000 {
        if rng.gen_bool(0.55) {
            let mut data = alloc::vec![0u8; rng.gen_range(1..=24)];
            rng.fill(&mut data[..]);
            let fits = data.len() + mode.prefix_len() <= buf.room();

            let appended = buf.push(&data, LengthPrefix::Add);
            if fits {
                assert_eq!(appended, data.len(), "round {round}");
                model.push(&data);
            } else {
                assert_eq!(appended, 0, "round {round}");
            }
        } else {
            let mut out = [0u8; 32];
            let max = rng.gen_range(1..=32);
            let n = buf.pop(&mut out[..max]);
            assert_eq!(&out[..n], &model.pop(max)[..], "round {round}");
        }

        assert_eq!(buf.len(), model.len(), "round {round}");

        if round % 97 == 0 {
            let expected = model.peek(usize::MAX);
            assert_eq!(buf.coalesce().unwrap(), &expected[..], "round {round}");
        }
    }
}

// =============================================================================
// Test instantiation macros
// =============================================================================

macro_rules! buffer_generic_tests {
    ($mode:expr, $mod_name:ident) => {
        mod $mod_name {
            use super::*;

            #[test]
            fn capacity_len_room() {
                test_capacity_len_room($mode);
            }

            #[test]
            fn peek_is_repeatable() {
                test_peek_is_repeatable($mode);
            }

            #[test]
            fn drain_exhaustion() {
                test_drain_exhaustion($mode);
            }

            #[test]
            fn insufficient_room_unchanged() {
                test_insufficient_room_unchanged($mode);
            }

            #[test]
            fn resize_preserves_content() {
                test_resize_preserves_content($mode);
            }

            #[test]
            fn coalesce_matches_pop() {
                test_coalesce_matches_pop($mode);
            }

            #[test]
            fn random_traffic() {
                test_random_traffic($mode);
            }
        }
    };
}

// Generate tests for both framings
buffer_generic_tests!(Mode::Stream, stream_buffer_tests);
buffer_generic_tests!(Mode::Datagram, datagram_buffer_tests);
