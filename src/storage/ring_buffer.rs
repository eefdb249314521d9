// Some of the functions in ring buffer is marked as #[must_use]. It notes that
// these functions may have side effects, and it's implemented by [RFC 1940].
// [RFC 1940]: https://github.com/rust-lang/rust/issues/43302

use alloc::vec::Vec;
use byteorder::{ByteOrder, NetworkEndian};
use managed::ManagedSlice;

use super::iovec::{Spans, plan};
use super::{BUFFER_MAX_SIZE, DGRAM_PREFIX_LEN, Error, LengthPrefix, Mode};
use crate::time::{Duration, Instant};

/// A ring buffer for one direction of a relayed connection.
///
/// The backing store is always a power of two long, so positions wrap with a
/// mask. The occupied region starts at `head` and is `length` bytes long; it
/// may run past the end of the store and continue at index 0.
///
/// In [Mode::Datagram] the occupied region is a sequence of messages, each a
/// 2-byte big-endian length followed by that many payload bytes. The length
/// fields take up capacity but are never handed to callers. Reads work on the
/// payload of the message at the head, except [pop](#method.pop), which may
/// drain several whole messages at once. Every stored message is non-empty.
///
/// Views returned by [peek](#method.peek) and [coalesce](#method.coalesce)
/// borrow the buffer, so they cannot outlive the next mutation.
#[derive(Debug)]
pub struct RingBuffer<'a> {
    storage: ManagedSlice<'a, u8>,
    mode: Mode,
    head: usize,
    length: usize,
    rx_bytes: u64,
    tx_bytes: u64,
    last_recv: Instant,
    last_send: Instant,
}

fn check_capacity(capacity: usize) -> Result<(), Error> {
    if !capacity.is_power_of_two() {
        return Err(Error::InvalidCapacity);
    }
    if capacity > BUFFER_MAX_SIZE {
        return Err(Error::CapacityExceeded);
    }
    Ok(())
}

fn allocate(size: usize) -> Result<Vec<u8>, Error> {
    let mut store = Vec::new();
    store
        .try_reserve_exact(size)
        .map_err(|_| Error::AllocationFailed)?;
    store.resize(size, 0);
    Ok(store)
}

/// Whether `data` is a run of whole, non-empty datagrams, each behind its
/// length field.
fn is_framed(mut data: &[u8]) -> bool {
    while !data.is_empty() {
        if data.len() < DGRAM_PREFIX_LEN {
            return false;
        }
        let len = NetworkEndian::read_u16(data) as usize;
        if len == 0 || data.len() - DGRAM_PREFIX_LEN < len {
            return false;
        }
        data = &data[DGRAM_PREFIX_LEN + len..];
    }
    true
}

impl<'a> RingBuffer<'a> {
    /// Create a buffer over the given storage.
    ///
    /// The storage length is the capacity and must be a power of two no
    /// larger than [BUFFER_MAX_SIZE](super::BUFFER_MAX_SIZE).
    pub fn new<S>(mode: Mode, storage: S, now: Instant) -> Result<RingBuffer<'a>, Error>
    where
        S: Into<ManagedSlice<'a, u8>>,
    {
        let storage = storage.into();
        check_capacity(storage.len())?;
        net_trace!("ring: new {} buffer of {} bytes", mode, storage.len());

        Ok(RingBuffer {
            storage,
            mode,
            head: 0,
            length: 0,
            rx_bytes: 0,
            tx_bytes: 0,
            last_recv: now,
            last_send: now,
        })
    }

    /// Create a buffer that owns `capacity` freshly allocated bytes.
    pub fn with_capacity(mode: Mode, capacity: usize, now: Instant) -> Result<RingBuffer<'a>, Error> {
        check_capacity(capacity)?;
        RingBuffer::new(mode, allocate(capacity)?, now)
    }

    /// Create a buffer of the configured default size.
    ///
    /// See [BUFFER_DEFAULT_SIZE](crate::BUFFER_DEFAULT_SIZE).
    pub fn with_default_capacity(mode: Mode, now: Instant) -> Result<RingBuffer<'a>, Error> {
        RingBuffer::with_capacity(mode, crate::config::BUFFER_DEFAULT_SIZE, now)
    }

    /// Return the framing of this buffer.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Return the size of the backing store.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Return the number of occupied bytes, framing included.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Return the number of free bytes.
    pub fn room(&self) -> usize {
        self.capacity() - self.length
    }

    /// Query whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Query whether the buffer is full.
    pub fn is_full(&self) -> bool {
        self.room() == 0
    }

    /// Total bytes ever written into the buffer, framing included.
    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes
    }

    /// Total bytes ever drained from the buffer, framing included.
    pub fn tx_bytes(&self) -> u64 {
        self.tx_bytes
    }

    /// When an adapter last filled this buffer.
    pub fn last_recv(&self) -> Instant {
        self.last_recv
    }

    /// When an adapter last drained this buffer.
    pub fn last_send(&self) -> Instant {
        self.last_send
    }

    /// Time elapsed since the most recent activity in either direction.
    pub fn idle_time(&self, now: Instant) -> Duration {
        now - self.last_recv.max(self.last_send)
    }

    pub(crate) fn mark_recv(&mut self, now: Instant) {
        self.last_recv = now;
    }

    pub(crate) fn mark_send(&mut self, now: Instant) {
        self.last_send = now;
    }

    /// Drop all buffered bytes. Counters and timestamps are kept.
    pub fn clear(&mut self) {
        self.head = 0;
        self.length = 0;
    }

    /// Grow or shrink the backing store, returning the number of occupied bytes.
    ///
    /// The occupied region is copied to the start of the new store, framing
    /// included. A capacity smaller than the occupied length is rejected; on
    /// any error the buffer is left untouched.
    pub fn resize(&mut self, capacity: usize) -> Result<usize, Error> {
        check_capacity(capacity)?;
        if capacity < self.length {
            return Err(Error::CapacityTooSmall);
        }

        let mut store = allocate(capacity)?;
        plan(self.capacity(), self.head, 0, self.length).copy_out(&self.storage, &mut store);
        net_debug!(
            "ring: resized {} -> {} bytes ({} occupied)",
            self.capacity(),
            capacity,
            self.length
        );

        self.storage = ManagedSlice::Owned(store);
        self.head = 0;
        Ok(self.length)
    }

    fn mask(&self) -> usize {
        self.capacity() - 1
    }

    fn read_prefix(&self, at: usize) -> usize {
        let mask = self.mask();
        let bytes = [self.storage[at & mask], self.storage[(at + 1) & mask]];
        NetworkEndian::read_u16(&bytes) as usize
    }

    fn write_prefix(&mut self, at: usize, len: u16) {
        let mut bytes = [0; DGRAM_PREFIX_LEN];
        NetworkEndian::write_u16(&mut bytes, len);
        let mask = self.mask();
        self.storage[at & mask] = bytes[0];
        self.storage[(at + 1) & mask] = bytes[1];
    }

    /// Payload length of the datagram at the head, clamped to what is
    /// buffered.
    fn message_len(&self) -> usize {
        if self.length < DGRAM_PREFIX_LEN {
            return 0;
        }
        self.read_prefix(self.head)
            .min(self.length - DGRAM_PREFIX_LEN)
    }

    /// Offset from `head` and length of the payload a read would see.
    fn payload_extent(&self) -> (usize, usize) {
        match self.mode {
            Mode::Stream => (0, self.length),
            Mode::Datagram => (DGRAM_PREFIX_LEN, self.message_len()),
        }
    }

    /// Free region the next write may fill with payload.
    fn write_spans(&self) -> Spans {
        let payload = match self.mode {
            Mode::Stream => self.room(),
            Mode::Datagram => self
                .room()
                .saturating_sub(DGRAM_PREFIX_LEN)
                .min(u16::MAX as usize),
        };
        plan(
            self.capacity(),
            self.head + self.length,
            self.mode.prefix_len(),
            payload,
        )
    }

    /// Occupied payload a read may drain, at most `max` bytes.
    fn read_spans(&self, max: usize) -> Spans {
        let (skip, len) = self.payload_extent();
        plan(self.capacity(), self.head, skip, len.min(max))
    }

    /// Commit `size` payload bytes written after the tail.
    fn advance_write(&mut self, size: usize, framed: bool) {
        let mut total = size;
        if framed {
            // Payload sizes are capped at u16::MAX before any write.
            self.write_prefix(self.head + self.length, size as u16);
            total += DGRAM_PREFIX_LEN;
        }
        debug_assert!(total <= self.room());
        self.length += total;
        self.rx_bytes += total as u64;
    }

    /// Consume `size` payload bytes read from the head.
    ///
    /// A datagram is always consumed whole, whatever part of it was read.
    fn advance_read(&mut self, size: usize) {
        let total = match self.mode {
            Mode::Stream => size,
            Mode::Datagram => DGRAM_PREFIX_LEN + self.message_len(),
        };
        debug_assert!(total <= self.length);
        self.head = (self.head + total) & self.mask();
        self.length -= total;
        self.tx_bytes += total as u64;
    }

    /// Call `f` with the free region of the buffer as up to two slices, and
    /// commit as many bytes as `f` reports having written.
    ///
    /// This is the write path every receive adapter is built on. `f` sees
    /// zero slices when there is no room. In [Mode::Datagram] the slices
    /// start after a reserved length field, and a non-zero write is recorded
    /// as exactly one message. Nothing is committed when `f` fails or writes
    /// zero bytes.
    ///
    /// # Panics
    /// This function panics if the amount reported by `f` exceeds the total
    /// size of the slices.
    pub fn enqueue_vectored_with<E, F>(&mut self, f: F) -> Result<usize, E>
    where
        F: FnOnce(&mut [&mut [u8]]) -> Result<usize, E>,
    {
        if self.length == 0 {
            self.head = 0;
        }

        let spans = self.write_spans();
        let max_size = spans.len();
        let size = {
            let mut slices = spans.slices_mut(&mut self.storage);
            f(&mut slices)?
        };
        assert!(size <= max_size);

        if size > 0 {
            self.advance_write(size, self.mode == Mode::Datagram);
        }
        Ok(size)
    }

    /// Call `f` with the payload at the head as up to two slices, at most
    /// `max` bytes, and consume what `f` reports having read.
    ///
    /// This is the read path every send adapter is built on. `f` sees zero
    /// slices when the buffer is empty. In [Mode::Datagram] the slices cover
    /// the next message only, and any non-zero read consumes that message
    /// whole.
    ///
    /// # Panics
    /// This function panics if the amount reported by `f` exceeds the total
    /// size of the slices.
    pub fn dequeue_vectored_with<E, F>(&mut self, max: usize, f: F) -> Result<usize, E>
    where
        F: FnOnce(&[&[u8]]) -> Result<usize, E>,
    {
        let spans = self.read_spans(max);
        let max_size = spans.len();
        let size = f(&spans.slices(&self.storage))?;
        assert!(size <= max_size);

        if size > 0 {
            self.advance_read(size);
        }
        Ok(size)
    }

    /// Copy the payload at the head into `data` without consuming it.
    ///
    /// Returns the number of bytes copied. Peeking twice without mutating
    /// the buffer in between yields the same bytes.
    #[must_use]
    pub fn peek(&self, data: &mut [u8]) -> usize {
        let spans = self.read_spans(data.len());
        spans.copy_out(&self.storage, data);
        spans.len()
    }

    /// Copy the payload at the head into `data` and consume it.
    ///
    /// A stream buffer gives up `min(data.len(), len)` bytes. A datagram
    /// buffer gives up whole messages, back to back, for as long as the next
    /// one fits in what is left of `data`. If the first message alone is
    /// longer than `data` it is truncated and the rest of it is discarded.
    /// Returns 0 once the buffer is empty.
    #[must_use]
    pub fn pop(&mut self, data: &mut [u8]) -> usize {
        if self.mode == Mode::Stream {
            let size = self.peek(data);
            if size > 0 {
                self.advance_read(size);
            }
            return size;
        }

        let mut at = 0;
        while !self.is_empty() && at < data.len() {
            if at > 0 && self.message_len() > data.len() - at {
                break;
            }
            let size = self.peek(&mut data[at..]);
            self.advance_read(size);
            at += size;
        }
        at
    }

    /// Append `data` in one piece, or not at all.
    ///
    /// With [LengthPrefix::Add] a datagram buffer stores `data` as a new
    /// message; with [LengthPrefix::Skip] the bytes are stored verbatim and
    /// must be a run of whole, non-empty framed messages. Returns the number
    /// of bytes appended, which is 0 when `data` is empty, does not fit, or
    /// is not framed.
    #[must_use]
    pub fn push(&mut self, data: &[u8], prefix: LengthPrefix) -> usize {
        let framed = self.mode == Mode::Datagram && prefix == LengthPrefix::Add;
        let overhead = if framed { DGRAM_PREFIX_LEN } else { 0 };

        if data.is_empty() {
            return 0;
        }
        if self.mode == Mode::Datagram && !framed && !is_framed(data) {
            net_debug!("ring: rejected {} bytes of broken framing", data.len());
            return 0;
        }
        if data.len() + overhead > self.room() || (framed && data.len() > u16::MAX as usize) {
            net_trace!(
                "ring: no room for {} bytes ({} free)",
                data.len(),
                self.room()
            );
            return 0;
        }

        if self.length == 0 {
            self.head = 0;
        }
        plan(
            self.capacity(),
            self.head + self.length,
            overhead,
            data.len(),
        )
        .copy_in(&mut self.storage, data);
        self.advance_write(data.len(), framed);
        data.len()
    }

    /// Return the payload at the head as one contiguous slice.
    ///
    /// A stream buffer exposes every occupied byte; a datagram buffer the
    /// payload of the next message. If the occupied region wraps past the
    /// end of the store it is first moved, framing and all, to the start of
    /// the store. Counters are not affected. If the temporary copy cannot be
    /// allocated the call fails and the buffer is left as it was.
    pub fn coalesce(&mut self) -> Result<&[u8], Error> {
        if self.head + self.length > self.capacity() {
            let mut temp = Vec::new();
            temp.try_reserve_exact(self.length)
                .map_err(|_| Error::AllocationFailed)?;
            temp.resize(self.length, 0);

            plan(self.capacity(), self.head, 0, self.length).copy_out(&self.storage, &mut temp);
            plan(self.capacity(), 0, 0, self.length).copy_in(&mut self.storage, &temp);
            self.head = 0;
            net_trace!("ring: linearized {} bytes", self.length);
        }

        let (skip, len) = self.payload_extent();
        if len == 0 {
            return Ok(&[]);
        }
        let start = self.head + skip;
        Ok(&self.storage[start..start + len])
    }
}
