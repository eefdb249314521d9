/*! Relay buffers.

The `storage` module provides the ring buffer a relay connection reads into
before it knows where the bytes are going. A buffer either carries an opaque
byte stream or a sequence of datagrams; in the latter case every message is
stored behind a 2-byte big-endian length so message boundaries survive being
packed into one ring.

Storage may be caller-provided (borrowed or owned) or allocated by the buffer
itself. Growing and linearizing a buffer always allocates.
*/

use core::fmt;

mod iovec;
mod ring_buffer;

#[cfg(test)]
mod buffer_tests;

pub use self::ring_buffer::RingBuffer;

/// Largest backing store any buffer may have, in bytes.
pub const BUFFER_MAX_SIZE: usize = 1024 * 1024 * 1024;

/// Size of the length field stored in front of every buffered datagram.
pub const DGRAM_PREFIX_LEN: usize = 2;

/// Framing of the bytes held in a [RingBuffer].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// A connection-oriented byte stream; no internal framing.
    Stream,
    /// A message-oriented transport; each message is stored behind a length.
    Datagram,
}

impl Mode {
    /// Bytes of in-buffer framing that precede each unit of payload.
    pub const fn prefix_len(self) -> usize {
        match self {
            Mode::Stream => 0,
            Mode::Datagram => DGRAM_PREFIX_LEN,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Stream => write!(f, "stream"),
            Mode::Datagram => write!(f, "datagram"),
        }
    }
}

/// Whether [RingBuffer::push] frames the pushed bytes as a new datagram.
///
/// Ignored by stream buffers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LengthPrefix {
    /// Store a length in front of the bytes, making them one message.
    Add,
    /// Store the bytes as they are; they already carry their own framing.
    Skip,
}

/// Error returned when creating, growing or linearizing a buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The requested capacity is not a power of two.
    InvalidCapacity,
    /// The requested capacity is above [BUFFER_MAX_SIZE].
    CapacityExceeded,
    /// The requested capacity cannot hold the bytes already buffered.
    CapacityTooSmall,
    /// The backing store or a temporary copy could not be allocated.
    AllocationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidCapacity => write!(f, "capacity is not a power of two"),
            Error::CapacityExceeded => write!(f, "capacity exceeds {BUFFER_MAX_SIZE} bytes"),
            Error::CapacityTooSmall => write!(f, "capacity too small for buffered data"),
            Error::AllocationFailed => write!(f, "allocation failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
