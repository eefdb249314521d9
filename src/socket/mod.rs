/*! Moving bytes between buffers and the outside world.

The `socket` module deals with *transfers*. It provides adapters that fill a
[RingBuffer] from a source and drain it into a sink, each with exactly one
vectored call across the (at most two) spans the buffer exposes.

The programming interface implemented here is deliberately thin: adapters
never retry, never block on their own, and never interpret the error of the
underlying transport. When the buffer has no room, or nothing to send, they
report [WouldBlock] without touching the transport at all, so the event loop
can treat backpressure exactly like a socket that is not ready yet.

Every adapter takes the event loop's current [Instant] and records it as the
buffer's last receive or send time once the transfer call succeeds.

[RingBuffer]: ../storage/struct.RingBuffer.html
[WouldBlock]: https://doc.rust-lang.org/std/io/enum.ErrorKind.html#variant.WouldBlock
[Instant]: ../time/struct.Instant.html
*/

use std::io::{self, IoSlice, IoSliceMut};

#[cfg(all(unix, feature = "io-fd"))]
pub mod fd;
mod stream;

#[cfg(all(unix, feature = "io-fd"))]
pub use self::fd::MsgFlags;

/// Error returned instead of calling into the transport.
fn would_block() -> io::Error {
    io::Error::from(io::ErrorKind::WouldBlock)
}

fn io_slices<'s>(spans: &'s [&[u8]]) -> heapless::Vec<IoSlice<'s>, 2> {
    spans.iter().map(|span| IoSlice::new(span)).collect()
}

fn io_slices_mut<'s>(spans: &'s mut [&mut [u8]]) -> heapless::Vec<IoSliceMut<'s>, 2> {
    spans.iter_mut().map(|span| IoSliceMut::new(span)).collect()
}
