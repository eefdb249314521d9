use std::io::{self, Read, Write};

use super::{io_slices, io_slices_mut, would_block};
use crate::storage::RingBuffer;
use crate::time::Instant;

impl<'a> RingBuffer<'a> {
    /// Fill the buffer with one `read_vectored` call on `reader`.
    ///
    /// Returns the number of payload bytes read. `Ok(0)` is passed through
    /// as the reader reported it, which for a stream means end of file.
    /// In datagram mode whatever the call returns is stored as one message.
    pub fn read_from<R>(&mut self, reader: &mut R, now: Instant) -> io::Result<usize>
    where
        R: Read + ?Sized,
    {
        let size = self.enqueue_vectored_with(|spans| {
            if spans.is_empty() {
                net_trace!("socket: no room to read into");
                return Err(would_block());
            }
            reader.read_vectored(&mut io_slices_mut(spans))
        })?;

        net_trace!("socket: read {} bytes", size);
        self.mark_recv(now);
        Ok(size)
    }

    /// Drain the buffer with one `write_vectored` call on `writer`.
    ///
    /// Returns the number of payload bytes written. In datagram mode only the
    /// message at the head is offered, and it is consumed whole once any of
    /// it has been written.
    pub fn write_to<W>(&mut self, writer: &mut W, now: Instant) -> io::Result<usize>
    where
        W: Write + ?Sized,
    {
        let size = self.dequeue_vectored_with(usize::MAX, |spans| {
            if spans.is_empty() {
                net_trace!("socket: nothing to write");
                return Err(would_block());
            }
            writer.write_vectored(&io_slices(spans))
        })?;

        net_trace!("socket: wrote {} bytes", size);
        self.mark_send(now);
        Ok(size)
    }
}
