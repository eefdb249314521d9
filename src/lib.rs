#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

//! The _relaybuf_ library holds the transport buffers of a protocol-sniffing
//! TCP/UDP relay.
//!
//! Before a connection is routed to a backend, the relay reads an initial
//! burst of bytes off the wire, hands it to protocol detectors, and later
//! replays those same bytes (plus anything read afterward) to the chosen
//! backend. Everything here exists to make that cheap:
//!
//! * [`storage::RingBuffer`] is a power-of-two ring that behaves either as an
//!   opaque byte stream or as a sequence of length-framed datagrams;
//! * reads and writes against it are planned as at most two spans so a single
//!   vectored system call can fill or drain it across the wrap boundary;
//! * [`peek`](storage::RingBuffer::peek) and
//!   [`coalesce`](storage::RingBuffer::coalesce) let the same bytes be
//!   inspected repeatedly by any number of [`detect::Protocol`]s.
//!
//! # The storage layer
//! The `storage` module contains the ring buffer, its scatter/gather planner
//! and the error type. It is usable without `std`; heap allocation is always
//! required, because growing and linearizing a buffer allocates.
//!
//! # The socket layer
//! The `socket` module contains the adapters that move bytes between a ring
//! buffer and the outside world: any `std::io::Read`/`Write` (feature `std`)
//! and raw Unix descriptors through `recvmsg`/`sendmsg`/`readv`/`writev`
//! (feature `io-fd`). Adapters never read the system clock; every call takes
//! the scheduler's notion of "now".
//!
//! # The detection layer
//! The `detect` module describes the contract protocol detectors follow and
//! ships one example detector for IKEv2 (feature `proto-ipsec`).
//!
//! # Configuration
//! The default buffer size is chosen at build time, either through one of the
//! `buffer-default-size-N` Cargo features or the
//! `RELAYBUF_BUFFER_DEFAULT_SIZE` environment variable.

extern crate alloc;

#[macro_use]
mod macros;

#[allow(unused)]
mod config {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub mod detect;
#[cfg(feature = "std")]
pub mod socket;
pub mod storage;
pub mod time;

pub use self::config::BUFFER_DEFAULT_SIZE;
