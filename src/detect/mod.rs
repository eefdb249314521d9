/*! Protocol detection.

A relay does not know where a connection is going until it has looked at
the first bytes the client sent. The `detect` module describes the detectors
that do the looking: each one claims a protocol, a default port and a
buffer [Mode], and classifies a contiguous view of buffered bytes as a
[Detection].

Detectors never consume anything. [probe] linearizes the buffer with
[coalesce] and hands the view over, so any number of detectors can be tried
against the same bytes, and the bytes are still there to be replayed to
whichever backend wins.

[coalesce]: ../storage/struct.RingBuffer.html#method.coalesce
*/

use alloc::string::String;
use core::fmt;

use crate::storage::{Error, Mode, RingBuffer};

#[cfg(feature = "proto-ipsec")]
pub mod ipsec;

#[cfg(feature = "proto-ipsec")]
pub use self::ipsec::Ipsec;

/// Status of a positive match.
pub const STATUS_MATCH: i32 = 0;

/// Status of a view too short to decide on.
pub const STATUS_INCOMPLETE: i32 = -1;

/// Status reported by [probe] when the detector expects a buffer of the
/// other mode. No detector uses it for its own verdicts.
pub const MODE_MISMATCH: i32 = -128;

/// Verdict of a detector on a view of buffered bytes.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Detection {
    /// The bytes belong to this protocol. Some protocols name the host the
    /// client wants to reach.
    Match { hostname: Option<String> },
    /// More bytes are needed.
    Incomplete,
    /// The bytes do not belong to this protocol. The code is
    /// detector-specific, negative and below [STATUS_INCOMPLETE].
    Mismatch(i32),
}

impl Detection {
    /// Integer form of the verdict: 0 on a match, -1 when incomplete, the
    /// detector's own code otherwise.
    pub fn status(&self) -> i32 {
        match self {
            Detection::Match { .. } => STATUS_MATCH,
            Detection::Incomplete => STATUS_INCOMPLETE,
            Detection::Mismatch(code) => *code,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Detection::Match { .. })
    }

    /// The host name extracted on a match, if any.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            Detection::Match { hostname } => hostname.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Detection::Match { hostname: Some(name) } => write!(f, "match ({name})"),
            Detection::Match { hostname: None } => write!(f, "match"),
            Detection::Incomplete => write!(f, "incomplete"),
            Detection::Mismatch(code) => write!(f, "mismatch ({code})"),
        }
    }
}

/// A protocol detector.
pub trait Protocol {
    /// Short lowercase name, as used in configuration.
    fn name(&self) -> &'static str;

    /// Port the protocol is usually served on.
    fn default_port(&self) -> u16;

    /// Framing of the buffers this detector can classify.
    fn mode(&self) -> Mode;

    /// Bytes to send back to a client before rejecting its connection.
    fn abort_message(&self) -> Option<&'static [u8]> {
        None
    }

    /// Classify `data`, the bytes buffered so far.
    ///
    /// For a datagram protocol `data` is the payload of one message.
    fn parse(&self, data: &[u8]) -> Detection;
}

/// Run `protocol` against the bytes at the head of `buffer`.
///
/// The buffer may be linearized, but its contents and counters are left as
/// they were. Fails only if linearizing it fails.
pub fn probe(buffer: &mut RingBuffer<'_>, protocol: &dyn Protocol) -> Result<Detection, Error> {
    if protocol.mode() != buffer.mode() {
        net_debug!(
            "detect: {} needs a {} buffer, not {}",
            protocol.name(),
            protocol.mode(),
            buffer.mode()
        );
        return Ok(Detection::Mismatch(MODE_MISMATCH));
    }

    let detection = protocol.parse(buffer.coalesce()?);
    net_debug!(
        "detect: {} status {}",
        protocol.name(),
        detection.status()
    );
    Ok(detection)
}
