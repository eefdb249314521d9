//! IKEv2 and ESP-in-UDP.
//!
//! Traffic on the IKE port starts with a 4-byte marker. A non-zero marker is
//! the SPI of an ESP packet encapsulated in UDP; a zero marker is followed by
//! an IKEv2 header, which has to open an `IKE_SA_INIT` exchange.

use super::{Detection, Protocol};
use crate::storage::Mode;

const MARKER_LEN: usize = 4;
const HEADER_LEN: usize = MARKER_LEN + 22;

// Header fields, relative to the end of the marker.
const FIELD_NEXT_PAYLOAD: usize = 16;
const FIELD_VERSION: usize = 17;
const FIELD_EXCHANGE_TYPE: usize = 18;

const NEXT_PAYLOAD_SA: u8 = 0x21;
const VERSION_2_0: u8 = 0x20;
const EXCHANGE_IKE_SA_INIT: u8 = 0x22;

/// Status of a header that does not open an IKEv2 `IKE_SA_INIT` exchange.
pub const INVALID_PAYLOAD: i32 = -4;

/// Detector for IPsec key exchange and ESP traffic on UDP port 500.
///
/// IKE carries no host name, so a match never names a backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ipsec;

impl Protocol for Ipsec {
    fn name(&self) -> &'static str {
        "ipsec"
    }

    fn default_port(&self) -> u16 {
        500
    }

    fn mode(&self) -> Mode {
        Mode::Datagram
    }

    fn parse(&self, data: &[u8]) -> Detection {
        if data.len() < MARKER_LEN {
            return Detection::Incomplete;
        }
        if data[..MARKER_LEN] != [0; MARKER_LEN] {
            return Detection::Match { hostname: None };
        }
        if data.len() < HEADER_LEN {
            return Detection::Incomplete;
        }

        let header = &data[MARKER_LEN..];
        if header[FIELD_NEXT_PAYLOAD] != NEXT_PAYLOAD_SA
            || header[FIELD_VERSION] != VERSION_2_0
            || header[FIELD_EXCHANGE_TYPE] != EXCHANGE_IKE_SA_INIT
        {
            return Detection::Mismatch(INVALID_PAYLOAD);
        }
        Detection::Match { hostname: None }
    }
}
