//! Error types for SPU parsing and decoding.

use thiserror::Error;

/// Errors produced while parsing or decoding a single SPU packet.
///
/// These are packet-scoped: callers are expected to log the error, skip the
/// offending packet, and continue with the rest of the stream.  Nothing in
/// this crate aborts a whole menu because of one bad packet.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SpuError {
    /// The packet is shorter than its fixed four-byte header.
    #[error("SPU packet too short: {len} bytes")]
    PacketTooShort {
        /// Observed packet length.
        len: usize,
    },

    /// The declared control-sequence offset points outside the packet.
    #[error("control offset {offset:#06x} outside packet of {size:#06x} bytes")]
    BadControlOffset {
        /// Declared control offset.
        offset: usize,
        /// Total packet size.
        size: usize,
    },

    /// The packet is well-formed but is not a menu overlay we can use
    /// (missing force-display flag, display rectangle, or field offsets).
    #[error("unsupported packet: {0}")]
    Unsupported(&'static str),

    /// The RLE bitmap data is corrupt.
    #[error("bitmap decode failed: {0}")]
    Decode(&'static str),
}
