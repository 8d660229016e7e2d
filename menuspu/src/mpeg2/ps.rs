//! MPEG-2 Program Streams, the container format of menu VOBs.
//!
//! The only structure we pull out of the container is the sequence of SPU
//! payload fragments, in file order.  Parsing is deliberately forgiving:
//! home-authored discs are full of truncated packs and stray bytes, and a
//! demuxer that gives up on the first oddity recovers nothing.

use log::{debug, trace};
use nom::{
    bytes::complete::{tag, take},
    error::{Error, ErrorKind},
    IResult,
};

use super::pes;
use crate::util::BytesPreview;

/// The pack start code, `00 00 01 BA`.
pub const PACK_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xBA];

/// The program end code, `00 00 01 B9`.
const PROGRAM_END_CODE: u8 = 0xB9;

/// Parse an MPEG-2 pack header: start code, ten header bytes, stuffing.
///
/// The SCR and mux rate inside the header are irrelevant for static menu
/// overlays, so the header body is validated but not decoded.
pub fn pack_header(input: &[u8]) -> IResult<&[u8], ()> {
    let (input, _) = tag(&PACK_START_CODE[..])(input)?;
    let (input, body) = take(10usize)(input)?;
    // MPEG-2 packs carry a 0b01 marker in the top bits; MPEG-1 packs
    // (0b0010) use a shorter layout we don't support.
    if body[0] >> 6 != 0b01 {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let stuffing = usize::from(body[9] & 0x07);
    let (input, _) = take(stuffing)(input)?;
    Ok((input, ()))
}

/// One SPU payload fragment, as carried by a single private-stream-1 PES
/// packet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// SPU substream ID, in `0x20..=0x3F`.
    pub substream_id: u8,
    /// Payload bytes, excluding the substream ID byte.
    pub data: &'a [u8],
}

impl std::fmt::Debug for Fragment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("substream_id", &format_args!("{:#04x}", self.substream_id))
            .field("data", &BytesPreview(self.data))
            .finish()
    }
}

/// An iterator over the SPU payload fragments of a Program Stream.
///
/// Malformed input never aborts the iteration: bad units are skipped with a
/// debug log of the byte offset, and a truncated final pack simply ends the
/// sequence.
pub struct Fragments<'a> {
    remaining: &'a [u8],
    /// Absolute offset of `remaining[0]` in the original buffer, for logs.
    offset: usize,
}

impl<'a> Fragments<'a> {
    /// Consume `n` bytes of input.
    fn advance(&mut self, n: usize) {
        self.remaining = &self.remaining[n..];
        self.offset += n;
    }

    /// Consume input up to the suffix slice returned by a nom parser.
    fn advance_to(&mut self, rest: &'a [u8]) {
        let n = self.remaining.len() - rest.len();
        self.advance(n);
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Fragment<'a>> {
        loop {
            // Find the next start code prefix, resyncing if necessary.
            let start = self
                .remaining
                .windows(3)
                .position(|w| w == [0x00, 0x00, 0x01]);
            let Some(start) = start else {
                trace!("reached end of program stream");
                self.remaining = &[];
                return None;
            };
            if start > 0 {
                debug!("resync: skipped {} bytes at offset {:#x}", start, self.offset);
                self.advance(start);
            }
            if self.remaining.len() < 4 {
                trace!("truncated start code at offset {:#x}", self.offset);
                self.remaining = &[];
                return None;
            }

            match self.remaining[3] {
                0xBA => {
                    // Pack header.  Too short to hold one => truncated tail.
                    if self.remaining.len() < 14 {
                        debug!("truncated pack header at offset {:#x}", self.offset);
                        self.remaining = &[];
                        return None;
                    }
                    match pack_header(self.remaining) {
                        Ok((rest, ())) => self.advance_to(rest),
                        Err(_) => {
                            debug!("resync: bad pack header at offset {:#x}", self.offset);
                            self.advance(4);
                        }
                    }
                }
                PROGRAM_END_CODE => {
                    self.advance(4);
                }
                0xBB..=0xFF => {
                    // A PES-style unit with a length field.
                    if self.remaining.len() < 6 {
                        debug!("truncated PES header at offset {:#x}", self.offset);
                        self.remaining = &[];
                        return None;
                    }
                    let len =
                        usize::from(self.remaining[4]) << 8 | usize::from(self.remaining[5]);
                    let total = 6 + len;
                    if self.remaining.len() < total {
                        debug!(
                            "truncated PES packet at offset {:#x}: \
                             declared {} bytes, {} available",
                            self.offset,
                            total,
                            self.remaining.len()
                        );
                        self.remaining = &[];
                        return None;
                    }
                    match pes::packet(self.remaining) {
                        Ok((rest, pkt)) => {
                            let fragment = match pkt.substream_id {
                                Some(id) if pes::is_spu_substream(id) => Some(Fragment {
                                    substream_id: id,
                                    data: pkt.data,
                                }),
                                Some(id) => {
                                    trace!("skipping non-SPU substream {:#04x}", id);
                                    None
                                }
                                None => {
                                    trace!("skipping stream {:#04x}", pkt.stream_id);
                                    None
                                }
                            };
                            self.advance_to(rest);
                            if let Some(fragment) = fragment {
                                trace!("demuxed {:?}", fragment);
                                return Some(fragment);
                            }
                        }
                        Err(_) => {
                            // The framing length is trustworthy even when
                            // the inner payload isn't; skip the whole unit.
                            debug!(
                                "resync: unparseable PES packet at offset {:#x}",
                                self.offset
                            );
                            self.advance(total);
                        }
                    }
                }
                other => {
                    // An elementary-stream start code at pack level; this
                    // only happens when we resynced into the middle of a
                    // payload.
                    trace!(
                        "skipping elementary start code {:#04x} at offset {:#x}",
                        other,
                        self.offset
                    );
                    self.advance(4);
                }
            }
        }
    }
}

/// Iterate over the SPU payload fragments of a Program Stream buffer.
pub fn fragments(input: &[u8]) -> Fragments {
    Fragments {
        remaining: input,
        offset: 0,
    }
}
