//! Packetized Elementary Stream packets nested inside the Program Stream.
//!
//! See the [PES header documentation][PES] for the wire layout.
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

use std::fmt;

use nom::{
    bytes::complete::{tag, take},
    error::{Error, ErrorKind},
    number::complete::{be_u16, be_u8},
    IResult,
};

use crate::util::BytesPreview;

/// Stream ID of private stream 1, the stream class that carries SPU data.
pub const PRIVATE_STREAM_1: u8 = 0xBD;

/// First substream ID of the sub-picture range.
pub const SPU_SUBSTREAM_FIRST: u8 = 0x20;

/// Last substream ID of the sub-picture range.
pub const SPU_SUBSTREAM_LAST: u8 = 0x3F;

/// One PES packet, parsed just deeply enough for demuxing.
///
/// Menus are static overlays, so the PTS/DTS header fields that subtitle
/// decoders need are deliberately not parsed here; the header-data block is
/// skipped as a unit using its length byte.
#[derive(PartialEq, Eq)]
pub struct Packet<'a> {
    /// The PES stream ID (`0xBD` for private stream 1, `0xE0..=0xEF` for
    /// video, and so on).
    pub stream_id: u8,
    /// For private stream 1, the substream ID read from the first payload
    /// byte.  `None` for every other stream class.
    pub substream_id: Option<u8>,
    /// The payload.  For private stream 1 this excludes the PES header data
    /// and the substream ID byte; for skipped stream classes it is the raw
    /// packet body.
    pub data: &'a [u8],
}

impl fmt::Debug for Packet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("stream_id", &format_args!("{:#04x}", self.stream_id))
            .field("substream_id", &self.substream_id)
            .field("data", &BytesPreview(self.data))
            .finish()
    }
}

/// Is this substream ID in the SPU range?
pub fn is_spu_substream(substream_id: u8) -> bool {
    (SPU_SUBSTREAM_FIRST..=SPU_SUBSTREAM_LAST).contains(&substream_id)
}

/// Parse the payload of a private-stream-1 packet: two flag bytes, a
/// header-data block skipped by its length byte, then the substream ID.
fn private_payload(body: &[u8]) -> IResult<&[u8], (u8, &[u8])> {
    let (rest, flags) = take(2usize)(body)?;
    // MPEG-2 PES headers carry a 0b10 marker at the top of the first flag
    // byte; anything else is an MPEG-1 packet or garbage.
    if flags[0] >> 6 != 0b10 {
        return Err(nom::Err::Error(Error::new(body, ErrorKind::Tag)));
    }
    let (rest, header_len) = be_u8(rest)?;
    let (rest, _header_data) = take(usize::from(header_len))(rest)?;
    let (payload, substream_id) = be_u8(rest)?;
    Ok((&[], (substream_id, payload)))
}

/// Parse one PES packet starting at its `00 00 01 <id>` start code.
///
/// The packet body is always consumed by its declared length, so the caller
/// can keep walking the stream even for stream classes we don't understand.
pub fn packet(input: &[u8]) -> IResult<&[u8], Packet<'_>> {
    let (input, _) = tag(&[0x00, 0x00, 0x01][..])(input)?;
    let (input, stream_id) = be_u8(input)?;
    let (input, len) = be_u16(input)?;
    let (input, body) = take(usize::from(len))(input)?;
    if stream_id == PRIVATE_STREAM_1 {
        let (_, (substream_id, data)) = private_payload(body)?;
        Ok((
            input,
            Packet {
                stream_id,
                substream_id: Some(substream_id),
                data,
            },
        ))
    } else {
        Ok((
            input,
            Packet {
                stream_id,
                substream_id: None,
                data: body,
            },
        ))
    }
}
