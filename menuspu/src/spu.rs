//! SPU packet reassembly and control-sequence parsing.
//!
//! A single SPU packet is usually split across several PES packets, so the
//! first job here is gluing fragments back together per substream.  Packets
//! are yielded in *disc order*: the order in which each packet's final
//! fragment appears in the file.  Downstream page matching relies on this
//! order and nothing here may reorder packets.
//!
//! For the control-sequence layout, see [this description of the DVD
//! sub-picture format][spu].
//!
//! [spu]: http://sam.zoy.org/writings/dvd/subtitles/

use std::collections::VecDeque;
use std::fmt;

use log::{debug, trace};

use crate::errors::SpuError;
use crate::geom::Rect;
use crate::mpeg2::ps::{fragments, Fragment, Fragments};
use crate::rle::{decode_bitmap, Bitmap};
use crate::util::BytesPreview;

/// Nominal PAL frame width; SPU display rectangles never extend past it.
pub const FRAME_WIDTH: u32 = 720;

/// Nominal PAL frame height.
pub const FRAME_HEIGHT: u32 = 576;

/// Number of SPU substreams (`0x20..=0x3F`).
const SUBSTREAM_COUNT: usize = 32;

/// Read a big-endian `u16` at `offset`.  Callers must bounds-check first.
fn read_u16(data: &[u8], offset: usize) -> usize {
    usize::from(data[offset]) << 8 | usize::from(data[offset + 1])
}

/// A complete, size-prefixed SPU packet.
#[derive(Clone, PartialEq, Eq)]
pub struct SpuPacket {
    /// The substream this packet was carried on.
    pub substream_id: u8,
    raw: Vec<u8>,
}

impl SpuPacket {
    /// The raw packet bytes, starting at the two-byte size header.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The total packet size.  Always equal to `raw().len()`.
    pub fn total_size(&self) -> usize {
        self.raw.len()
    }

    /// The declared control-sequence offset.
    pub fn control_offset(&self) -> usize {
        read_u16(&self.raw, 2)
    }

    /// Parse this packet's control sequence.
    pub fn parse_control(&self) -> Result<SpuControl, SpuError> {
        parse_control(&self.raw)
    }

    /// Parse the control sequence and decode the RLE bitmap in one step.
    pub fn decode(&self) -> Result<(SpuControl, Bitmap), SpuError> {
        let control = parse_control(&self.raw)?;
        let bitmap = decode_bitmap(&self.raw, &control)?;
        Ok((control, bitmap))
    }
}

impl fmt::Debug for SpuPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SpuPacket")
            .field("substream_id", &format_args!("{:#04x}", self.substream_id))
            .field("raw", &BytesPreview(&self.raw))
            .finish()
    }
}

/// An iterator yielding complete SPU packets in disc order.
pub struct SpuPackets<'a> {
    fragments: Fragments<'a>,
    /// Per-substream reassembly buffers, indexed by `substream_id - 0x20`.
    buffers: Vec<Vec<u8>>,
    ready: VecDeque<SpuPacket>,
    exhausted: bool,
}

impl SpuPackets<'_> {
    /// Append one fragment to its substream buffer and move any packets it
    /// completed to the ready queue.  One fragment may finish a packet and
    /// begin one or more new ones.
    fn absorb(&mut self, fragment: Fragment) {
        let index = usize::from(fragment.substream_id - 0x20);
        let buffer = &mut self.buffers[index];
        buffer.extend_from_slice(fragment.data);

        while buffer.len() >= 2 {
            let declared = read_u16(buffer, 0);
            if declared < 4 {
                debug!(
                    "substream {:#04x}: bogus packet size {}, discarding buffer",
                    fragment.substream_id, declared
                );
                buffer.clear();
                break;
            }
            if buffer.len() < declared {
                break;
            }
            let rest = buffer.split_off(declared);
            let raw = std::mem::replace(buffer, rest);
            let control_offset = read_u16(&raw, 2);
            if control_offset < 4 || control_offset >= declared {
                debug!(
                    "substream {:#04x}: control offset {:#06x} outside packet \
                     of {:#06x} bytes, dropping",
                    fragment.substream_id, control_offset, declared
                );
                continue;
            }
            let packet = SpuPacket {
                substream_id: fragment.substream_id,
                raw,
            };
            trace!("reassembled {:?}", packet);
            self.ready.push_back(packet);
        }
    }

    /// Log any half-assembled packets left over at end of input.
    fn drain_leftovers(&mut self) {
        for (index, buffer) in self.buffers.iter_mut().enumerate() {
            if !buffer.is_empty() {
                debug!(
                    "substream {:#04x}: dropping {} buffered bytes at end of stream",
                    0x20 + index,
                    buffer.len()
                );
                buffer.clear();
            }
        }
    }
}

impl Iterator for SpuPackets<'_> {
    type Item = SpuPacket;

    fn next(&mut self) -> Option<SpuPacket> {
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Some(packet);
            }
            if self.exhausted {
                return None;
            }
            match self.fragments.next() {
                Some(fragment) => self.absorb(fragment),
                None => {
                    self.drain_leftovers();
                    self.exhausted = true;
                }
            }
        }
    }
}

/// Demux a Program Stream buffer and reassemble its SPU packets.
pub fn spu_packets(input: &[u8]) -> SpuPackets {
    SpuPackets {
        fragments: fragments(input),
        buffers: vec![Vec::new(); SUBSTREAM_COUNT],
        ready: VecDeque::new(),
        exhausted: false,
    }
}

/// Parsed control data for one SPU packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpuControl {
    /// The display rectangle in frame coordinates.
    pub rect: Rect,
    /// Byte offsets of the two interlaced RLE fields within the packet.
    pub field_offsets: [usize; 2],
    /// Whether the force-display command (`0x00`) was present.  Menu
    /// overlays always carry it; subtitles usually don't.
    pub is_menu: bool,
    /// 4-bit palette indices from command `0x03`, if present.
    pub palette: Option<[u8; 4]>,
    /// 4-bit alpha values from command `0x04`, if present.
    pub alpha: Option<[u8; 4]>,
}

/// Split two bytes into four 4-bit entries, as used by the palette and
/// alpha commands.
fn nibble_entries(bytes: &[u8]) -> [u8; 4] {
    [
        bytes[0] >> 4,
        bytes[0] & 0x0F,
        bytes[1] >> 4,
        bytes[1] & 0x0F,
    ]
}

/// Parse the control sequence of a complete SPU packet.
///
/// Walks the chain of date-delayed sub-sequences, collecting the display
/// rectangle, field offsets and flags.  Returns `SpuError::Unsupported` for
/// packets that decode but cannot be used as menu overlays.
pub fn parse_control(packet: &[u8]) -> Result<SpuControl, SpuError> {
    if packet.len() < 4 {
        return Err(SpuError::PacketTooShort { len: packet.len() });
    }
    let size = packet.len();
    let control_offset = read_u16(packet, 2);
    if control_offset < 4 || control_offset >= size {
        return Err(SpuError::BadControlOffset {
            offset: control_offset,
            size,
        });
    }

    let mut is_menu = false;
    let mut rect: Option<Rect> = None;
    let mut field_offsets: Option<[usize; 2]> = None;
    let mut palette = None;
    let mut alpha = None;

    let mut seq_start = control_offset;
    loop {
        if seq_start + 4 > size {
            return Err(SpuError::Unsupported("truncated control sub-sequence"));
        }
        // Two bytes of delay we don't need (menus are static), then the
        // offset of the next sub-sequence.
        let next = read_u16(packet, seq_start + 2);
        let mut pos = seq_start + 4;

        'commands: while pos < size {
            let cmd = packet[pos];
            pos += 1;
            match cmd {
                0x00 => is_menu = true,
                0x01 | 0x02 => {
                    // Display start/stop dates; irrelevant for menus.
                }
                0x03 => {
                    if pos + 2 > size {
                        return Err(SpuError::Unsupported("truncated palette command"));
                    }
                    palette = palette.or_else(|| Some(nibble_entries(&packet[pos..pos + 2])));
                    pos += 2;
                }
                0x04 => {
                    if pos + 2 > size {
                        return Err(SpuError::Unsupported("truncated alpha command"));
                    }
                    alpha = alpha.or_else(|| Some(nibble_entries(&packet[pos..pos + 2])));
                    pos += 2;
                }
                0x05 => {
                    if pos + 6 > size {
                        return Err(SpuError::Unsupported("truncated coordinates command"));
                    }
                    let b = &packet[pos..pos + 6];
                    let x1 = u32::from(b[0]) << 4 | u32::from(b[1]) >> 4;
                    let x2 = u32::from(b[1] & 0x0F) << 8 | u32::from(b[2]);
                    let y1 = u32::from(b[3]) << 4 | u32::from(b[4]) >> 4;
                    let y2 = u32::from(b[4] & 0x0F) << 8 | u32::from(b[5]);
                    if x2 < x1 || y2 < y1 {
                        return Err(SpuError::Unsupported("empty display rectangle"));
                    }
                    if x2 >= FRAME_WIDTH || y2 >= FRAME_HEIGHT {
                        return Err(SpuError::Unsupported("display rectangle out of range"));
                    }
                    rect = rect.or_else(|| Some(Rect::new(x1, y1, x2, y2)));
                    pos += 6;
                }
                0x06 => {
                    if pos + 4 > size {
                        return Err(SpuError::Unsupported("truncated field-offset command"));
                    }
                    field_offsets = field_offsets
                        .or_else(|| Some([read_u16(packet, pos), read_u16(packet, pos + 2)]));
                    pos += 4;
                }
                0xFF => break 'commands,
                other => {
                    trace!("unknown control command {:#04x}, ending sub-sequence", other);
                    break 'commands;
                }
            }
        }

        if next == seq_start {
            // The last sub-sequence points back at itself.
            break;
        }
        if next < seq_start {
            return Err(SpuError::Unsupported("control chain went backwards"));
        }
        if next >= size {
            return Err(SpuError::Unsupported("control chain points past packet"));
        }
        seq_start = next;
    }

    if !is_menu {
        return Err(SpuError::Unsupported("no force-display flag (not a menu)"));
    }
    let rect = rect.ok_or(SpuError::Unsupported("no display rectangle"))?;
    let field_offsets = field_offsets.ok_or(SpuError::Unsupported("no bitmap field offsets"))?;
    if field_offsets[0] < 4
        || field_offsets[0] > field_offsets[1]
        || field_offsets[1] >= control_offset
    {
        return Err(SpuError::Unsupported("field offsets outside bitmap data"));
    }

    Ok(SpuControl {
        rect,
        field_offsets,
        is_menu,
        palette,
        alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpeg2::ps::PACK_START_CODE;

    /// Build a minimal menu control sequence for a packet of `size` bytes
    /// with bitmap fields at the given offsets.
    fn control_bytes(
        control_offset: usize,
        rect: (u32, u32, u32, u32),
        offsets: [u16; 2],
        menu: bool,
    ) -> Vec<u8> {
        let (x1, y1, x2, y2) = rect;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0x00, 0x00]); // delay
        bytes.extend_from_slice(&(control_offset as u16).to_be_bytes()); // last
        if menu {
            bytes.push(0x00);
        }
        bytes.push(0x05);
        bytes.push((x1 >> 4) as u8);
        bytes.push(((x1 & 0x0F) << 4 | x2 >> 8) as u8);
        bytes.push((x2 & 0xFF) as u8);
        bytes.push((y1 >> 4) as u8);
        bytes.push(((y1 & 0x0F) << 4 | y2 >> 8) as u8);
        bytes.push((y2 & 0xFF) as u8);
        bytes.push(0x06);
        bytes.extend_from_slice(&offsets[0].to_be_bytes());
        bytes.extend_from_slice(&offsets[1].to_be_bytes());
        bytes.push(0xFF);
        bytes
    }

    /// Build a complete packet: size header, `bitmap` bytes, control bytes.
    fn packet_bytes(bitmap: &[u8], rect: (u32, u32, u32, u32), menu: bool) -> Vec<u8> {
        let control_offset = 4 + bitmap.len();
        let control = control_bytes(control_offset, rect, [4, 4], menu);
        let total = control_offset + control.len();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(total as u16).to_be_bytes());
        bytes.extend_from_slice(&(control_offset as u16).to_be_bytes());
        bytes.extend_from_slice(bitmap);
        bytes.extend_from_slice(&control);
        bytes
    }

    #[test]
    fn parse_minimal_menu_control() {
        let packet = packet_bytes(&[0x00; 8], (150, 176, 262, 265), true);
        let control = parse_control(&packet).unwrap();
        assert!(control.is_menu);
        assert_eq!(control.rect, Rect::new(150, 176, 262, 265));
        assert_eq!(control.field_offsets, [4, 4]);
        assert_eq!(control.palette, None);
    }

    #[test]
    fn parse_palette_and_alpha() {
        // delay, next=self, force, palette, alpha, coords, offsets, end.
        let bitmap = [0u8; 4];
        let control_offset = 4 + bitmap.len();
        let mut control = Vec::new();
        control.extend_from_slice(&[0x00, 0x00]);
        control.extend_from_slice(&(control_offset as u16).to_be_bytes());
        control.push(0x00);
        control.extend_from_slice(&[0x03, 0x03, 0x10]);
        control.extend_from_slice(&[0x04, 0xFF, 0xF0]);
        control.extend_from_slice(&[0x05, 0x00, 0x00, 0x9F, 0x00, 0x00, 0x3F]);
        control.extend_from_slice(&[0x06, 0x00, 0x04, 0x00, 0x06]);
        control.push(0xFF);
        let total = control_offset + control.len();
        let mut packet = Vec::new();
        packet.extend_from_slice(&(total as u16).to_be_bytes());
        packet.extend_from_slice(&(control_offset as u16).to_be_bytes());
        packet.extend_from_slice(&bitmap);
        packet.extend_from_slice(&control);

        let control = parse_control(&packet).unwrap();
        assert_eq!(control.palette, Some([0x0, 0x3, 0x1, 0x0]));
        assert_eq!(control.alpha, Some([0xF, 0xF, 0xF, 0x0]));
        assert_eq!(control.rect, Rect::new(0, 0, 159, 63));
        assert_eq!(control.field_offsets, [4, 6]);
    }

    #[test]
    fn reject_subtitle_packet() {
        let packet = packet_bytes(&[0x00; 8], (0, 0, 10, 10), false);
        assert_eq!(
            parse_control(&packet),
            Err(SpuError::Unsupported("no force-display flag (not a menu)"))
        );
    }

    #[test]
    fn reject_out_of_range_rectangle() {
        let packet = packet_bytes(&[0x00; 8], (0, 0, 720, 10), true);
        assert!(matches!(
            parse_control(&packet),
            Err(SpuError::Unsupported("display rectangle out of range"))
        ));
    }

    #[test]
    fn reject_bad_control_offset() {
        let packet = [0x00, 0x04, 0x00, 0x04];
        assert_eq!(
            parse_control(&packet),
            Err(SpuError::BadControlOffset { offset: 4, size: 4 })
        );
    }

    /// Wrap a payload in a private-stream-1 PES packet inside a pack.
    fn wrap_fragment(substream_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = PACK_START_CODE.to_vec();
        bytes.extend_from_slice(&[0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x01, 0xBD]);
        let len = 4 + payload.len();
        bytes.extend_from_slice(&(len as u16).to_be_bytes());
        bytes.extend_from_slice(&[0x81, 0x00, 0x00]);
        bytes.push(substream_id);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn reassemble_fragmented_packets() {
        // Two packets of 3990 and 3000 bytes delivered as four fragments of
        // 2016 + 1974 + 2016 + 984 bytes.
        let mut first = vec![0u8; 3990];
        first[0..2].copy_from_slice(&3990u16.to_be_bytes());
        first[2..4].copy_from_slice(&3900u16.to_be_bytes());
        let mut second = vec![0u8; 3000];
        second[0..2].copy_from_slice(&3000u16.to_be_bytes());
        second[2..4].copy_from_slice(&2900u16.to_be_bytes());

        let mut joined = first.clone();
        joined.extend_from_slice(&second);
        let mut stream = Vec::new();
        let mut offset = 0;
        for chunk in [2016usize, 1974, 2016, 984] {
            stream.extend_from_slice(&wrap_fragment(0x20, &joined[offset..offset + chunk]));
            offset += chunk;
        }
        assert_eq!(offset, joined.len());

        let packets: Vec<_> = spu_packets(&stream).collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].total_size(), 3990);
        assert_eq!(packets[1].total_size(), 3000);
        assert_eq!(packets[0].raw(), &first[..]);
        assert_eq!(packets[1].raw(), &second[..]);
    }

    #[test]
    fn one_fragment_may_finish_and_begin_packets() {
        let mut a = vec![0u8; 20];
        a[0..2].copy_from_slice(&20u16.to_be_bytes());
        a[2..4].copy_from_slice(&16u16.to_be_bytes());
        let mut b = vec![0u8; 12];
        b[0..2].copy_from_slice(&12u16.to_be_bytes());
        b[2..4].copy_from_slice(&8u16.to_be_bytes());

        let mut joined = a.clone();
        joined.extend_from_slice(&b);
        // Fragment 1 carries most of packet A; fragment 2 finishes A and
        // carries all of B.
        let mut stream = wrap_fragment(0x20, &joined[..10]);
        stream.extend_from_slice(&wrap_fragment(0x20, &joined[10..]));

        let packets: Vec<_> = spu_packets(&stream).collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].raw(), &a[..]);
        assert_eq!(packets[1].raw(), &b[..]);
    }

    #[test]
    fn incomplete_packet_is_dropped() {
        let mut a = vec![0u8; 100];
        a[0..2].copy_from_slice(&200u16.to_be_bytes());
        let stream = wrap_fragment(0x20, &a);
        assert_eq!(spu_packets(&stream).count(), 0);
    }

    #[test]
    fn reassembly_concatenation_round_trip() {
        // The concatenation of all yielded packets equals the SPU byte
        // stream carried by the fragments.
        let mut a = vec![0x11u8; 64];
        a[0..2].copy_from_slice(&64u16.to_be_bytes());
        a[2..4].copy_from_slice(&60u16.to_be_bytes());
        let mut b = vec![0x22u8; 48];
        b[0..2].copy_from_slice(&48u16.to_be_bytes());
        b[2..4].copy_from_slice(&44u16.to_be_bytes());
        let mut joined = a.clone();
        joined.extend_from_slice(&b);

        let mut stream = Vec::new();
        for chunk in joined.chunks(30) {
            stream.extend_from_slice(&wrap_fragment(0x2A, chunk));
        }
        let rebuilt: Vec<u8> = spu_packets(&stream)
            .flat_map(|p| p.raw().to_vec())
            .collect();
        assert_eq!(rebuilt, joined);
    }
}
