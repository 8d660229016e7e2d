//! This crate decodes the Sub-Picture Units (SPU) carried by DVD menu VOBs.
//!
//! DVD menus draw their buttons as RLE-compressed overlay bitmaps stored in
//! private-stream-1 packets of an MPEG-2 Program Stream.  Given the raw
//! bytes of a menu VOB, this crate demuxes those packets, reassembles them
//! across PES fragment boundaries, parses their control sequences, expands
//! the bit-packed bitmaps, and extracts the bounding rectangles of their
//! connected pixel regions:
//!
//! ```no_run
//! use menuspu::{connected_regions, spu_packets};
//!
//! let vob = std::fs::read("VTS_01_0.VOB").unwrap();
//! for packet in spu_packets(&vob) {
//!     match packet.decode() {
//!         Ok((control, bitmap)) => {
//!             println!("menu overlay at {:?}", control.rect);
//!             for region in connected_regions(&bitmap) {
//!                 println!("  component {:?}", region.rect);
//!             }
//!         }
//!         Err(err) => eprintln!("skipping packet: {}", err),
//!     }
//! }
//! ```
//!
//! ## Scope
//!
//! Only menu overlays are in scope: packets without the force-display flag
//! are rejected as unsupported, display dates are ignored, and colour
//! reconstruction is limited to recording the palette and alpha commands —
//! geometry is the product here, not imagery.
//!
//! ## Robustness
//!
//! Home-authored discs are messy.  The demuxer resynchronizes over garbage
//! and stops cleanly at truncated packs; the reassembler drops
//! half-delivered packets; decode errors are per-packet and never poison
//! the rest of the stream.  Packets are always yielded in disc order,
//! which downstream page matching depends on.
//!
//! ## Background & references
//!
//! - [MPEG-2 Program Stream](https://en.wikipedia.org/wiki/MPEG_program_stream)
//! - [PES headers](http://dvd.sourceforge.net/dvdinfo/pes-hdr.html)
//! - [DVD sub-picture format](http://sam.zoy.org/writings/dvd/subtitles/)

#![warn(missing_docs)]

mod errors;
mod geom;
mod mpeg2;
mod probe;
mod regions;
mod rle;
mod spu;
mod util;

pub use crate::errors::SpuError;
pub use crate::geom::Rect;
pub use crate::mpeg2::ps::{fragments, Fragment, Fragments};
pub use crate::probe::is_program_stream;
pub use crate::regions::{connected_regions, Region};
pub use crate::rle::{decode_bitmap, Bitmap};
pub use crate::spu::{
    parse_control, spu_packets, SpuControl, SpuPacket, SpuPackets, FRAME_HEIGHT, FRAME_WIDTH,
};
