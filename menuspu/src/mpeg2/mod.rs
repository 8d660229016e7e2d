//! MPEG-2 Program Stream demuxing.
//!
//! Menu VOBs are ordinary MPEG-2 Program Streams.  We only care about one
//! thing inside them: private-stream-1 PES packets whose first payload byte
//! is an SPU substream ID (`0x20..=0x3F`).  Everything else — video, audio,
//! padding, system headers — is skipped by its declared length.

pub mod pes;
pub mod ps;
