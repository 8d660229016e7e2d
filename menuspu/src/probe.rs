//! File-type probing.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Does this file start with an MPEG-2 Program Stream pack header?
///
/// Menu VOBs always do.  A `false` here means the demuxer will find nothing
/// useful, which callers should surface as a malformed-input warning before
/// falling back to purely visual detection.
pub fn is_program_stream<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    let mut f = fs::File::open(path)?;
    let mut magic = [0u8; 4];
    match f.read_exact(&mut magic) {
        Ok(()) => Ok(magic == [0x00, 0x00, 0x01, 0xBA]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
