//! Miscellaneous helpers.

use std::fmt;

/// Wrapper that debug-formats a byte slice as a short hex prefix, so large
/// payloads don't flood the logs.
pub struct BytesPreview<'a>(pub &'a [u8]);

impl fmt::Debug for BytesPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let BytesPreview(bytes) = *self;
        write!(f, "[")?;
        for (i, byte) in bytes.iter().take(12).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        if bytes.len() > 12 {
            write!(f, " ..")?;
        }
        write!(f, "] ({} bytes)", bytes.len())
    }
}

#[test]
fn preview_truncates() {
    let bytes: Vec<u8> = (0..32).collect();
    let s = format!("{:?}", BytesPreview(&bytes));
    assert!(s.ends_with("..] (32 bytes)"));
    assert!(s.starts_with("[00 01 02"));
}
