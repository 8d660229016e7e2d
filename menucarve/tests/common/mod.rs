//! Shared fixtures for stage-level tests: a minimal SPU/Program-Stream
//! encoder for synthesizing menu VOBs, plus stub tool capabilities so no
//! external binaries are needed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::GrayImage;
use menucarve::tools::{FrameSampler, Ocr, OcrText};
use menucarve::Result;
use menuspu::Rect;

/// Append the shortest token for `run` pixels of `color` (run 1..=255).
fn push_run(nibbles: &mut Vec<u8>, run: usize, color: u8) {
    let value = run << 2 | usize::from(color);
    match value {
        0x04..=0x0F => nibbles.push(value as u8),
        0x10..=0x3F => nibbles.extend_from_slice(&[(value >> 4) as u8, (value & 0xF) as u8]),
        0x40..=0xFF => {
            nibbles.extend_from_slice(&[0, (value >> 4) as u8, (value & 0xF) as u8])
        }
        _ => nibbles.extend_from_slice(&[
            0,
            (value >> 8) as u8,
            (value >> 4 & 0xF) as u8,
            (value & 0xF) as u8,
        ]),
    }
}

fn encode_field(rows: &[Vec<u8>], first: usize) -> Vec<u8> {
    let mut nibbles = Vec::new();
    for row in rows.iter().skip(first).step_by(2) {
        let mut x = 0;
        while x < row.len() {
            let color = row[x];
            let mut run = 1;
            while x + run < row.len() && row[x + run] == color {
                run += 1;
            }
            if x + run == row.len() {
                // Fill to end of line.
                nibbles.extend_from_slice(&[0, 0, 0, color]);
            } else {
                let mut left = run;
                while left > 255 {
                    push_run(&mut nibbles, 255, color);
                    left -= 255;
                }
                push_run(&mut nibbles, left, color);
            }
            x += run;
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0);
        }
    }
    nibbles
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Build a complete menu SPU packet for a pixel grid placed at `(x, y)`.
pub fn menu_packet(x: u32, y: u32, rows: &[Vec<u8>]) -> Vec<u8> {
    let width = rows[0].len() as u32;
    let height = rows.len() as u32;
    let field1 = encode_field(rows, 0);
    let field2 = encode_field(rows, 1);
    let offset1 = 4usize;
    let offset2 = offset1 + field1.len();
    let control_offset = offset2 + field2.len();
    let (x2, y2) = (x + width - 1, y + height - 1);

    let mut control = vec![0x00, 0x00];
    control.extend_from_slice(&(control_offset as u16).to_be_bytes());
    control.push(0x00); // force display
    control.push(0x05);
    control.extend_from_slice(&[
        (x >> 4) as u8,
        ((x & 0xF) << 4) as u8 | (x2 >> 8) as u8,
        (x2 & 0xFF) as u8,
        (y >> 4) as u8,
        ((y & 0xF) << 4) as u8 | (y2 >> 8) as u8,
        (y2 & 0xFF) as u8,
    ]);
    control.push(0x06);
    control.extend_from_slice(&(offset1 as u16).to_be_bytes());
    control.extend_from_slice(&(offset2 as u16).to_be_bytes());
    control.push(0xFF);

    let total = control_offset + control.len();
    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(&(total as u16).to_be_bytes());
    packet.extend_from_slice(&(control_offset as u16).to_be_bytes());
    packet.extend_from_slice(&field1);
    packet.extend_from_slice(&field2);
    packet.extend_from_slice(&control);
    packet
}

/// A menu SPU packet whose control sequence is garbage: it reassembles
/// fine but fails to decode.
pub fn corrupt_packet() -> Vec<u8> {
    let mut packet = vec![0u8; 64];
    packet[0..2].copy_from_slice(&64u16.to_be_bytes());
    packet[2..4].copy_from_slice(&60u16.to_be_bytes());
    // Control area: delay + self-pointing next, then an unknown command
    // with no display rectangle or field offsets.
    packet[60..64].copy_from_slice(&[0x00, 0x00, 0x00, 0x3C]);
    packet
}

/// A transparent pixel grid with solid colour-1 blocks at the given
/// `(x, y, w, h)` positions.
pub fn grid_with_blocks(
    width: usize,
    height: usize,
    blocks: &[(usize, usize, usize, usize)],
) -> Vec<Vec<u8>> {
    let mut rows = vec![vec![0u8; width]; height];
    for &(x, y, w, h) in blocks {
        for row in rows.iter_mut().skip(y).take(h) {
            for px in row.iter_mut().skip(x).take(w) {
                *px = 1;
            }
        }
    }
    rows
}

/// Serialize SPU packets into a Program Stream with pack headers and
/// private-stream-1 PES fragments.
pub fn program_stream(packets: &[Vec<u8>]) -> Vec<u8> {
    let joined: Vec<u8> = packets.iter().flatten().copied().collect();
    let mut stream = Vec::new();
    for chunk in joined.chunks(1800) {
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xBA]);
        stream.extend_from_slice(&[0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8]);
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xBD]);
        stream.extend_from_slice(&((4 + chunk.len()) as u16).to_be_bytes());
        stream.extend_from_slice(&[0x81, 0x00, 0x00, 0x20]);
        stream.extend_from_slice(chunk);
    }
    stream
}

/// A frame sampler that writes a fixed set of in-memory frames.
pub struct StubSampler {
    pub frames: Vec<GrayImage>,
}

#[async_trait]
impl FrameSampler for StubSampler {
    async fn sample(&self, _vob: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for (index, frame) in self.frames.iter().enumerate() {
            let path = out_dir.join(format!("frame_{:04}.png", index + 1));
            frame.save(&path)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// A frame sampler that fails like a missing `ffmpeg` would.
pub struct FailingSampler;

#[async_trait]
impl FrameSampler for FailingSampler {
    async fn sample(&self, _vob: &Path, _out_dir: &Path) -> Result<Vec<PathBuf>> {
        Err(menucarve::errors::ToolError::Missing {
            tool: "ffmpeg".to_string(),
        }
        .into())
    }
}

/// An OCR capability that reports a fixed set of text-line boxes.
pub struct StubOcr {
    pub lines: Vec<Rect>,
}

#[async_trait]
impl Ocr for StubOcr {
    async fn recognize(&self, _image: &Path) -> Result<OcrText> {
        Ok(OcrText {
            text: String::new(),
            lines: self.lines.clone(),
        })
    }
}

/// Write a menu-map artifact pointing at `vob_path`.
pub fn write_menu_map(path: &Path, menu_id: &str, vob_path: &Path, expected: u32) {
    let json = format!(
        r#"{{"menus": [{{"menu_id": {menu_id:?}, "vob_path": {:?}, "expected_button_count": {expected}}}]}}"#,
        vob_path.display().to_string(),
    );
    std::fs::write(path, json).unwrap();
}
