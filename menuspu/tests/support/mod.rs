//! Shared fixture builders: an SPU/Program-Stream *encoder* used to
//! synthesize menu VOB bytes, so round-trip properties can run without
//! binary fixtures from real discs.

/// Append the minimal token encoding `run` pixels of `color` to a nibble
/// stream.  Runs longer than 255 must be split by the caller.
fn push_run(nibbles: &mut Vec<u8>, run: usize, color: u8) {
    assert!((1..=255).contains(&run));
    let value = run << 2 | usize::from(color);
    if value < 0x10 {
        nibbles.push(value as u8);
    } else if value < 0x40 {
        nibbles.push((value >> 4) as u8);
        nibbles.push((value & 0xF) as u8);
    } else if value < 0x100 {
        nibbles.push(0);
        nibbles.push((value >> 4) as u8);
        nibbles.push((value & 0xF) as u8);
    } else {
        nibbles.push(0);
        nibbles.push((value >> 8) as u8);
        nibbles.push((value >> 4 & 0xF) as u8);
        nibbles.push((value & 0xF) as u8);
    }
}

/// Append a fill-to-end-of-line token (14 zero bits plus the colour).
fn push_fill(nibbles: &mut Vec<u8>, color: u8) {
    nibbles.extend_from_slice(&[0, 0, 0, color]);
}

/// RLE-encode one scan line, ending with a fill token for the last run.
fn encode_line(nibbles: &mut Vec<u8>, row: &[u8]) {
    let mut x = 0;
    while x < row.len() {
        let color = row[x];
        let mut run = 1;
        while x + run < row.len() && row[x + run] == color {
            run += 1;
        }
        if x + run == row.len() {
            push_fill(nibbles, color);
        } else {
            let mut left = run;
            while left > 255 {
                push_run(nibbles, 255, color);
                left -= 255;
            }
            push_run(nibbles, left, color);
        }
        x += run;
    }
    // Scan lines are byte-aligned.
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
}

/// Encode every second row starting at `first`, returning packed bytes.
fn encode_field(rows: &[&[u8]], first: usize) -> Vec<u8> {
    let mut nibbles = Vec::new();
    for row in rows.iter().skip(first).step_by(2) {
        encode_line(&mut nibbles, row);
    }
    nibbles
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Build a complete menu SPU packet for a bitmap placed at `(x, y)`.
///
/// `rows` is the pixel grid, one slice per scan line, values in `0..=3`.
pub fn build_menu_packet(x: u32, y: u32, rows: &[&[u8]]) -> Vec<u8> {
    let width = rows[0].len();
    assert!(rows.len() >= 2, "both interlaced fields need at least one row");
    assert!(rows.iter().all(|r| r.len() == width));
    let field1 = encode_field(rows, 0);
    let field2 = encode_field(rows, 1);

    let offset1 = 4;
    let offset2 = offset1 + field1.len();
    let control_offset = offset2 + field2.len();
    let x2 = x + width as u32 - 1;
    let y2 = y + rows.len() as u32 - 1;

    let mut control = Vec::new();
    control.extend_from_slice(&[0x00, 0x00]); // delay
    control.extend_from_slice(&(control_offset as u16).to_be_bytes()); // last sub-sequence
    control.push(0x00); // force display: this is a menu
    control.push(0x03);
    control.extend_from_slice(&[0x01, 0x23]);
    control.push(0x04);
    control.extend_from_slice(&[0xFF, 0xF0]);
    control.push(0x05);
    control.push((x >> 4) as u8);
    control.push(((x & 0xF) << 4) as u8 | (x2 >> 8) as u8);
    control.push((x2 & 0xFF) as u8);
    control.push((y >> 4) as u8);
    control.push(((y & 0xF) << 4) as u8 | (y2 >> 8) as u8);
    control.push((y2 & 0xFF) as u8);
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
    assert_eq!(packet.len(), total);
    packet
}

/// An MPEG-2 pack header with no stuffing bytes.
fn pack_header() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x01, 0xBA];
    bytes.extend_from_slice(&[0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xC3, 0xF8]);
    bytes
}

/// Wrap one SPU payload chunk in a pack + private-stream-1 PES packet.
fn wrap_chunk(substream_id: u8, chunk: &[u8]) -> Vec<u8> {
    let mut bytes = pack_header();
    bytes.extend_from_slice(&[0x00, 0x00, 0x01, 0xBD]);
    let len = 4 + chunk.len();
    bytes.extend_from_slice(&(len as u16).to_be_bytes());
    bytes.extend_from_slice(&[0x81, 0x00, 0x00]); // flags, no header data
    bytes.push(substream_id);
    bytes.extend_from_slice(chunk);
    bytes
}

/// Serialize SPU packets into a Program Stream, splitting the payload into
/// PES fragments of at most `fragment_size` bytes.
pub fn build_program_stream(substream_id: u8, packets: &[Vec<u8>], fragment_size: usize) -> Vec<u8> {
    let joined: Vec<u8> = packets.iter().flatten().copied().collect();
    let mut stream = Vec::new();
    for chunk in joined.chunks(fragment_size) {
        stream.extend_from_slice(&wrap_chunk(substream_id, chunk));
    }
    stream
}

/// A solid `width`×`height` block of `color` on a `frame_w`×`frame_h`
/// transparent bitmap, with its top-left corner at `(x, y)` — the building
/// block for synthetic highlight overlays.
pub fn blocks_bitmap(
    frame_w: usize,
    frame_h: usize,
    blocks: &[(usize, usize, usize, usize)],
) -> Vec<Vec<u8>> {
    let mut rows = vec![vec![0u8; frame_w]; frame_h];
    for &(x, y, w, h) in blocks {
        for row in rows.iter_mut().skip(y).take(h) {
            for px in row.iter_mut().skip(x).take(w) {
                *px = 1;
            }
        }
    }
    rows
}
