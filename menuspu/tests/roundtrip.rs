//! Round-trip properties over synthesized menu VOBs: what the encoder in
//! `support` writes, the crate must read back exactly.

mod support;

use menuspu::{connected_regions, fragments, spu_packets, Rect};

use support::{blocks_bitmap, build_menu_packet, build_program_stream};

fn row_refs(rows: &[Vec<u8>]) -> Vec<&[u8]> {
    rows.iter().map(|r| r.as_slice()).collect()
}

#[test]
fn rle_encode_decode_round_trip() {
    let _ = env_logger::try_init();

    // An irregular pattern exercising 4/8/12/16-bit tokens and fills.
    let width = 300;
    let height = 9;
    let mut rows = vec![vec![0u8; width]; height];
    for (y, row) in rows.iter_mut().enumerate() {
        for (x, px) in row.iter_mut().enumerate() {
            *px = match (x * 7 + y * 3) % 11 {
                0..=3 => 0,
                4 | 5 => 1,
                6..=8 => 2,
                _ => 3,
            };
        }
    }
    // A long uniform stretch to force wide tokens.
    for px in rows[4][10..290].iter_mut() {
        *px = 3;
    }

    let packet = build_menu_packet(64, 48, &row_refs(&rows));
    let stream = build_program_stream(0x20, &[packet], 2019);

    let packets: Vec<_> = spu_packets(&stream).collect();
    assert_eq!(packets.len(), 1);
    let (control, bitmap) = packets[0].decode().unwrap();
    assert_eq!(control.rect, Rect::new(64, 48, 64 + 299, 48 + 8));
    assert!(control.is_menu);
    assert_eq!(bitmap.width(), width);
    assert_eq!(bitmap.height(), height);
    for y in 0..height {
        for x in 0..width {
            assert_eq!(bitmap.pixel(x, y), rows[y][x], "pixel mismatch at ({x},{y})");
        }
    }
}

#[test]
fn demuxer_is_idempotent_on_synthetic_vob() {
    let rows = blocks_bitmap(200, 100, &[(10, 10, 120, 70)]);
    let packet = build_menu_packet(0, 0, &row_refs(&rows));
    let stream = build_program_stream(0x21, &[packet], 700);

    let a: Vec<_> = fragments(&stream).collect();
    let b: Vec<_> = fragments(&stream).collect();
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn reassembled_packets_match_encoded_bytes() {
    let rows_a = blocks_bitmap(160, 64, &[(8, 8, 60, 40)]);
    let rows_b = blocks_bitmap(160, 64, &[(80, 8, 60, 40)]);
    let packet_a = build_menu_packet(100, 100, &row_refs(&rows_a));
    let packet_b = build_menu_packet(100, 300, &row_refs(&rows_b));
    let stream = build_program_stream(0x20, &[packet_a.clone(), packet_b.clone()], 311);

    let packets: Vec<_> = spu_packets(&stream).collect();
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].raw(), &packet_a[..]);
    assert_eq!(packets[1].raw(), &packet_b[..]);
}

#[test]
fn large_highlights_survive_the_whole_pipeline() {
    // Two button highlights plus three small arrows, like scenario 1's
    // first page.
    let rows = blocks_bitmap(
        360,
        280,
        &[
            (20, 10, 113, 90),   // button 1
            (20, 122, 113, 90),  // button 2
            (200, 10, 8, 8),     // arrows
            (220, 10, 8, 8),
            (240, 10, 8, 8),
        ],
    );
    let packet = build_menu_packet(130, 166, &row_refs(&rows));
    let stream = build_program_stream(0x20, &[packet], 2019);

    let packets: Vec<_> = spu_packets(&stream).collect();
    assert_eq!(packets.len(), 1);
    let (_, bitmap) = packets[0].decode().unwrap();
    let regions = connected_regions(&bitmap);
    assert_eq!(regions.len(), 5);

    let buttons: Vec<_> = regions
        .iter()
        .filter(|r| r.rect.width() >= 80 && r.rect.height() >= 60)
        .collect();
    assert_eq!(buttons.len(), 2);
    assert_eq!(buttons[0].rect, Rect::new(150, 176, 262, 265));
    assert_eq!(buttons[1].rect, Rect::new(150, 288, 262, 377));
}
