//! Clustering of SPU pixel regions into button rectangles.
//!
//! Authoring tools disagree about what a menu overlay contains.  Some draw
//! one large highlight box per button; others render the button *text* as
//! hundreds of per-glyph bitmaps.  The selector looks at the region
//! population of a packet and picks the matching strategy.

use log::{debug, trace};
use menuspu::{Rect, Region};

use crate::gutter::detect_gutter;

/// Minimum width of a "large" highlight component.
pub const LARGE_MIN_WIDTH: u32 = 80;

/// Minimum height of a "large" highlight component.
pub const LARGE_MIN_HEIGHT: u32 = 60;

/// More small components than this switches us to character-glyph mode.
const GLYPH_MODE_MIN_COUNT: usize = 20;

/// Max Y-centre difference between consecutive glyphs of one text line.
const LINE_Y_TOLERANCE: f64 = 10.0;

/// Max horizontal gap bridged when merging glyphs of one line.
const GLYPH_MERGE_GAP: u32 = 30;

/// Right-side padding, so the final glyph isn't truncated by the crop.
const RIGHT_PADDING: u32 = 30;

/// Minimum width of a clustered button box.
const MIN_BUTTON_WIDTH: u32 = 80;

/// Minimum height of a clustered button box.
const MIN_BUTTON_HEIGHT: u32 = 10;

/// Fraction of the glyph Y-range treated as the header band on
/// column-partitioned pages.
const HEADER_BAND: f64 = 0.15;

/// The authoring style detected for one packet's regions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClusterMode {
    /// A handful of large highlight boxes; each is a button.
    LargeHighlight,
    /// Many small per-glyph regions that need clustering into lines.
    CharacterGlyph,
}

fn is_large(region: &Region) -> bool {
    region.rect.width() >= LARGE_MIN_WIDTH && region.rect.height() >= LARGE_MIN_HEIGHT
}

fn is_small(region: &Region) -> bool {
    region.rect.width() < LARGE_MIN_WIDTH && region.rect.height() < LARGE_MIN_HEIGHT
}

/// Decide which clustering strategy fits this packet, or `None` when the
/// region population looks like neither style.
pub fn select_mode(regions: &[Region]) -> Option<ClusterMode> {
    let large = regions.iter().filter(|r| is_large(r)).count();
    let small = regions.iter().filter(|r| is_small(r)).count();
    if large >= 1 {
        Some(ClusterMode::LargeHighlight)
    } else if small > GLYPH_MODE_MIN_COUNT {
        Some(ClusterMode::CharacterGlyph)
    } else {
        trace!("no mode: {} large, {} small regions", large, small);
        None
    }
}

/// Group glyph boxes into text lines: sorted by Y centre, a glyph joins the
/// current line while its centre is within tolerance of the previous one.
fn group_into_lines(mut glyphs: Vec<Rect>) -> Vec<Vec<Rect>> {
    glyphs.sort_by(|a, b| {
        (a.y_center(), a.left())
            .partial_cmp(&(b.y_center(), b.left()))
            .expect("glyph centres are finite")
    });
    let mut lines: Vec<Vec<Rect>> = Vec::new();
    let mut last_center = f64::NEG_INFINITY;
    for glyph in glyphs {
        let center = glyph.y_center();
        if center - last_center <= LINE_Y_TOLERANCE && !lines.is_empty() {
            lines.last_mut().unwrap().push(glyph);
        } else {
            lines.push(vec![glyph]);
        }
        last_center = center;
    }
    lines
}

/// Merge one line's glyphs into button boxes, splitting at gaps wider than
/// [`GLYPH_MERGE_GAP`], then apply the right-side padding.  Padding stops
/// at `right_limit` so column boxes never spill across the gutter.
fn merge_line(mut line: Vec<Rect>, right_limit: u32) -> Vec<Rect> {
    line.sort_by_key(|g| (g.left(), g.right()));
    let mut boxes: Vec<Rect> = Vec::new();
    for glyph in line {
        match boxes.last_mut() {
            Some(current) if glyph.left() <= current.right().saturating_add(GLYPH_MERGE_GAP) => {
                *current = current.union(&glyph);
            }
            _ => boxes.push(glyph),
        }
    }
    boxes
        .into_iter()
        .map(|b| {
            let right = (b.right() + RIGHT_PADDING).min(right_limit);
            Rect::new(b.left(), b.top(), right.max(b.right()), b.bottom())
        })
        .collect()
}

fn keeps_button_size(rect: &Rect) -> bool {
    rect.width() >= MIN_BUTTON_WIDTH && rect.height() >= MIN_BUTTON_HEIGHT
}

/// Cluster glyph boxes into button text boxes, optionally partitioned
/// around a column gutter.
fn cluster_glyphs(glyphs: &[Rect], gutter: Option<u32>, frame_width: u32) -> Vec<Rect> {
    let frame_limit = frame_width.saturating_sub(1);
    let boxes_of = |subset: Vec<Rect>, right_limit: u32| -> Vec<Rect> {
        group_into_lines(subset)
            .into_iter()
            .flat_map(|line| merge_line(line, right_limit))
            .filter(keeps_button_size)
            .collect()
    };

    let Some(gutter_x) = gutter else {
        let mut boxes = boxes_of(glyphs.to_vec(), frame_limit);
        boxes.sort_by_key(|b| (b.top(), b.left()));
        return boxes;
    };

    // Partition: the top of the glyph Y-range is the header band; the rest
    // splits left/right of the gutter.
    let y_lo = glyphs.iter().map(Rect::y_center).fold(f64::INFINITY, f64::min);
    let y_hi = glyphs.iter().map(Rect::y_center).fold(f64::NEG_INFINITY, f64::max);
    let header_cut = y_lo + HEADER_BAND * (y_hi - y_lo);

    let mut header_glyphs = Vec::new();
    let mut left_glyphs = Vec::new();
    let mut right_glyphs = Vec::new();
    for glyph in glyphs {
        if glyph.y_center() <= header_cut {
            header_glyphs.push(*glyph);
        } else if glyph.x_center() < f64::from(gutter_x) {
            left_glyphs.push(*glyph);
        } else {
            right_glyphs.push(*glyph);
        }
    }

    let mut header_boxes = Vec::new();
    let mut left_boxes = boxes_of(left_glyphs, gutter_x.saturating_sub(1));
    let mut right_boxes = boxes_of(right_glyphs, frame_limit);
    for candidate in boxes_of(header_glyphs, frame_limit) {
        // Only a line that actually spans the gutter is a header; anything
        // else belongs to its column.
        if candidate.left() < gutter_x && candidate.right() > gutter_x {
            header_boxes.push(candidate);
        } else if candidate.x_center() < f64::from(gutter_x) {
            left_boxes.push(candidate);
        } else {
            right_boxes.push(candidate);
        }
    }
    header_boxes.sort_by_key(|b| (b.top(), b.left()));
    left_boxes.sort_by_key(|b| (b.top(), b.left()));
    right_boxes.sort_by_key(|b| (b.top(), b.left()));

    let mut ordered = header_boxes;
    ordered.extend(left_boxes);
    ordered.extend(right_boxes);
    ordered
}

/// Cluster one packet's regions into button rectangles, in emission order.
///
/// The returned order is authoritative for entry-ID assignment: large
/// highlights keep region (scanline) order; glyph pages emit header, then
/// left column top-to-bottom, then right column top-to-bottom.  The result
/// is always pairwise non-overlapping.
pub fn cluster_page(regions: &[Region], frame_width: u32) -> Vec<Rect> {
    let rects = match select_mode(regions) {
        None => Vec::new(),
        Some(ClusterMode::LargeHighlight) => {
            let buttons: Vec<Rect> = regions
                .iter()
                .filter(|r| is_large(r))
                .map(|r| r.rect)
                .collect();
            debug!("large-highlight mode: {} buttons", buttons.len());
            buttons
        }
        Some(ClusterMode::CharacterGlyph) => {
            let glyphs: Vec<Rect> = regions.iter().map(|r| r.rect).collect();
            let gutter = detect_gutter(&glyphs, frame_width);
            let boxes = cluster_glyphs(&glyphs, gutter, frame_width);
            debug!(
                "character-glyph mode: {} glyphs -> {} buttons (gutter: {:?})",
                glyphs.len(),
                boxes.len(),
                gutter
            );
            boxes
        }
    };

    // Guarantee pairwise non-overlap without disturbing emission order.
    let mut kept: Vec<Rect> = Vec::with_capacity(rects.len());
    for rect in rects {
        if kept.iter().any(|k| k.overlaps(&rect)) {
            trace!("dropping overlapping box {:?}", rect);
            continue;
        }
        kept.push(rect);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x1: u32, y1: u32, x2: u32, y2: u32) -> Region {
        Region {
            rect: Rect::new(x1, y1, x2, y2),
            pixel_count: ((x2 - x1 + 1) * (y2 - y1 + 1)) as usize,
        }
    }

    fn glyph_row(x_start: u32, count: u32, y: u32) -> Vec<Region> {
        (0..count)
            .map(|i| {
                let x = x_start + i * 14;
                region(x, y, x + 9, y + 16)
            })
            .collect()
    }

    #[test]
    fn large_highlight_mode_keeps_only_large_components() {
        let mut regions = vec![
            region(150, 176, 262, 265),
            region(150, 288, 262, 377),
        ];
        // Three small navigation arrows.
        regions.push(region(20, 500, 30, 510));
        regions.push(region(40, 500, 50, 510));
        regions.push(region(60, 500, 70, 510));

        assert_eq!(select_mode(&regions), Some(ClusterMode::LargeHighlight));
        let buttons = cluster_page(&regions, 720);
        assert_eq!(
            buttons,
            vec![Rect::new(150, 176, 262, 265), Rect::new(150, 288, 262, 377)]
        );
    }

    #[test]
    fn few_small_regions_detect_nothing() {
        let regions: Vec<Region> = glyph_row(100, 10, 50);
        assert_eq!(select_mode(&regions), None);
        assert!(cluster_page(&regions, 720).is_empty());
    }

    #[test]
    fn single_column_page_clusters_into_lines() {
        // 10 lines of 24 glyphs each: 240 character boxes in the left 60%
        // of the page.
        let mut regions = Vec::new();
        for line in 0..10 {
            regions.extend(glyph_row(60, 24, 100 + line * 30));
        }
        assert_eq!(select_mode(&regions), Some(ClusterMode::CharacterGlyph));

        let buttons = cluster_page(&regions, 720);
        assert_eq!(buttons.len(), 10);
        for (i, button) in buttons.iter().enumerate() {
            assert!(button.width() >= 80, "button {i} too narrow");
            assert!(button.height() >= 10, "button {i} too flat");
            if i > 0 {
                assert!(button.top() > buttons[i - 1].bottom(), "not top-to-bottom");
            }
        }
        // Right padding extends past the last glyph (60 + 23*14 + 9 = 391).
        assert_eq!(buttons[0].right(), 391 + 30);
    }

    #[test]
    fn two_column_page_orders_header_left_right() {
        let mut regions = Vec::new();
        // A header line spanning both columns at the very top.
        regions.extend(glyph_row(200, 23, 40));
        // Five lines per column.
        for line in 0..5 {
            regions.extend(glyph_row(60, 20, 120 + line * 40));
            regions.extend(glyph_row(380, 20, 120 + line * 40));
        }
        let buttons = cluster_page(&regions, 720);
        assert_eq!(buttons.len(), 11);

        // The header crosses the gutter; nothing else does.
        let gutter = 360;
        assert!(buttons[0].left() < gutter && buttons[0].right() > gutter);
        for b in &buttons[1..] {
            assert!(
                b.right() < gutter || b.left() > gutter,
                "{b:?} crosses the gutter"
            );
        }
        // Left column (5) then right column (5), each top-to-bottom.
        for i in 1..=5 {
            assert!(buttons[i].right() < gutter);
        }
        for i in 6..=10 {
            assert!(buttons[i].left() > gutter);
        }
        for i in 2..=5 {
            assert!(buttons[i].top() > buttons[i - 1].top());
        }
        for i in 7..=10 {
            assert!(buttons[i].top() > buttons[i - 1].top());
        }
    }

    #[test]
    fn wide_gap_splits_a_line_into_two_boxes() {
        // Two word groups separated by 120px on one line, no gutter
        // (single line can't produce one).
        let mut regions = glyph_row(60, 8, 200);
        regions.extend(glyph_row(60 + 8 * 14 + 120, 8, 200));
        // Pad the population into glyph mode with more lines below.
        regions.extend(glyph_row(60, 8, 240));
        regions.extend(glyph_row(60, 8, 280));

        let buttons = cluster_page(&regions, 720);
        let top_line: Vec<_> = buttons.iter().filter(|b| b.top() == 200).collect();
        assert_eq!(top_line.len(), 2);
    }

    #[test]
    fn clustering_is_deterministic() {
        let mut regions = Vec::new();
        for line in 0..10 {
            regions.extend(glyph_row(60, 24, 100 + line * 30));
        }
        assert_eq!(cluster_page(&regions, 720), cluster_page(&regions, 720));
    }

    #[test]
    fn hundreds_of_glyphs_stay_bounded() {
        // A dense 20-line page with 24 glyphs per line: 480 boxes in, at
        // most a few dozen buttons out, all at least 80x10.
        let mut regions = Vec::new();
        for line in 0..20 {
            regions.extend(glyph_row(60, 24, 60 + line * 24));
        }
        let buttons = cluster_page(&regions, 720);
        assert!(buttons.len() <= 40, "{} buttons", buttons.len());
        assert!(buttons
            .iter()
            .all(|b| b.width() >= 80 && b.height() >= 10));
    }

    #[test]
    fn results_never_overlap() {
        let mut regions = Vec::new();
        for line in 0..12 {
            regions.extend(glyph_row(60, 22, 90 + line * 22));
        }
        let buttons = cluster_page(&regions, 720);
        for (i, a) in buttons.iter().enumerate() {
            for b in &buttons[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }
}
