//! Full-width text-band recovery from decoded SPU bitmaps.
//!
//! Some authoring tools draw button text as one wide, faint raster per
//! line instead of per-glyph components or solid highlight boxes.  Those
//! pages defeat both clustering modes, but the text rows still stand out
//! in a per-row coverage profile of the bitmap.  This runs only on
//! cluster underflow, before the purely visual fallback gets a turn.

use log::debug;
use menuspu::{Bitmap, Rect};

use crate::stats::median_u32;

/// Bands closer together than this many rows merge into one.
const BAND_MERGE_GAP: usize = 2;

/// Plausible text-band heights, in rows.
const MIN_BAND_HEIGHT: usize = 6;
const MAX_BAND_HEIGHT: usize = 120;

/// Horizontal span a band must cover, as a fraction of the bitmap width;
/// relaxed when the strict gate leaves too few bands.
const SPAN_THRESHOLD: f64 = 0.6;
const RELAXED_SPAN_THRESHOLD: f64 = 0.4;
const RELAX_BELOW_BANDS: usize = 10;

/// Pixels of left padding so the first glyph isn't clipped.
const LEFT_PADDING: u32 = 8;

/// Per-row fraction of non-zero pixels.
fn row_coverage(bitmap: &Bitmap) -> Vec<f64> {
    let width = bitmap.width();
    (0..bitmap.height())
        .map(|y| {
            let non_zero = (0..width).filter(|&x| bitmap.pixel(x, y) != 0).count();
            non_zero as f64 / width as f64
        })
        .collect()
}

/// Rows whose coverage clears `mean + sigma_factor·σ` (with a small
/// absolute floor).
fn highlight_rows(ratios: &[f64], mean: f64, std: f64, sigma_factor: f64, floor: f64) -> Vec<usize> {
    let threshold = (mean + sigma_factor * std).max(floor);
    ratios
        .iter()
        .enumerate()
        .filter(|(_, &r)| r >= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Merge consecutive highlight rows into `(top, bottom)` bands.
fn merge_rows(rows: &[usize]) -> Vec<(usize, usize)> {
    let mut bands = Vec::new();
    let mut iter = rows.iter().copied();
    let Some(first) = iter.next() else {
        return bands;
    };
    let (mut start, mut prev) = (first, first);
    for row in iter {
        if row <= prev + BAND_MERGE_GAP {
            prev = row;
            continue;
        }
        bands.push((start, prev));
        start = row;
        prev = row;
    }
    bands.push((start, prev));
    bands
}

struct BandCandidate {
    top: usize,
    bottom: usize,
    min_x: usize,
    span_ratio: f64,
}

/// Detect full-width text bands; returns button rectangles in frame
/// coordinates, top to bottom.
pub fn detect_text_bands(bitmap: &Bitmap) -> Vec<Rect> {
    let width = bitmap.width();
    let height = bitmap.height();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let ratios = row_coverage(bitmap);
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    let variance = ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / ratios.len() as f64;
    let std = variance.sqrt();

    let mut rows = highlight_rows(&ratios, mean, std, 1.0, 0.01);
    if rows.len() < 8 {
        rows = highlight_rows(&ratios, mean, std, 0.5, 0.005);
    }
    if rows.is_empty() {
        return Vec::new();
    }

    // Navigation strips hug the top and bottom edges; keep clear of them.
    let top_margin = 8.max(height * 4 / 100);
    let bottom_margin = 24.max(height * 8 / 100);

    let mut candidates = Vec::new();
    for (top, bottom) in merge_rows(&rows) {
        let band_height = bottom - top + 1;
        if !(MIN_BAND_HEIGHT..=MAX_BAND_HEIGHT).contains(&band_height) {
            continue;
        }
        if top <= top_margin || bottom + bottom_margin >= height {
            continue;
        }
        // Horizontal extent of the band's pixels.
        let mut min_x = width;
        let mut max_x = 0;
        for y in top..=bottom {
            for x in 0..width {
                if bitmap.pixel(x, y) != 0 {
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                }
            }
        }
        if max_x <= min_x {
            continue;
        }
        let span_ratio = (max_x - min_x + 1) as f64 / width as f64;

        // Expand vertically with a downward bias: descenders need room.
        let pad_up = 3.max(band_height * 2 / 5);
        let pad_down = 6.max(band_height);
        let top = top.saturating_sub(pad_up).max(top_margin);
        let bottom = (bottom + pad_down).min(height.saturating_sub(bottom_margin + 1));
        if bottom <= top {
            continue;
        }
        candidates.push(BandCandidate {
            top,
            bottom,
            min_x,
            span_ratio,
        });
    }
    if candidates.is_empty() {
        return Vec::new();
    }

    let band_heights: Vec<u32> = candidates
        .iter()
        .map(|c| (c.bottom - c.top + 1) as u32)
        .collect();
    let median_height = median_u32(&band_heights).unwrap_or(0);

    let select = |threshold: f64| -> Vec<&BandCandidate> {
        candidates
            .iter()
            .filter(|c| c.span_ratio >= threshold)
            .filter(|c| {
                median_height == 0 || (c.bottom - c.top + 1) as u32 <= median_height * 2
            })
            .collect()
    };
    let mut selected = select(SPAN_THRESHOLD);
    if selected.len() < RELAX_BELOW_BANDS {
        selected = select(RELAXED_SPAN_THRESHOLD);
    }
    if selected.is_empty() {
        return Vec::new();
    }

    // Normalize to the median selected height so the rows read as one set.
    let selected_heights: Vec<u32> = selected
        .iter()
        .map(|c| (c.bottom - c.top + 1) as u32)
        .collect();
    let target = median_u32(&selected_heights).unwrap_or(1).max(1) as usize;

    let (origin_x, origin_y) = bitmap.origin();
    let mut rects = Vec::new();
    for band in selected {
        let center = (band.top + band.bottom) / 2;
        let mut top = center.saturating_sub(target / 2);
        let mut bottom = top + target - 1;
        let max_bottom = height.saturating_sub(bottom_margin + 1);
        if bottom > max_bottom {
            let shift = bottom - max_bottom;
            top = top.saturating_sub(shift);
            bottom = max_bottom;
        }
        top = top.max(top_margin);
        if bottom <= top {
            continue;
        }
        let left = band.min_x.saturating_sub(LEFT_PADDING as usize);
        rects.push(Rect::new(
            origin_x + left as u32,
            origin_y + top as u32,
            origin_x + width as u32 - 1,
            origin_y + bottom as u32,
        ));
    }
    rects.sort_by_key(|r| (r.top(), r.left()));
    debug!("text-band recovery found {} bands", rects.len());
    rects
}
