//! Vertical alignment between SPU coordinates and rendered frames.
//!
//! SPU display rectangles live in the overlay coordinate space, which on
//! home-authored discs is frequently shifted vertically relative to the
//! frames the player actually renders.  OCR text-line boxes on the
//! representative frame give us ground truth to measure that shift.

use log::debug;
use menuspu::Rect;

use crate::stats::median_f64;

/// Minimum number of matched rectangle/line pairs before we trust a shift.
const MIN_PAIRS: usize = 3;

/// A pair only counts when the OCR line overlaps at least this fraction of
/// the rectangle's width.
const MIN_OVERLAP_FRACTION: f64 = 0.5;

/// Plausibility bound: shifts beyond this fraction of the frame height are
/// discarded as OCR noise.
const MAX_SHIFT_FRACTION: f64 = 0.2;

/// Compute the page's vertical shift as the median Y-centre delta between
/// each SPU rectangle and its best-overlapping OCR line.
///
/// The median rejects individual OCR outliers without discarding the
/// information in the well-matched pairs.  Returns `None` when there are
/// too few confident pairs or the shift is implausibly large.
pub fn compute_shift(rects: &[Rect], ocr_lines: &[Rect], frame_height: u32) -> Option<i32> {
    if ocr_lines.is_empty() {
        return None;
    }
    let mut deltas = Vec::new();
    for rect in rects {
        // Greatest horizontal overlap wins; ties (lines of one column share
        // an x-band) go to the vertically nearest line.
        let best = ocr_lines
            .iter()
            .max_by(|a, b| {
                a.h_overlap(rect).cmp(&b.h_overlap(rect)).then_with(|| {
                    let da = (a.y_center() - rect.y_center()).abs();
                    let db = (b.y_center() - rect.y_center()).abs();
                    db.partial_cmp(&da).expect("centres are finite")
                })
            })
            .expect("ocr_lines is non-empty");
        let overlap = f64::from(best.h_overlap(rect));
        if overlap >= MIN_OVERLAP_FRACTION * f64::from(rect.width()) {
            deltas.push(best.y_center() - rect.y_center());
        }
    }
    if deltas.len() < MIN_PAIRS {
        debug!("alignment skipped: only {} confident pairs", deltas.len());
        return None;
    }
    let shift = median_f64(&deltas)?.round() as i32;
    if f64::from(shift.unsigned_abs()) > MAX_SHIFT_FRACTION * f64::from(frame_height) {
        debug!("alignment skipped: implausible shift {shift}px");
        return None;
    }
    Some(shift)
}

/// Apply a vertical shift to all rectangles of a page, clamped to the
/// frame.
pub fn apply_shift(rects: &mut [Rect], shift: i32, frame_height: u32) {
    for rect in rects.iter_mut() {
        *rect = rect.shifted_y(shift, frame_height.saturating_sub(1));
    }
}
