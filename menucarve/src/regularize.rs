//! IQR-based geometric regularization of a page's rectangle set.
//!
//! Menu rows are visually regular.  Quartile fences capture that regularity
//! without hard-coded pixel thresholds: navigation arrows fall below the
//! low fence, multi-line spans sit above the high fence and are left alone.

use log::debug;
use menuspu::Rect;

use crate::stats::{median_u32, quartiles};

fn widths(rects: &[Rect]) -> Vec<u32> {
    rects.iter().map(Rect::width).collect()
}

fn heights(rects: &[Rect]) -> Vec<u32> {
    rects.iter().map(Rect::height).collect()
}

/// Remove rectangles whose width *and* height are both low outliers.
/// Drops navigation arrows and small widgets.
fn drop_small_outliers(rects: &mut Vec<Rect>) {
    let (Some(wq), Some(hq)) = (quartiles(&widths(rects)), quartiles(&heights(rects))) else {
        return;
    };
    let before = rects.len();
    rects.retain(|r| {
        !(f64::from(r.width()) < wq.low_fence() && f64::from(r.height()) < hq.low_fence())
    });
    if rects.len() != before {
        debug!("dropped {} small outliers", before - rects.len());
    }
}

/// Remove low-height outliers one at a time (flattest first), but never
/// below `expected` rectangles.
fn drop_flat_outliers(rects: &mut Vec<Rect>, expected: usize) {
    let Some(hq) = quartiles(&heights(rects)) else {
        return;
    };
    let mut candidates: Vec<Rect> = rects
        .iter()
        .copied()
        .filter(|r| f64::from(r.height()) < hq.low_fence())
        .collect();
    candidates.sort_by_key(|r| r.height());
    for candidate in candidates {
        if rects.len() <= expected {
            break;
        }
        if let Some(position) = rects.iter().position(|r| r == &candidate) {
            debug!("dropped flat outlier {:?}", candidate);
            rects.remove(position);
        }
    }
}

/// Keep the `expected` widest rectangles, preserving emission order.
fn keep_widest(rects: &mut Vec<Rect>, expected: usize) {
    let mut order: Vec<usize> = (0..rects.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(rects[i].width()));
    order.truncate(expected);
    order.sort_unstable();
    let kept: Vec<Rect> = order.into_iter().map(|i| rects[i]).collect();
    debug!("width ranking kept {} of {} rectangles", kept.len(), rects.len());
    *rects = kept;
}

/// Resize height inliers to the median inlier height about their Y-centre.
/// Outliers may legitimately span multiple text lines and stay untouched.
fn normalize_heights(rects: &mut [Rect]) {
    let Some(hq) = quartiles(&heights(rects)) else {
        return;
    };
    let inlier = |r: &Rect| {
        let h = f64::from(r.height());
        h >= hq.low_fence() && h <= hq.high_fence()
    };
    let inlier_heights: Vec<u32> = rects
        .iter()
        .filter(|r| inlier(r))
        .map(Rect::height)
        .collect();
    let Some(target) = median_u32(&inlier_heights) else {
        return;
    };
    for rect in rects.iter_mut() {
        // Leaving exact-height inliers untouched keeps a second
        // regularization pass a strict no-op.
        if inlier(rect) && rect.height() != target {
            *rect = rect.with_height_about_center(target);
        }
    }
}

/// Reconcile a page's rectangles with the expected button count, then
/// normalize their heights.
///
/// The three reduction filters only ever run while the set is larger than
/// `expected`; a set at or below the expected count passes through with
/// height normalization alone.
pub fn regularize_page(mut rects: Vec<Rect>, expected: usize) -> Vec<Rect> {
    if rects.len() > expected {
        drop_small_outliers(&mut rects);
    }
    if rects.len() > expected {
        drop_flat_outliers(&mut rects, expected);
    }
    if rects.len() > expected {
        keep_widest(&mut rects, expected);
    }
    normalize_heights(&mut rects);
    rects
}
