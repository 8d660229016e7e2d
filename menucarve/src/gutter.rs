//! Column-gutter detection for two-column menus.
//!
//! The detector is deliberately conservative.  A false gutter on a
//! single-column page splits every button in half; a missed gutter on a
//! two-column page merely merges facing lines, which the width filters
//! usually survive.  When in doubt, report no gutter.

use log::debug;
use menuspu::Rect;

/// Required relative valley depth: the valley must sit at or below
/// `(1 - MIN_RELATIVE_DEPTH)` of the mean projection height.
const MIN_RELATIVE_DEPTH: f64 = 0.6;

/// Minimum width of the contiguous near-minimum run, in pixels.
const MIN_GUTTER_WIDTH: u32 = 20;

/// The smaller side's density must be at least this fraction of the larger
/// side's.  Rejects "gutters" between a short label and the text body.
const MIN_DENSITY_BALANCE: f64 = 0.25;

/// Valley search window, as fractions of the frame width.
const SEARCH_LO: f64 = 0.40;
const SEARCH_HI: f64 = 0.60;

/// Gaussian smoothing sigma for the projection, in pixels.
const SMOOTH_SIGMA: f64 = 4.0;

/// Tolerance for "near-minimum" when measuring valley width, as a fraction
/// of the mean projection height.
const NEAR_MIN_TOLERANCE: f64 = 0.05;

/// Convolve with a truncated, renormalized Gaussian kernel.
fn gaussian_smooth(values: &[f64], sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as usize;
    let weights: Vec<f64> = (0..=radius)
        .map(|d| (-0.5 * (d as f64 / sigma).powi(2)).exp())
        .collect();
    let mut smoothed = Vec::with_capacity(values.len());
    for x in 0..values.len() {
        let mut sum = 0.0;
        let mut norm = 0.0;
        let lo = x.saturating_sub(radius);
        let hi = (x + radius).min(values.len() - 1);
        for i in lo..=hi {
            let w = weights[x.abs_diff(i)];
            sum += values[i] * w;
            norm += w;
        }
        smoothed.push(sum / norm);
    }
    smoothed
}

/// Find a page-wide vertical gap splitting the glyphs into two columns.
///
/// Builds a smoothed horizontal projection (each glyph contributes its
/// height over its X extent), then looks for the deepest valley in the
/// central search window.  Accepts only when the valley is deep enough,
/// wide enough, and both sides carry comparable glyph density; returns the
/// valley's centre X.
pub fn detect_gutter(glyphs: &[Rect], frame_width: u32) -> Option<u32> {
    if glyphs.is_empty() || frame_width == 0 {
        return None;
    }
    let width = frame_width as usize;

    let mut projection = vec![0.0f64; width];
    for glyph in glyphs {
        let hi = glyph.right().min(frame_width - 1);
        for x in glyph.left()..=hi {
            projection[x as usize] += f64::from(glyph.height());
        }
    }
    let smoothed = gaussian_smooth(&projection, SMOOTH_SIGMA);

    // The mean is taken over the glyph X extent; empty frame margins would
    // dilute it and admit false gutters on narrow menus.
    let extent_lo = glyphs.iter().map(|g| g.left()).min()? as usize;
    let extent_hi = glyphs.iter().map(|g| g.right()).max()?.min(frame_width - 1) as usize;
    let extent = &smoothed[extent_lo..=extent_hi];
    let mean = extent.iter().sum::<f64>() / extent.len() as f64;
    if mean <= 0.0 {
        return None;
    }

    let search_lo = (f64::from(frame_width) * SEARCH_LO) as usize;
    let search_hi = ((f64::from(frame_width) * SEARCH_HI) as usize).min(width - 1);
    if search_lo >= search_hi {
        return None;
    }
    let (valley_x, valley_val) = (search_lo..=search_hi)
        .map(|x| (x, smoothed[x]))
        .min_by(|a, b| a.1.partial_cmp(&b.1).expect("NaN in projection"))?;

    if valley_val > (1.0 - MIN_RELATIVE_DEPTH) * mean {
        debug!(
            "gutter rejected: valley {:.1} too shallow for mean {:.1}",
            valley_val, mean
        );
        return None;
    }

    // Measure the contiguous near-minimum run around the valley.
    let tolerance = valley_val + NEAR_MIN_TOLERANCE * mean;
    let mut run_lo = valley_x;
    while run_lo > 0 && smoothed[run_lo - 1] <= tolerance {
        run_lo -= 1;
    }
    let mut run_hi = valley_x;
    while run_hi + 1 < width && smoothed[run_hi + 1] <= tolerance {
        run_hi += 1;
    }
    let run_width = (run_hi - run_lo + 1) as u32;
    if run_width < MIN_GUTTER_WIDTH {
        debug!("gutter rejected: valley run only {run_width}px wide");
        return None;
    }
    let center = (run_lo + run_hi) / 2;

    // Both halves must carry substantial, balanced density.
    let left_density: f64 = smoothed[extent_lo..center.max(extent_lo)].iter().sum();
    let right_density: f64 = if center + 1 <= extent_hi {
        smoothed[center + 1..=extent_hi].iter().sum()
    } else {
        0.0
    };
    if left_density <= 0.0 || right_density <= 0.0 {
        debug!("gutter rejected: one side is empty");
        return None;
    }
    let balance = left_density.min(right_density) / left_density.max(right_density);
    if balance < MIN_DENSITY_BALANCE {
        debug!("gutter rejected: density balance {balance:.2}");
        return None;
    }

    debug!(
        "gutter accepted at x={center} (valley {:.1}, mean {:.1}, run {run_width}px)",
        valley_val, mean
    );
    Some(center as u32)
}
