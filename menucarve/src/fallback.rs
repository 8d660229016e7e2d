//! Purely visual dark-region fallback.
//!
//! When the SPU path comes up short, the representative frame itself is the
//! last source of button geometry: home-authored menus usually draw button
//! text in dark boxes on a lighter background.  This detector is coarse by
//! design; everything it produces is tagged `fallback` so downstream OCR
//! can treat it with suspicion.

use std::cmp::{max, min};
use std::collections::VecDeque;

use image::GrayImage;
use log::debug;
use menuspu::Rect;

/// Analysis block size, in pixels.
const BLOCK: u32 = 8;

/// A block is "dark" when its mean gray value is below this.
const DARK_MEAN: f64 = 65.0;

/// Minimum plausible button dimensions, in pixels.
const MIN_REGION_WIDTH: u32 = 80;
const MIN_REGION_HEIGHT: u32 = 10;

/// Two regions whose vertical ranges overlap by more than this fraction of
/// the smaller height are duplicates; the larger one wins.
const DEDUP_OVERLAP: f64 = 0.5;

/// Mean gray value of one block, clamped at the frame edges.
fn block_mean(frame: &GrayImage, bx: u32, by: u32) -> f64 {
    let x_end = min((bx + 1) * BLOCK, frame.width());
    let y_end = min((by + 1) * BLOCK, frame.height());
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in by * BLOCK..y_end {
        for x in bx * BLOCK..x_end {
            sum += u64::from(frame.get_pixel(x, y).0[0]);
            count += 1;
        }
    }
    sum as f64 / count as f64
}

/// Detect dark rectangular regions in a frame.
///
/// Blocks below the darkness threshold are grouped 4-connectedly; regions
/// touching the frame edge are rejected (letterbox bars and background
/// vignettes), vertically-duplicated regions are collapsed, and the result
/// is ordered top-to-bottom.
pub fn detect_dark_regions(frame: &GrayImage) -> Vec<Rect> {
    let grid_w = frame.width().div_ceil(BLOCK);
    let grid_h = frame.height().div_ceil(BLOCK);
    if grid_w == 0 || grid_h == 0 {
        return Vec::new();
    }

    let dark: Vec<bool> = (0..grid_h)
        .flat_map(|by| (0..grid_w).map(move |bx| (bx, by)))
        .map(|(bx, by)| block_mean(frame, bx, by) < DARK_MEAN)
        .collect();
    let at = |bx: u32, by: u32| dark[(by * grid_w + bx) as usize];

    let mut visited = vec![false; (grid_w * grid_h) as usize];
    let mut regions: Vec<Rect> = Vec::new();
    let mut queue = VecDeque::new();

    for by0 in 0..grid_h {
        for bx0 in 0..grid_w {
            let index = (by0 * grid_w + bx0) as usize;
            if visited[index] || !at(bx0, by0) {
                continue;
            }
            let (mut x_min, mut x_max, mut y_min, mut y_max) = (bx0, bx0, by0, by0);
            visited[index] = true;
            queue.push_back((bx0, by0));
            while let Some((bx, by)) = queue.pop_front() {
                x_min = min(x_min, bx);
                x_max = max(x_max, bx);
                y_min = min(y_min, by);
                y_max = max(y_max, by);
                let neighbors = [
                    (bx.wrapping_sub(1), by),
                    (bx + 1, by),
                    (bx, by.wrapping_sub(1)),
                    (bx, by + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx < grid_w && ny < grid_h {
                        let ni = (ny * grid_w + nx) as usize;
                        if !visited[ni] && at(nx, ny) {
                            visited[ni] = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }
            }

            // Edge-touching regions are background, not buttons.
            if x_min == 0 || y_min == 0 || x_max == grid_w - 1 || y_max == grid_h - 1 {
                debug!("fallback: rejecting edge-touching dark region");
                continue;
            }
            let rect = Rect::new(
                x_min * BLOCK,
                y_min * BLOCK,
                min((x_max + 1) * BLOCK, frame.width()) - 1,
                min((y_max + 1) * BLOCK, frame.height()) - 1,
            );
            if rect.width() >= MIN_REGION_WIDTH && rect.height() >= MIN_REGION_HEIGHT {
                regions.push(rect);
            }
        }
    }

    // Collapse vertical duplicates, keeping the larger region.
    regions.sort_by_key(|r| std::cmp::Reverse(r.width() * r.height()));
    let mut kept: Vec<Rect> = Vec::new();
    for rect in regions {
        let duplicate = kept.iter().any(|k| {
            let overlap = f64::from(k.v_overlap(&rect));
            overlap > DEDUP_OVERLAP * f64::from(min(k.height(), rect.height()))
                && k.h_overlap(&rect) > 0
        });
        if !duplicate {
            kept.push(rect);
        }
    }
    kept.sort_by_key(|r| (r.top(), r.left()));
    debug!("fallback: {} dark regions", kept.len());
    kept
}
