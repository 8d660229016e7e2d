//! Connected-component extraction from decoded bitmaps.

use std::cmp::{max, min};
use std::collections::VecDeque;

use crate::geom::Rect;
use crate::rle::Bitmap;

/// A maximal 4-connected region of non-zero pixels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Region {
    /// Bounding rectangle, translated into frame coordinates using the
    /// bitmap's display origin.
    pub rect: Rect,
    /// Number of pixels belonging to the region.
    pub pixel_count: usize,
}

/// Find the bounding rectangles of all 4-connected regions of non-zero
/// pixels.
///
/// All non-zero colour indices are treated alike; highlight state is not
/// distinguished here.  Output order is deterministic: regions appear in
/// scanline order of their first-discovered pixel (top-most row first, then
/// left-most column).
pub fn connected_regions(bitmap: &Bitmap) -> Vec<Region> {
    let width = bitmap.width();
    let height = bitmap.height();
    let (origin_x, origin_y) = bitmap.origin();
    let mut visited = vec![false; width * height];
    let mut regions = Vec::new();

    // We flood-fill breadth-first; a queue empties old pixels quickly and
    // keeps the frontier small on long thin glyph strokes.
    let mut queue = VecDeque::new();

    for y_base in 0..height {
        for x_base in 0..width {
            if visited[y_base * width + x_base] || bitmap.pixel(x_base, y_base) == 0 {
                continue;
            }

            let mut x_min = x_base;
            let mut x_max = x_base;
            let mut y_min = y_base;
            let mut y_max = y_base;
            let mut pixel_count = 0;

            visited[y_base * width + x_base] = true;
            queue.push_back((x_base, y_base));
            while let Some((x, y)) = queue.pop_front() {
                pixel_count += 1;
                x_min = min(x_min, x);
                x_max = max(x_max, x);
                y_min = min(y_min, y);
                y_max = max(y_max, y);

                let mut visit = |nx: usize, ny: usize| {
                    if !visited[ny * width + nx] && bitmap.pixel(nx, ny) != 0 {
                        visited[ny * width + nx] = true;
                        queue.push_back((nx, ny));
                    }
                };
                if x > 0 {
                    visit(x - 1, y);
                }
                if x + 1 < width {
                    visit(x + 1, y);
                }
                if y > 0 {
                    visit(x, y - 1);
                }
                if y + 1 < height {
                    visit(x, y + 1);
                }
            }

            regions.push(Region {
                rect: Rect::new(
                    origin_x + x_min as u32,
                    origin_y + y_min as u32,
                    origin_x + x_max as u32,
                    origin_y + y_max as u32,
                ),
                pixel_count,
            });
        }
    }
    regions
}
