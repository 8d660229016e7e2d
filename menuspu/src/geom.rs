//! Geometry types shared by the decoder and the clustering stages.

use std::cmp::{max, min};

use serde::{de, Deserialize, Deserializer, Serialize};

/// A rectangle in frame coordinates with **inclusive** edges.
///
/// This matches how SPU display areas are encoded on disc: command `0x05`
/// stores `x2`/`y2` as the last covered column and row, so a rectangle's
/// width is `x2 - x1 + 1`.  Constructors panic on inverted rectangles; data
/// read from artifacts goes through a validating `Deserialize` impl instead.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Rect {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl Rect {
    /// Create a rectangle from inclusive corner coordinates.  Panics if
    /// `x2 < x1` or `y2 < y1`.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Rect {
        assert!(x1 <= x2, "rectangle has negative width: {x1}..{x2}");
        assert!(y1 <= y2, "rectangle has negative height: {y1}..{y2}");
        Rect { x1, y1, x2, y2 }
    }

    /// The leftmost covered column.
    pub fn left(&self) -> u32 {
        self.x1
    }

    /// The topmost covered row.
    pub fn top(&self) -> u32 {
        self.y1
    }

    /// The rightmost covered column (inclusive).
    pub fn right(&self) -> u32 {
        self.x2
    }

    /// The bottommost covered row (inclusive).
    pub fn bottom(&self) -> u32 {
        self.y2
    }

    /// The width in pixels.
    pub fn width(&self) -> u32 {
        self.x2 - self.x1 + 1
    }

    /// The height in pixels.
    pub fn height(&self) -> u32 {
        self.y2 - self.y1 + 1
    }

    /// The horizontal centre.
    pub fn x_center(&self) -> f64 {
        f64::from(self.x1 + self.x2) / 2.0
    }

    /// The vertical centre.
    pub fn y_center(&self) -> f64 {
        f64::from(self.y1 + self.y2) / 2.0
    }

    /// The smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x1: min(self.x1, other.x1),
            y1: min(self.y1, other.y1),
            x2: max(self.x2, other.x2),
            y2: max(self.y2, other.y2),
        }
    }

    /// Number of columns covered by both rectangles.
    pub fn h_overlap(&self, other: &Rect) -> u32 {
        let lo = max(self.x1, other.x1);
        let hi = min(self.x2, other.x2);
        if lo > hi {
            0
        } else {
            hi - lo + 1
        }
    }

    /// Number of rows covered by both rectangles.
    pub fn v_overlap(&self, other: &Rect) -> u32 {
        let lo = max(self.y1, other.y1);
        let hi = min(self.y2, other.y2);
        if lo > hi {
            0
        } else {
            hi - lo + 1
        }
    }

    /// Do the two rectangles share at least one pixel?
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.h_overlap(other) > 0 && self.v_overlap(other) > 0
    }

    /// Does this rectangle lie entirely inside a `width`×`height` frame?
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.x2 < width && self.y2 < height
    }

    /// Translate vertically by `dy`, preserving height, clamped so the
    /// rectangle stays inside `0..=max_bottom`.
    pub fn shifted_y(&self, dy: i32, max_bottom: u32) -> Rect {
        let height = self.y2 - self.y1;
        let top = i64::from(self.y1) + i64::from(dy);
        let limit = i64::from(max_bottom) - i64::from(height);
        let top = top.clamp(0, limit.max(0)) as u32;
        Rect {
            x1: self.x1,
            y1: top,
            x2: self.x2,
            y2: top + height,
        }
    }

    /// Return a copy resized vertically to `height` pixels, keeping the
    /// vertical centre (rounded down).  The top edge saturates at zero.
    pub fn with_height_about_center(&self, height: u32) -> Rect {
        assert!(height > 0, "rectangle height must be non-zero");
        let center = (self.y1 + self.y2) / 2;
        let y1 = center.saturating_sub(height / 2);
        Rect {
            x1: self.x1,
            y1,
            x2: self.x2,
            y2: y1 + height - 1,
        }
    }

    /// Grow each edge by the given amount, clamped to a `width`×`height`
    /// frame.
    pub fn expanded(&self, left: u32, top: u32, right: u32, bottom: u32, width: u32, height: u32) -> Rect {
        Rect {
            x1: self.x1.saturating_sub(left),
            y1: self.y1.saturating_sub(top),
            x2: min(self.x2.saturating_add(right), width - 1),
            y2: min(self.y2.saturating_add(bottom), height - 1),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRect {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl<'de> Deserialize<'de> for Rect {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = RawRect::deserialize(d)?;
        if raw.x2 < raw.x1 || raw.y2 < raw.y1 {
            return Err(de::Error::custom(format!(
                "inverted rectangle: ({},{})-({},{})",
                raw.x1, raw.y1, raw.x2, raw.y2
            )));
        }
        Ok(Rect {
            x1: raw.x1,
            y1: raw.y1,
            x2: raw.x2,
            y2: raw.y2,
        })
    }
}
