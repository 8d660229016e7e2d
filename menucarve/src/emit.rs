//! Cropping and emission of button images.

use std::path::Path;

use anyhow::Context;
use image::DynamicImage;
use log::trace;
use menuspu::Rect;

use crate::models::{ButtonEntry, RectSource};
use crate::paths;
use crate::Result;

/// Horizontal crop padding, as a fraction of the rectangle width.
const PAD_X_FRACTION: f64 = 0.05;

/// Vertical crop padding, as a fraction of the rectangle height.  Larger
/// than the horizontal padding: tall glyphs and descenders need more room
/// than side boundaries do.
const PAD_Y_FRACTION: f64 = 0.10;

/// Clip a rectangle to the frame, returning `None` when nothing remains.
pub fn clip_to_frame(rect: Rect, width: u32, height: u32) -> Option<Rect> {
    if rect.left() >= width || rect.top() >= height {
        return None;
    }
    Some(Rect::new(
        rect.left(),
        rect.top(),
        rect.right().min(width - 1),
        rect.bottom().min(height - 1),
    ))
}

/// Crop the padded button rectangle out of the frame.
pub fn crop_button(frame: &DynamicImage, rect: Rect) -> DynamicImage {
    let pad_x = (f64::from(rect.width()) * PAD_X_FRACTION).round() as u32;
    let pad_y = (f64::from(rect.height()) * PAD_Y_FRACTION).round() as u32;
    let padded = rect.expanded(pad_x, pad_y, pad_x, pad_y, frame.width(), frame.height());
    trace!("cropping {:?} (padded to {:?})", rect, padded);
    frame.crop_imm(padded.left(), padded.top(), padded.width(), padded.height())
}

/// Crop, save, and describe one button entry.
///
/// The image path is validated against the stage output root before
/// anything is written; an escape is an [`InvariantViolation`] and aborts
/// the run.
#[allow(clippy::too_many_arguments)]
pub fn emit_entry(
    frame: &DynamicImage,
    menu_id: &str,
    entry_index: usize,
    page_index: usize,
    rect: Rect,
    source: RectSource,
    menu_dir: &Path,
    out_root: &Path,
) -> Result<ButtonEntry> {
    let entry_id = format!("btn{entry_index}");
    let image_path = menu_dir.join(format!("{entry_id}.png"));
    let image_path = paths::ensure_inside(&image_path, out_root)?;

    let crop = crop_button(frame, rect);
    crop.save(&image_path)
        .with_context(|| format!("could not write {}", image_path.display()))?;

    Ok(ButtonEntry {
        entry_id,
        menu_id: menu_id.to_string(),
        page_index,
        rect,
        image_path,
        source,
    })
}
