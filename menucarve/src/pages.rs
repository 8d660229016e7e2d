//! Grouping of sampled menu frames into pages.
//!
//! A "page" is a discrete visual menu state.  Frames sampled from a menu
//! VOB are grouped by mean absolute grayscale difference: big jumps mean a
//! page change, small ones are dithering or compression noise.

use std::path::PathBuf;

use anyhow::Context;
use image::GrayImage;
use log::debug;

use crate::Result;

/// Mean absolute grayscale difference above which two consecutive frames
/// belong to different pages.
pub const PAGE_DIFF_THRESHOLD: f64 = 4.0;

/// A group of visually identical frames forming one menu page.
#[derive(Clone, Debug)]
pub struct PageGroup {
    /// 0-based page index, matched positionally against SPU packets.
    pub index: usize,
    /// The first frame of the group; all crops come from it.
    pub representative: PathBuf,
    /// All frames in the group, in decode order.
    pub frames: Vec<PathBuf>,
}

/// Mean absolute difference between two frames of equal dimensions, or
/// `None` when the dimensions differ (callers treat that as a boundary).
pub fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    Some(total as f64 / a.as_raw().len() as f64)
}

/// Assign a group index to each image, walking consecutive pairs.
pub fn classify_groups(images: &[GrayImage]) -> Vec<usize> {
    let mut groups = Vec::with_capacity(images.len());
    let mut current = 0;
    for (index, image) in images.iter().enumerate() {
        if index > 0 {
            let boundary = match mean_abs_diff(&images[index - 1], image) {
                Some(diff) => {
                    if diff > PAGE_DIFF_THRESHOLD {
                        debug!("page boundary before frame {index}: diff {diff:.2}");
                        true
                    } else {
                        false
                    }
                }
                // A decoded-size change between frames is a page change.
                None => true,
            };
            if boundary {
                current += 1;
            }
        }
        groups.push(current);
    }
    groups
}

/// Load the sampled frames and classify them into page groups.
pub fn classify_pages(frames: &[PathBuf]) -> Result<Vec<PageGroup>> {
    let mut lumas = Vec::with_capacity(frames.len());
    for frame in frames {
        let img = image::open(frame)
            .with_context(|| format!("could not read frame {}", frame.display()))?;
        lumas.push(img.to_luma8());
    }
    let assignment = classify_groups(&lumas);
    let mut pages: Vec<PageGroup> = Vec::new();
    for (frame, &group) in frames.iter().zip(&assignment) {
        if group == pages.len() {
            pages.push(PageGroup {
                index: group,
                representative: frame.clone(),
                frames: Vec::new(),
            });
        }
        pages[group].frames.push(frame.clone());
    }
    debug!("classified {} frames into {} pages", frames.len(), pages.len());
    Ok(pages)
}

/// Load a page's representative frame.
pub fn load_representative(page: &PageGroup) -> Result<image::DynamicImage> {
    image::open(&page.representative)
        .with_context(|| format!("could not read frame {}", page.representative.display()))
}
