//! The `menu_images` pipeline stage.
//!
//! Per menu VOB the flow is strictly sequential: demux, reassemble, decode,
//! cluster, sample frames, match pages, align, regularize, emit.  Menus are
//! independent of each other; one menu failing its external tools degrades
//! that menu alone.  Only schema violations on inputs and internal
//! invariant violations abort the whole stage.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use image::DynamicImage;
use log::{debug, info, warn};
use menuspu::{connected_regions, spu_packets, Rect, SpuError, SpuPacket, FRAME_WIDTH};

use crate::align;
use crate::bands;
use crate::cluster;
use crate::emit;
use crate::errors::InvariantViolation;
use crate::fallback;
use crate::models::{ButtonEntry, MenuDecl, MenuImages, MenuMap, RectSource, StageMeta};
use crate::pages;
use crate::regularize;
use crate::report;
use crate::tools::{FrameSampler, Ocr};
use crate::ui::Ui;
use crate::Result;

/// Stage names this tool knows, in pipeline order.
pub const STAGES: &[&str] = &["menu_images"];

/// Options controlling a stage run.  Tool timeouts live on the capability
/// implementations themselves; the stage only carries what it interprets.
#[derive(Debug, Default)]
pub struct StageOptions {
    /// Write per-menu SPU stream reports.
    pub debug_spu: bool,
}

/// Everything one menu produced.
struct MenuOutcome {
    entries: Vec<ButtonEntry>,
    warnings: Vec<String>,
}

/// One page's worth of SPU-derived rectangles.
struct SpuPage {
    rects: Vec<Rect>,
}

/// Run the `menu_images` stage end to end.
///
/// Reads the validated menu map at `menu_map_path`, writes one PNG per
/// button entry under `<out_dir>/menu_images/<menu_id>/` plus the
/// `menu_images.json` artifact and stage metadata under `out_dir`.
pub async fn run_menu_images(
    menu_map_path: &Path,
    out_dir: &Path,
    sampler: &dyn FrameSampler,
    ocr: &dyn Ocr,
    ui: &Ui,
    options: &StageOptions,
) -> Result<MenuImages> {
    let started_at = Utc::now();
    let started = Instant::now();

    let menu_map = MenuMap::load(menu_map_path)?;
    let stage_dir = out_dir.join("menu_images");
    fs::create_dir_all(&stage_dir)
        .with_context(|| format!("could not create {}", stage_dir.display()))?;

    let mut images = Vec::new();
    let mut warnings = Vec::new();
    let bar = ui.menu_bar(menu_map.menus.len());
    for menu in &menu_map.menus {
        bar.set_message(menu.menu_id.clone());
        match process_menu(menu, &stage_dir, out_dir, sampler, ocr, options).await {
            Ok(outcome) => {
                images.extend(outcome.entries);
                warnings.extend(outcome.warnings);
            }
            Err(err) => {
                // Invariant violations must not be swallowed per-menu.
                if err.downcast_ref::<InvariantViolation>().is_some() {
                    return Err(err);
                }
                warn!("menu {}: {:#}", menu.menu_id, err);
                warnings.push(format!("menu {}: {:#}", menu.menu_id, err));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let artifact = MenuImages { images, warnings };
    let artifact_path = out_dir.join("menu_images.json");
    artifact.write(&artifact_path)?;

    let finished_at = Utc::now();
    StageMeta {
        stage: "menu_images".to_string(),
        started_at,
        finished_at,
        duration_ms: started.elapsed().as_millis() as u64,
        inputs: vec![menu_map_path.display().to_string()],
        outputs: vec![artifact_path.display().to_string()],
    }
    .write(out_dir)?;

    info!(
        "menu_images: {} entries across {} menus",
        artifact.images.len(),
        menu_map.menus.len()
    );
    Ok(artifact)
}

/// Decode the SPU side of one menu: complete menu-flagged packets become
/// per-page rectangle sets, in disc order.
fn decode_spu_pages(menu_id: &str, packets: &[SpuPacket]) -> Vec<SpuPage> {
    let mut spu_pages = Vec::new();
    for packet in packets {
        match packet.decode() {
            Ok((_, bitmap)) => {
                let regions = connected_regions(&bitmap);
                let mut rects = cluster::cluster_page(&regions, FRAME_WIDTH);
                if rects.is_empty() {
                    // Cluster underflow: the overlay decoded but matched
                    // neither authoring style.  Try text bands before
                    // giving the page up.
                    rects = bands::detect_text_bands(&bitmap);
                    if !rects.is_empty() {
                        debug!(
                            "menu {}: recovered {} text bands on page {}",
                            menu_id,
                            rects.len(),
                            spu_pages.len()
                        );
                    }
                }
                spu_pages.push(SpuPage { rects });
            }
            Err(err @ SpuError::Unsupported(_)) => {
                debug!("menu {}: skipping packet: {}", menu_id, err);
            }
            Err(err) => {
                debug!("menu {}: dropping packet: {}", menu_id, err);
            }
        }
    }
    spu_pages
}

async fn process_menu(
    menu: &MenuDecl,
    stage_dir: &Path,
    out_root: &Path,
    sampler: &dyn FrameSampler,
    ocr: &dyn Ocr,
    options: &StageOptions,
) -> Result<MenuOutcome> {
    let mut warnings = Vec::new();

    if !menuspu::is_program_stream(&menu.vob_path)
        .with_context(|| format!("could not read {}", menu.vob_path.display()))?
    {
        warn!(
            "menu {}: {} is not an MPEG program stream",
            menu.menu_id,
            menu.vob_path.display()
        );
        warnings.push(format!(
            "menu {}: malformed input, relying on visual fallback",
            menu.menu_id
        ));
    }

    // Decode the SPU path.  The VOB buffer is dropped right after.
    let spu_pages;
    {
        let vob = fs::read(&menu.vob_path)
            .with_context(|| format!("could not read {}", menu.vob_path.display()))?;
        let packets: Vec<SpuPacket> = spu_packets(&vob).collect();
        debug!(
            "menu {}: {} complete SPU packets",
            menu.menu_id,
            packets.len()
        );
        if options.debug_spu {
            report::write_report(&report::build_report(&packets), out_root, &menu.menu_id)?;
        }
        spu_pages = decode_spu_pages(&menu.menu_id, &packets);
    }

    // Sample frames and classify pages.  Tool failures here fail the menu.
    let frames_dir = tempfile::tempdir().context("could not create frames directory")?;
    let frame_paths = sampler.sample(&menu.vob_path, frames_dir.path()).await?;
    let page_groups = pages::classify_pages(&frame_paths)?;

    if spu_pages.len() != page_groups.len() {
        warn!(
            "menu {}: {} SPU pages vs {} frame pages; pairing the first {}",
            menu.menu_id,
            spu_pages.len(),
            page_groups.len(),
            spu_pages.len().min(page_groups.len())
        );
    }
    let paired = spu_pages.len().min(page_groups.len());

    let menu_dir = stage_dir.join(crate::paths::sanitize_filename(&menu.menu_id));
    fs::create_dir_all(&menu_dir)
        .with_context(|| format!("could not create {}", menu_dir.display()))?;

    // Per page: align against OCR, regularize, clip.
    let expected = menu.expected_button_count as usize;
    let mut page_frames: Vec<DynamicImage> = Vec::with_capacity(page_groups.len());
    for group in &page_groups {
        page_frames.push(pages::load_representative(group)?);
    }
    let mut placed: Vec<(usize, Rect, RectSource)> = Vec::new();
    for (page_index, spu_page) in spu_pages.iter().take(paired).enumerate() {
        let frame = &page_frames[page_index];
        let (frame_w, frame_h) = (frame.width(), frame.height());
        let mut rects = spu_page.rects.clone();
        if !rects.is_empty() {
            let ocr_text = ocr.recognize(&page_groups[page_index].representative).await?;
            if let Some(shift) = align::compute_shift(&rects, &ocr_text.lines, frame_h) {
                debug!(
                    "menu {}: page {} shifted by {}px",
                    menu.menu_id, page_index, shift
                );
                align::apply_shift(&mut rects, shift, frame_h);
            }
        }
        let rects = regularize::regularize_page(rects, expected);
        for rect in rects {
            match emit::clip_to_frame(rect, frame_w, frame_h) {
                Some(clipped) => placed.push((page_index, clipped, RectSource::Spu)),
                None => warn!(
                    "menu {}: dropping off-frame rectangle {:?}",
                    menu.menu_id, rect
                ),
            }
        }
    }

    // Menu-level fallback: make up the shortfall from the frames alone.
    if placed.len() < expected {
        warn!(
            "menu {}: SPU path yielded {} of {} expected rectangles, \
             trying dark-region fallback",
            menu.menu_id,
            placed.len(),
            expected
        );
        for page_index in 0..page_groups.len() {
            if placed.len() >= expected {
                break;
            }
            let luma = page_frames[page_index].to_luma8();
            for rect in fallback::detect_dark_regions(&luma) {
                if placed.len() >= expected {
                    break;
                }
                let clashes = placed
                    .iter()
                    .any(|(page, existing, _)| *page == page_index && existing.overlaps(&rect));
                if !clashes {
                    placed.push((page_index, rect, RectSource::Fallback));
                }
            }
        }
    }

    if placed.is_empty() {
        warn!("menu {}: no button rectangles found", menu.menu_id);
        warnings.push(format!("menu {}: no button rectangles found", menu.menu_id));
        return Ok(MenuOutcome {
            entries: Vec::new(),
            warnings,
        });
    }

    // Emit crops.  Stable sort: SPU order within a page is authoritative,
    // fallback rectangles follow their page's SPU rectangles.
    placed.sort_by_key(|(page_index, _, _)| *page_index);
    let mut entries = Vec::with_capacity(placed.len());
    for (index, (page_index, rect, source)) in placed.iter().enumerate() {
        entries.push(emit::emit_entry(
            &page_frames[*page_index],
            &menu.menu_id,
            index + 1,
            *page_index,
            *rect,
            *source,
            &menu_dir,
            out_root,
        )?);
    }
    debug!("menu {}: emitted {} entries", menu.menu_id, entries.len());
    Ok(MenuOutcome { entries, warnings })
}
