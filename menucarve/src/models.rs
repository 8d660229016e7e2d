//! Validated artifact models crossing the stage boundary.
//!
//! Artifacts are plain JSON with fixed schemas: unknown keys are rejected on
//! load and numeric ranges are validated before anything downstream sees the
//! data.  Stages read validated structures, never free-form records.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use log::debug;
use menuspu::Rect;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Which algorithm produced a rectangle.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RectSource {
    /// Decoded from the menu's SPU overlay stream.
    Spu,
    /// Synthesized by the visual dark-region fallback.
    Fallback,
}

/// One menu declared by the nav stage.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MenuDecl {
    /// Identifier the nav stage assigned to this menu, e.g. `VTSM_01`.
    pub menu_id: String,
    /// Path to the menu-carrying VOB.
    pub vob_path: PathBuf,
    /// How many buttons the nav tables say this menu has.
    pub expected_button_count: u32,
}

/// The input artifact: the read-only `{menu_id → (vob, expected count)}`
/// mapping supplied by the nav stage.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MenuMap {
    /// Declared menus, in processing order.
    pub menus: Vec<MenuDecl>,
}

impl MenuMap {
    /// Load and validate a menu map.  Schema violations are fatal.
    pub fn load(path: &Path) -> Result<MenuMap> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("missing upstream artifact: {}", path.display()))?;
        let map: MenuMap = serde_json::from_str(&text)
            .with_context(|| format!("invalid menu map: {}", path.display()))?;
        map.validate()
            .with_context(|| format!("invalid menu map: {}", path.display()))?;
        debug!("loaded menu map with {} menus", map.menus.len());
        Ok(map)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for menu in &self.menus {
            if menu.menu_id.is_empty() {
                bail!("menu_id must be non-empty");
            }
            if !seen.insert(menu.menu_id.as_str()) {
                bail!("duplicate menu_id {:?}", menu.menu_id);
            }
            if !(1..=99).contains(&menu.expected_button_count) {
                bail!(
                    "expected_button_count {} for menu {:?} outside 1..=99",
                    menu.expected_button_count,
                    menu.menu_id
                );
            }
        }
        Ok(())
    }
}

/// One emitted button entry.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonEntry {
    /// Identifier unique within the menu, `btn1`, `btn2`, … in emission
    /// order.
    pub entry_id: String,
    /// The menu this entry belongs to.
    pub menu_id: String,
    /// Which menu page the rectangle sits on.
    pub page_index: usize,
    /// The button rectangle in frame coordinates.
    pub rect: Rect,
    /// Path of the cropped PNG, under the stage output directory.
    pub image_path: PathBuf,
    /// Which algorithm produced the rectangle.
    pub source: RectSource,
}

/// The stage output artifact, `menu_images.json`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MenuImages {
    /// All emitted entries, grouped by menu in input order.
    pub images: Vec<ButtonEntry>,
    /// Human-readable warnings, e.g. menus that yielded zero rectangles.
    pub warnings: Vec<String>,
}

impl MenuImages {
    /// Write the artifact as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("could not write {}", path.display()))?;
        Ok(())
    }

    /// Load a previously written artifact, validating entry uniqueness.
    pub fn load(path: &Path) -> Result<MenuImages> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("missing artifact: {}", path.display()))?;
        let artifact: MenuImages = serde_json::from_str(&text)
            .with_context(|| format!("invalid artifact: {}", path.display()))?;
        let mut seen = BTreeSet::new();
        for entry in &artifact.images {
            if !seen.insert((entry.menu_id.as_str(), entry.entry_id.as_str())) {
                bail!("duplicate entry {}/{}", entry.menu_id, entry.entry_id);
            }
        }
        Ok(artifact)
    }
}

/// Execution metadata written next to each stage's outputs.
#[derive(Debug, Serialize)]
pub struct StageMeta {
    /// Stage name.
    pub stage: String,
    /// RFC 3339 UTC start time.
    pub started_at: DateTime<Utc>,
    /// RFC 3339 UTC finish time.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Paths of consumed artifacts.
    pub inputs: Vec<String>,
    /// Paths of produced artifacts.
    pub outputs: Vec<String>,
}

impl StageMeta {
    /// Write the metadata under `<out_dir>/stage_meta/<stage>.json`.
    pub fn write(&self, out_dir: &Path) -> Result<()> {
        let dir = out_dir.join("stage_meta");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", self.stage));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("could not write {}", path.display()))?;
        Ok(())
    }
}
