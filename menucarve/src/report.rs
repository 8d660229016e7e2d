//! Optional SPU stream diagnostics, written under `spu_report/` when the
//! stage runs with `--debug-spu`.  Strictly informational; nothing in the
//! pipeline reads these back.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use menuspu::{Rect, SpuPacket};
use serde::Serialize;

use crate::Result;

/// Aggregate statistics for one substream.
#[derive(Debug, Serialize)]
pub struct SubstreamSummary {
    /// The substream ID, in `0x20..=0x3F`.
    pub substream_id: u8,
    /// Number of complete packets reassembled.
    pub packets: usize,
    /// Total reassembled bytes.
    pub bytes: usize,
}

/// One reassembled packet, described without its payload.
#[derive(Debug, Serialize)]
pub struct PacketSummary {
    /// The substream the packet was carried on.
    pub substream_id: u8,
    /// Total packet size in bytes.
    pub size: usize,
    /// Declared control-sequence offset.
    pub control_offset: usize,
    /// Whether the control sequence parsed as a menu overlay.
    pub is_menu: bool,
    /// The display rectangle, when the control sequence parsed.
    pub display_rect: Option<Rect>,
}

/// The per-menu report document.
#[derive(Debug, Serialize)]
pub struct SpuReport {
    /// Per-substream aggregates, ordered by substream ID.
    pub substreams: Vec<SubstreamSummary>,
    /// All complete packets in disc order.
    pub packets: Vec<PacketSummary>,
}

/// Summarize a menu's reassembled packets.
pub fn build_report(packets: &[SpuPacket]) -> SpuReport {
    let mut by_substream: BTreeMap<u8, (usize, usize)> = BTreeMap::new();
    let mut summaries = Vec::with_capacity(packets.len());
    for packet in packets {
        let entry = by_substream.entry(packet.substream_id).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += packet.total_size();
        let control = packet.parse_control().ok();
        summaries.push(PacketSummary {
            substream_id: packet.substream_id,
            size: packet.total_size(),
            control_offset: packet.control_offset(),
            is_menu: control.as_ref().map(|c| c.is_menu).unwrap_or(false),
            display_rect: control.map(|c| c.rect),
        });
    }
    SpuReport {
        substreams: by_substream
            .into_iter()
            .map(|(substream_id, (packets, bytes))| SubstreamSummary {
                substream_id,
                packets,
                bytes,
            })
            .collect(),
        packets: summaries,
    }
}

/// Write a menu's report under `<out_dir>/spu_report/<menu_id>.json`.
pub fn write_report(report: &SpuReport, out_dir: &Path, menu_id: &str) -> Result<()> {
    let dir = out_dir.join("spu_report");
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.json", crate::paths::sanitize_filename(menu_id)));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}
