//! Recover episode structure from home-authored disc menus.
//!
//! Home-burned DVDs rarely carry usable chapter metadata; the only
//! reliable map of their contents is the interactive menu a human built.
//! This crate implements the `menu_images` pipeline stage: given the menu
//! map produced by the nav-parsing stage, it locates every menu button in
//! the rendered menu frames — decoding the SPU overlay stream with
//! [`menuspu`], clustering pixel regions into button rectangles, matching
//! overlay packets to visual menu pages, aligning against OCR, and
//! falling back to purely visual detection when the overlays are absent
//! or corrupt — then crops one labelled PNG per button for the OCR stage
//! downstream.

#![warn(missing_docs)]

pub use anyhow::{Error, Result};

pub mod align;
pub mod bands;
pub mod cluster;
pub mod emit;
pub mod errors;
pub mod fallback;
pub mod gutter;
pub mod models;
pub mod pages;
pub mod paths;
pub mod regularize;
pub mod report;
pub mod stage;
pub mod stats;
pub mod tools;
pub mod ui;
