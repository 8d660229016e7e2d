//! External tool capabilities: frame sampling and OCR.
//!
//! Both are modelled as traits so the stage can run against stubs in tests
//! and against `ffmpeg`/`tesseract` in production.  Every invocation runs
//! under a hard timeout and failures surface as typed [`ToolError`]s.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use menuspu::Rect;
use tokio::process::Command;

use crate::errors::ToolError;
use crate::Result;

/// Default hard timeout for one external-tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// How many evenly-spaced frames to pull from a menu of credible duration.
const FRAME_SAMPLES: usize = 8;

/// Below this declared duration we decode every frame instead of seeking;
/// menu VOBs routinely declare sub-second durations that bear no relation
/// to their real frame count.
const SHORT_MENU_SECS: f64 = 1.0;

/// Run a command to completion under a hard timeout.
async fn run_tool(
    mut cmd: Command,
    tool: &str,
    timeout: Duration,
) -> std::result::Result<Output, ToolError> {
    cmd.kill_on_drop(true);
    debug!("running {:?}", cmd.as_std());
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            return Err(ToolError::TimedOut {
                tool: tool.to_string(),
                seconds: timeout.as_secs(),
            })
        }
        Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ToolError::Missing {
                tool: tool.to_string(),
            })
        }
        Ok(Err(err)) => {
            return Err(ToolError::Io {
                tool: tool.to_string(),
                source: err,
            })
        }
        Ok(Ok(output)) => output,
    };
    if !output.status.success() {
        let stderr: String = String::from_utf8_lossy(&output.stderr)
            .chars()
            .take(300)
            .collect();
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }
    Ok(output)
}

/// The frame-sampling capability: given a video file, produce an ordered
/// list of decoded frame images.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Extract representative frames from `vob` into `out_dir`, returning
    /// the frame image paths in decode order.
    async fn sample(&self, vob: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// The OCR capability: text plus text-line bounding boxes for an image.
#[async_trait]
pub trait Ocr: Send + Sync {
    /// Recognize the text in `image`.
    async fn recognize(&self, image: &Path) -> Result<OcrText>;
}

/// OCR output: the recognized text and one bounding box per text line.
#[derive(Clone, Debug, Default)]
pub struct OcrText {
    /// All recognized words, joined with single spaces.
    pub text: String,
    /// Text-line bounding boxes in image coordinates.
    pub lines: Vec<Rect>,
}

/// Frame sampling via `ffprobe` + `ffmpeg`.
pub struct FfmpegSampler {
    timeout: Duration,
}

impl FfmpegSampler {
    /// Create a sampler with the given per-invocation timeout.
    pub fn new(timeout: Duration) -> FfmpegSampler {
        FfmpegSampler { timeout }
    }

    /// Probe the declared duration of a media file, in seconds.
    async fn probe_duration(&self, path: &Path) -> std::result::Result<f64, ToolError> {
        let mut cmd = Command::new("ffprobe");
        cmd.arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path);
        let output = run_tool(cmd, "ffprobe", self.timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration: f64 = stdout.trim().parse().map_err(|_| ToolError::BadOutput {
            tool: "ffprobe".to_string(),
            reason: format!("unparsable duration {:?}", stdout.trim()),
        })?;
        if duration <= 0.0 {
            return Err(ToolError::BadOutput {
                tool: "ffprobe".to_string(),
                reason: format!("non-positive duration {duration}"),
            });
        }
        Ok(duration)
    }

    /// Grab a single frame at `timestamp`.
    async fn grab_frame(
        &self,
        vob: &Path,
        timestamp: f64,
        out: &Path,
    ) -> std::result::Result<(), ToolError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{timestamp:.3}"))
            .arg("-i")
            .arg(vob)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg(out);
        run_tool(cmd, "ffmpeg", self.timeout).await?;
        Ok(())
    }

    /// Decode every frame of a (short) menu into `out_dir`.
    async fn grab_all_frames(
        &self,
        vob: &Path,
        out_dir: &Path,
    ) -> std::result::Result<(), ToolError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-y")
            .arg("-i")
            .arg(vob)
            .arg("-vsync")
            .arg("0")
            .arg(out_dir.join("frame_%04d.png"));
        run_tool(cmd, "ffmpeg", self.timeout).await?;
        Ok(())
    }
}

/// List `frame_*.png` files in `dir`, sorted by name.
fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("frame_") && n.ends_with(".png"))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

#[async_trait]
impl FrameSampler for FfmpegSampler {
    async fn sample(&self, vob: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let duration = self.probe_duration(vob).await?;
        if duration < SHORT_MENU_SECS {
            // Declared durations of menu VOBs are unreliable; decode
            // everything rather than seeking into a lie.
            debug!(
                "{}: declared duration {:.3}s, decoding all frames",
                vob.display(),
                duration
            );
            self.grab_all_frames(vob, out_dir).await?;
        } else {
            let step = duration / FRAME_SAMPLES as f64;
            for index in 0..FRAME_SAMPLES {
                let timestamp = (index as f64 * step).min(duration - 0.01);
                let out = out_dir.join(format!("frame_{:04}.png", index + 1));
                if let Err(err) = self.grab_frame(vob, timestamp, &out).await {
                    // Seeks close to the end of a misdeclared menu can
                    // produce nothing; keep whatever we have so far.
                    warn!("frame grab at {:.3}s failed: {}", timestamp, err);
                    break;
                }
                if !out.is_file() {
                    trace!("no frame decoded at {:.3}s", timestamp);
                }
            }
        }
        let frames = collect_frames(out_dir)?;
        if frames.is_empty() {
            return Err(ToolError::BadOutput {
                tool: "ffmpeg".to_string(),
                reason: "no frames decoded".to_string(),
            }
            .into());
        }
        Ok(frames)
    }
}

/// OCR via the `tesseract` CLI in TSV mode.
pub struct TesseractOcr {
    timeout: Duration,
    lang: String,
}

impl TesseractOcr {
    /// Create an OCR capability for the given language string (e.g.
    /// `"eng"` or `"eng+heb"`).
    pub fn new(timeout: Duration, lang: String) -> TesseractOcr {
        TesseractOcr { timeout, lang }
    }
}

/// Parse tesseract's TSV output: level-4 rows are text lines with bounding
/// boxes, level-5 rows are words.
fn parse_tsv(tsv: &str) -> OcrText {
    let mut lines = Vec::new();
    let mut words = Vec::new();
    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = match cols[0].trim().parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let parse4 = |i: usize| cols[i].trim().parse::<i64>().ok();
        let (Some(left), Some(top), Some(width), Some(height)) =
            (parse4(6), parse4(7), parse4(8), parse4(9))
        else {
            continue;
        };
        match level {
            4 if left >= 0 && top >= 0 && width > 0 && height > 0 => {
                lines.push(Rect::new(
                    left as u32,
                    top as u32,
                    (left + width - 1) as u32,
                    (top + height - 1) as u32,
                ));
            }
            5 => {
                let word = cols[11].trim();
                if !word.is_empty() {
                    words.push(word.to_string());
                }
            }
            _ => {}
        }
    }
    OcrText {
        text: words.join(" "),
        lines,
    }
}

#[async_trait]
impl Ocr for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<OcrText> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg("6")
            .arg("tsv");
        let output = run_tool(cmd, "tesseract", self.timeout).await?;
        let tsv = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_tsv(&tsv);
        trace!(
            "{}: OCR found {} lines, {} chars",
            image.display(),
            parsed.lines.len(),
            parsed.text.len()
        );
        Ok(parsed)
    }
}
