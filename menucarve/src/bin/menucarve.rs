//! Command-line entry point for the pipeline stage runner.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use menucarve::stage::{run_menu_images, StageOptions, STAGES};
use menucarve::tools::{FfmpegSampler, TesseractOcr};
use menucarve::ui::Ui;

/// Recover menu button images from home-authored disc menus.
#[derive(Debug, Parser)]
#[command(name = "menucarve", version)]
struct Args {
    /// Path to the menu map artifact produced by the nav stage.
    input: Option<PathBuf>,

    /// Output directory for artifacts and button images.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pipeline stage to run.
    #[arg(long, default_value = "menu_images")]
    stage: String,

    /// List the known stages and exit.
    #[arg(long)]
    list_stages: bool,

    /// Hard timeout for each external tool invocation, in seconds.
    #[arg(long, default_value_t = 60)]
    tool_timeout: u64,

    /// Language(s) passed to the OCR engine, e.g. "eng" or "eng+heb".
    #[arg(long, default_value = "eng")]
    ocr_lang: String,

    /// Write per-menu SPU stream reports under spu_report/.
    #[arg(long)]
    debug_spu: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if args.list_stages {
        for stage in STAGES {
            println!("{stage}");
        }
        return;
    }

    let ui = Ui::init();
    let (Some(input), Some(out)) = (args.input, args.out) else {
        eprintln!("error: <input> and --out are required unless --list-stages");
        std::process::exit(2);
    };
    if !STAGES.contains(&args.stage.as_str()) {
        eprintln!("error: unknown stage {:?}", args.stage);
        std::process::exit(2);
    }

    let timeout = Duration::from_secs(args.tool_timeout);
    let sampler = FfmpegSampler::new(timeout);
    let ocr = TesseractOcr::new(timeout, args.ocr_lang);
    let options = StageOptions {
        debug_spu: args.debug_spu,
    };

    if let Err(err) = run_menu_images(&input, &out, &sampler, &ocr, &ui, &options).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
