//! Terminal progress reporting.  Mostly progress bars; logging setup rides
//! along because the two need to be initialized together to avoid garbled
//! output.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Shared UI state.
#[derive(Clone)]
pub struct Ui {
    multi_progress: MultiProgress,
}

impl Ui {
    /// Create the UI and initialize logging.  Call once, from the binary.
    pub fn init() -> Ui {
        env_logger::init();
        Ui {
            multi_progress: MultiProgress::new(),
        }
    }

    /// A UI that draws nothing.  Used by tests and library callers that
    /// own their own logging.
    pub fn hidden() -> Ui {
        Ui {
            multi_progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// A progress bar over `len` menus.
    pub fn menu_bar(&self, len: usize) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("{msg:20} {pos:>3}/{len:3} {wide_bar:.green/dim} {elapsed_precise}")
            .expect("bad progress bar template");
        let bar = ProgressBar::new(cast::u64(len)).with_style(style);
        self.multi_progress.add(bar)
    }
}
