//! First-use progress indicator with CI fallback

use super::context::UiContext;
use crate::cache::NoticeSink;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Message shown while a deployment is being restored
pub const FIRST_USE_MESSAGE: &str = "Preparing for first use...";

/// Notice shown on stderr when the first deployment of a build is slow
///
/// Interactive terminals get a spinner that is cleared once the deployment
/// finishes. Elsewhere a single plain line is written.
pub struct FirstUseNotice {
    interactive: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl FirstUseNotice {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            interactive: ctx.use_fancy_output(),
            spinner: Mutex::new(None),
        }
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {prefix:.dim} {msg}")
        {
            bar.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        bar.set_prefix("[runx]");
        bar.set_message(FIRST_USE_MESSAGE);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}

impl NoticeSink for FirstUseNotice {
    fn show(&self) {
        if !self.interactive {
            eprintln!("{} {}", style("[runx]").dim(), FIRST_USE_MESSAGE);
            return;
        }
        if let Ok(mut slot) = self.spinner.lock() {
            slot.get_or_insert_with(Self::spinner);
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(bar) = slot.take() {
                bar.disable_steady_tick();
                bar.finish_and_clear();
            }
        }
    }
}
