use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink};

/// One progress bar per stage, redrawn on stderr.
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:>10.bold} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn event(&self, event: ProgressEvent) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        match event {
            ProgressEvent::StageStarted { stage, total } => {
                if let Some(previous) = guard.take() {
                    previous.finish_and_clear();
                }
                let bar = ProgressBar::new(total as u64);
                bar.set_style(Self::style());
                bar.set_prefix(stage.to_string());
                bar.enable_steady_tick(Duration::from_millis(120));
                *guard = Some(bar);
            }
            ProgressEvent::Item { label, .. } => {
                if let Some(bar) = guard.as_ref() {
                    bar.set_message(label);
                    bar.inc(1);
                }
            }
            ProgressEvent::StageFinished { message, .. } => {
                if let Some(bar) = guard.take() {
                    bar.finish_with_message(message);
                }
            }
        }
    }
}

/// Reports stage boundaries through `tracing`, for non-interactive runs.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage, total } => {
                info!(%stage, total, "stage started");
            }
            ProgressEvent::Item { stage, label } => {
                debug!(%stage, item = %label, "processing");
            }
            ProgressEvent::StageFinished { stage, message } => {
                info!(%stage, "{message}");
            }
        }
    }
}
