//! Terminal progress indicators for queries and downloads.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while a catalog query runs. Inert when disabled.
pub(crate) struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub(crate) fn start(enabled: bool, message: String) -> Self {
        if !enabled {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub(crate) fn set_message(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.set_message(message);
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Byte progress bar for a download; falls back to a spinner until the
/// server announces a length.
pub(crate) struct DownloadProgress {
    bar: Option<ProgressBar>,
    sized: bool,
}

impl DownloadProgress {
    pub(crate) fn new(enabled: bool, name: &str) -> Self {
        if !enabled {
            return Self {
                bar: None,
                sized: false,
            };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar: Some(bar),
            sized: false,
        }
    }

    pub(crate) fn update(&mut self, bytes_transferred: u64, bytes_total: Option<u64>) {
        let Some(bar) = &self.bar else {
            return;
        };
        if let Some(total) = bytes_total
            && !self.sized
        {
            bar.set_length(total);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            self.sized = true;
        }
        bar.set_position(bytes_transferred);
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
