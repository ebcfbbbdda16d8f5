//! Console progress bars for file transfers.

use std::collections::HashMap;
use std::sync::Mutex;

use alist_mirror::ProgressSink;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg:40!} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} {eta}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:40!} {bytes} {bytes_per_sec}";

/// One bar per active transfer, removed when the transfer ends.
pub(crate) struct ConsoleProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ConsoleProgress {
    pub(crate) fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar_for(total_bytes: u64) -> ProgressBar {
        // Unknown sizes (no content-length) get a spinner
        if total_bytes == 0 {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        } else {
            let bar = ProgressBar::new(total_bytes);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn transfer_started(&self, file: &str, total_bytes: u64) {
        let bar = self.multi.add(Self::bar_for(total_bytes));
        bar.set_message(file.to_string());
        if let Ok(mut bars) = self.bars.lock() {
            // A retry restarts the transfer, replacing the old bar
            if let Some(old) = bars.insert(file.to_string(), bar) {
                old.finish_and_clear();
                self.multi.remove(&old);
            }
        }
    }

    fn transfer_progress(&self, file: &str, bytes: u64) {
        if let Ok(bars) = self.bars.lock()
            && let Some(bar) = bars.get(file)
        {
            bar.inc(bytes);
        }
    }

    fn transfer_finished(&self, file: &str, _succeeded: bool) {
        let removed = self.bars.lock().ok().and_then(|mut bars| bars.remove(file));
        if let Some(bar) = removed {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}
