//! Progress rendering over indicatif.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use waybackup_core::ProgressSink;

/// Progress sink backed by an indicatif bar.
///
/// Disabled sinks swallow everything, so callers never branch on the
/// `--progress` flag themselves. The interior mutex keeps the sink safe for
/// the concurrent download workers.
pub struct IndicatifSink {
    bar: Mutex<Option<ProgressBar>>,
    enabled: bool,
}

impl IndicatifSink {
    pub fn new(enabled: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            enabled,
        }
    }

    fn snapshot_style() -> ProgressStyle {
        ProgressStyle::with_template("{bar:50} {pos}/{len} snapshots {elapsed}")
            .expect("valid progress template")
    }

    fn byte_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner} download cdx {bytes}")
            .expect("valid progress template")
    }
}

impl ProgressSink for IndicatifSink {
    fn start(&self, total: u64, prefill: u64) {
        if !self.enabled {
            return;
        }
        let bar = ProgressBar::new(total).with_style(Self::snapshot_style());
        bar.set_position(prefill);
        *self.bar.lock().expect("progress bar lock") = Some(bar);
    }

    fn tick(&self) {
        if let Some(bar) = &*self.bar.lock().expect("progress bar lock") {
            bar.inc(1);
        }
    }

    fn bytes(&self, delta: u64) {
        if !self.enabled {
            return;
        }
        let mut guard = self.bar.lock().expect("progress bar lock");
        let bar = guard
            .get_or_insert_with(|| ProgressBar::new_spinner().with_style(Self::byte_style()));
        bar.inc(delta);
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.lock().expect("progress bar lock").take() {
            bar.finish();
        }
    }
}
