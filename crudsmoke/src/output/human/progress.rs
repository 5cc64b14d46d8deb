use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Spinner on stderr, started on the first update.
pub(crate) struct HumanProgress {
    pb: ProgressBar,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
        pb.set_style(spinner_style());
        pb.set_prefix("crud");
        Self { pb }
    }

    pub(crate) fn update(&self, message: String) {
        if self.pb.position() == 0 {
            self.pb.enable_steady_tick(Duration::from_millis(120));
        }
        self.pb.inc(1);
        self.pb.set_message(message);
    }

    pub(crate) fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
