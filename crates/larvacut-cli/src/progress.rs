use indicatif::{ProgressBar, ProgressStyle};
use larvacut_media::ProgressObserver;

pub fn cutting_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan.bold} {bar:40.cyan/blue} {percent:>3}% {pos}/{len} frames [{elapsed_precise}<{eta_precise}] {msg}",
    )
    .expect("invalid cutting bar template")
}

pub fn cutting_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan.bold} [{elapsed_precise}] frames {pos} {msg}")
        .expect("invalid cutting spinner template")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}

/// Terminal progress bar fed by the cutter.
///
/// Starts as a spinner and switches to a bar once the frame count is known.
#[derive(Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(bar: ProgressBar) -> Self {
        bar.set_style(cutting_spinner_style());
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressObserver for BarProgress {
    fn set_status(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn set_progress(&self, current: u64, max: u64) {
        if max > 0 && self.bar.length() != Some(max) {
            self.bar.set_length(max);
            self.bar.set_style(cutting_bar_style());
        }
        self.bar.set_position(current);
    }
}
