use indicatif::{ProgressBar, ProgressStyle};

use lumen_core::pipeline::types::{PipelineStage, ProgressSink};

/// Progress sink backed by an indicatif bar.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:<24} [{bar:40}] {pos}%")
                .expect("valid progress template"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn report(&self, stage: PipelineStage, fraction: f32, _message: &str) {
        self.bar.set_message(stage.to_string());
        self.bar
            .set_position((fraction.clamp(0.0, 1.0) * 100.0) as u64);
    }
}
