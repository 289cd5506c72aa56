use crate::domain::model::ProgressEvent;
use crate::domain::ports::ProgressSink;

/// Logs progress through tracing: every `every` rows at info level and
/// always on the last row.
#[derive(Debug, Clone)]
pub struct TracingProgress {
    every: usize,
}

impl TracingProgress {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }

    fn should_report(&self, event: &ProgressEvent) -> bool {
        event.processed == event.total || event.processed % self.every == 0
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new(25)
    }
}

impl ProgressSink for TracingProgress {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if self.should_report(event) {
            tracing::info!(
                "📊 Progress {}/{} - created: {}, failed: {}",
                event.processed,
                event.total,
                event.created,
                event.failed
            );
        } else {
            tracing::debug!("Progress {}/{}", event.processed, event.total);
        }
    }
}
