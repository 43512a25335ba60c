//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter for fanned-out snapshot operations
#[derive(Debug)]
pub struct ProgressReporter {
    tasks_pb: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Progress bar over `total` create or destroy tasks
    pub fn new_for_tasks(total: u64, message: &str) -> Self {
        Self {
            tasks_pb: Some(create_progress_bar(total, message)),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self { tasks_pb: None }
    }

    /// Task bar when `show` is set and there is work to report on
    pub fn for_tasks(show: bool, total: usize, message: &str) -> Self {
        if show && total > 0 {
            Self::new_for_tasks(total as u64, message)
        } else {
            Self::new_minimal()
        }
    }

    /// Record one finished task; callable from any worker thread
    pub fn inc(&self) {
        if let Some(pb) = &self.tasks_pb {
            pb.inc(1);
        }
    }

    pub fn finish(&mut self, message: &str) {
        if let Some(pb) = self.tasks_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.tasks_pb.take() {
            pb.finish_and_clear();
        }
    }
}

const TASK_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} {msg}";

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(TASK_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
