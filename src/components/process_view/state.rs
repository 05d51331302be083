use std::time::Instant;

use log::debug;

use crate::metrics::process::{normalize_filter, CollectResult};
use crate::metrics::ProcessSnapshot;

/// Rows shown under each core.
pub const TOP_PROCESSES: usize = 10;

#[derive(Debug, Default)]
pub struct ProcessView {
    pub search: String,
    pub snapshot: Option<ProcessSnapshot>,
    pub error: Option<String>,
    pub updated_at: Option<Instant>,
}

impl ProcessView {
    pub fn filter(&self) -> String {
        normalize_filter(&self.search)
    }

    /// Keeps the previous table on failure so the tab does not flash empty.
    pub fn apply_result(&mut self, result: CollectResult) {
        match result {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.error = None;
                self.updated_at = Some(Instant::now());
            }
            Err(e) => {
                debug!("process scan result: {e}");
                self.error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CollectError;

    #[test]
    fn failure_keeps_previous_table() {
        let mut view = ProcessView::default();
        view.apply_result(Ok(ProcessSnapshot::empty(2)));
        view.apply_result(Err(CollectError::Panicked));
        assert!(view.snapshot.is_some());
        assert_eq!(view.error.as_deref(), Some("process scan panicked"));

        view.apply_result(Ok(ProcessSnapshot::empty(2)));
        assert!(view.error.is_none());
    }

    #[test]
    fn filter_is_normalized() {
        let view = ProcessView {
            search: "  Chrome ".into(),
            ..ProcessView::default()
        };
        assert_eq!(view.filter(), "chrome");
    }
}
