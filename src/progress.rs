//! Progress reporting for ingestion runs.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive state
//! transitions, status-line updates and per-page upload events. The CLI uses
//! it to drive an indicatif bar; tests use it to assert ordering.
//!
//! [`ProgressEstimate`] holds the percentage heuristic: two steps per source
//! spread, capped at 95 until the run is finished.

use crate::ingest::{IngestReport, IngestState};
use std::sync::Arc;

/// Called by the orchestrator as a run advances.
///
/// All methods default to no-ops. Events are delivered from the task driving
/// the run, one at a time and in order.
pub trait IngestProgressCallback: Send + Sync {
    /// The run entered `state`.
    fn on_state_change(&self, state: &IngestState) {
        let _ = state;
    }

    /// The status line or percentage changed.
    ///
    /// # Arguments
    /// * `message` - human-readable status text
    /// * `percent` - 0–100, never decreasing within a run
    fn on_status(&self, message: &str, percent: u8) {
        let _ = (message, percent);
    }

    /// One page was accepted by the API.
    fn on_page_uploaded(&self, page_number: u32, is_cover: bool) {
        let _ = (page_number, is_cover);
    }

    /// The run finished successfully.
    fn on_ingest_complete(&self, report: &IngestReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

/// Percentage heuristic for a run over `spreads` source images.
///
/// Every spread counts as two steps, including the cover spread that only
/// yields one page, so the figure is approximate. It is capped at
/// [`ProgressEstimate::CAP`] so 100 is only ever reported by the orchestrator
/// once everything has been uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEstimate {
    total_steps: usize,
    current_step: usize,
}

impl ProgressEstimate {
    pub const CAP: u8 = 95;

    pub fn for_spreads(spreads: usize) -> Self {
        Self {
            total_steps: spreads * 2,
            current_step: 0,
        }
    }

    /// Record one finished spread and return the new percentage.
    pub fn complete_spread(&mut self) -> u8 {
        self.current_step = (self.current_step + 2).min(self.total_steps);
        self.percent()
    }

    pub fn percent(&self) -> u8 {
        if self.total_steps == 0 {
            return 0;
        }
        let raw = self.current_step as f64 / self.total_steps as f64 * 100.0;
        raw.min(Self::CAP as f64).round() as u8
    }
}
