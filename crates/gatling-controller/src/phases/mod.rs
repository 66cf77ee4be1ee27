//! Phase handlers for the Gatling controller.
//!
//! Each handler owns one step of the workflow, performs a bounded number of
//! API calls and returns. Transient failures surface as `Err` and are retried
//! by the error policy; unrecoverable ones are written to `status.error` and
//! reported as [`PhaseOutcome::Fatal`].

mod notification;
mod reporter;
mod runner;
mod tracking;

pub use notification::{reconcile_notification, NO_REPORT_URL};
pub use reporter::reconcile_reporter;
pub use runner::reconcile_runner;
pub use tracking::JobKind;

/// Result of a phase handler that did not hit a transient error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Look again after the requeue interval
    Requeue,
    /// The run cannot succeed; `status.error` has been written
    Fatal {
        /// Job the failure belongs to, deleted when cleanup is requested
        job_name: String,
    },
}
