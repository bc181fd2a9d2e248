use crate::entities::{Attachment, StepStatus};
use crate::error::ReportError;

/// Trait for the test-report lifecycle that intercepted calls are recorded into
///
/// Steps are addressed by the identifier passed to `start_step`, so calls running
/// concurrently on different tasks never share an ambient "current step".
pub trait ReportLifecycle: Send + Sync {
    /// Open a new step in the pending state
    fn start_step(&self, uuid: &str, name: &str) -> Result<(), ReportError>;

    /// Append an attachment to a running step
    fn add_attachment(&self, uuid: &str, attachment: Attachment) -> Result<(), ReportError>;

    /// Set the status of a running step
    fn update_step_status(&self, uuid: &str, status: StepStatus) -> Result<(), ReportError>;

    /// Stop a running step; no further changes are accepted afterwards
    fn stop_step(&self, uuid: &str) -> Result<(), ReportError>;
}
