mod call_outcome;
mod format_mode;
mod method;
mod step;

pub use call_outcome::CallOutcome;
pub use format_mode::FormatMode;
pub use method::{GrpcMethod, MethodKind};
pub use step::{Attachment, StepResult, StepStatus};

