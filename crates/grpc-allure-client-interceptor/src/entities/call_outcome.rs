use std::fmt;

use tonic::{Code, Status};

/// Terminal status of an intercepted call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub code: Code,
    pub message: String,
}

impl CallOutcome {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    /// Outcome recorded when a call is dropped before its terminal event
    pub fn cancelled() -> Self {
        Self::new(Code::Cancelled, "call dropped before completion")
    }

    pub fn is_success(&self) -> bool {
        self.code == Code::Ok
    }
}

impl From<&Status> for CallOutcome {
    fn from(status: &Status) -> Self {
        Self::new(status.code(), status.message())
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "code: {:?}", self.code)?;
        if !self.message.is_empty() {
            writeln!(f, "message: {:?}", self.message)?;
        }
        Ok(())
    }
}
