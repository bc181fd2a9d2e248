//! gRPC Allure Client Interceptor
//!
//! Records every outgoing gRPC call as a test-report step: the method, the
//! request, the response headers, every response message and the final status
//! are attached to the step, and the step passes or fails with the call.
//!
//! # Example
//!
//! ```rust,no_run
//! use grpc_allure_client_interceptor::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run<Req, Resp>(request: Req) -> Result<(), Box<dyn std::error::Error>>
//! # where
//! #     Req: prost_reflect::ReflectMessage + std::fmt::Debug + 'static,
//! #     Resp: prost_reflect::ReflectMessage + std::fmt::Debug + Default + Clone + 'static,
//! # {
//! let lifecycle = Arc::new(InMemoryLifecycle::new());
//! let interceptor = CallInterceptor::builder()
//!     .shared_lifecycle(lifecycle.clone())
//!     .build();
//!
//! let mut client = ReportingClient::connect("http://127.0.0.1:50051", interceptor).await?;
//! let method = GrpcMethod::unary("helloworld.Greeter", "SayHello");
//! let _reply = client.unary::<Req, Resp>(&method, tonic::Request::new(request)).await?;
//!
//! for step in lifecycle.steps() {
//!     println!("{}: {:?}", step.name, step.status);
//! }
//! # Ok(())
//! # }
//! ```

mod adapters;
pub mod entities;
pub mod error;
pub mod use_cases;

#[cfg(test)]
mod fixtures;

use std::sync::Mutex;

use entities::{Attachment, StepResult, StepStatus};

pub use adapters::gateways::{
    RecordedStreaming, ReportingClient, ReportingLayer, ReportingService, ResultsDirectory,
};
pub use error::{FormatError, ReportError};

/// Default lifecycle implementation that keeps steps in memory, in start order
pub struct InMemoryLifecycle {
    steps: Mutex<Vec<StepResult>>,
}

impl InMemoryLifecycle {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every step recorded so far
    pub fn steps(&self) -> Vec<StepResult> {
        self.steps
            .lock()
            .map(|steps| steps.clone())
            .unwrap_or_default()
    }

    pub fn step(&self, uuid: &str) -> Option<StepResult> {
        self.steps
            .lock()
            .ok()
            .and_then(|steps| steps.iter().find(|s| s.uuid == uuid).cloned())
    }

    /// Take a step out of the lifecycle
    pub fn remove(&self, uuid: &str) -> Option<StepResult> {
        let mut steps = self.steps.lock().ok()?;
        let index = steps.iter().position(|s| s.uuid == uuid)?;
        Some(steps.remove(index))
    }

    fn with_running_step(
        &self,
        uuid: &str,
        f: impl FnOnce(&mut StepResult),
    ) -> Result<(), ReportError> {
        let mut steps = self
            .steps
            .lock()
            .map_err(|e| ReportError::Poisoned(e.to_string()))?;
        let step = steps
            .iter_mut()
            .find(|s| s.uuid == uuid)
            .ok_or_else(|| ReportError::StepNotFound(uuid.to_string()))?;
        if step.is_stopped() {
            return Err(ReportError::StepAlreadyStopped(uuid.to_string()));
        }
        f(step);
        Ok(())
    }
}

impl Default for InMemoryLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl use_cases::ports::ReportLifecycle for InMemoryLifecycle {
    fn start_step(&self, uuid: &str, name: &str) -> Result<(), ReportError> {
        let mut steps = self
            .steps
            .lock()
            .map_err(|e| ReportError::Poisoned(e.to_string()))?;
        steps.push(StepResult::new(uuid, name));
        Ok(())
    }

    fn add_attachment(&self, uuid: &str, attachment: Attachment) -> Result<(), ReportError> {
        self.with_running_step(uuid, |step| step.attachments.push(attachment))
    }

    fn update_step_status(&self, uuid: &str, status: StepStatus) -> Result<(), ReportError> {
        self.with_running_step(uuid, |step| step.status = status)
    }

    fn stop_step(&self, uuid: &str) -> Result<(), ReportError> {
        self.with_running_step(uuid, |step| step.mark_stopped())
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::entities::{
        Attachment, CallOutcome, FormatMode, GrpcMethod, MethodKind, StepResult, StepStatus,
    };
    pub use crate::error::{FormatError, ReportError};
    pub use crate::use_cases::ports::ReportLifecycle;
    pub use crate::use_cases::{CallInterceptor, InterceptorBuilder, ProtoFormatter};
    pub use crate::InMemoryLifecycle;
    pub use crate::{
        RecordedStreaming, ReportingClient, ReportingLayer, ReportingService, ResultsDirectory,
    };
}
