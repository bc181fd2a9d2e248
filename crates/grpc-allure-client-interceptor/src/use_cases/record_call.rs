use std::fmt::Debug;
use std::sync::Arc;

use prost_reflect::ReflectMessage;
use tonic::metadata::MetadataMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::format_messages::{format_metadata, ProtoFormatter};
use super::ports::ReportLifecycle;
use crate::entities::{Attachment, CallOutcome, FormatMode, GrpcMethod, StepStatus};
use crate::error::ReportError;
use crate::InMemoryLifecycle;

pub const METHOD_ATTACHMENT: &str = "gRPC method";
pub const REQUEST_ATTACHMENT: &str = "gRPC request";
pub const HEADERS_ATTACHMENT: &str = "gRPC headers";
pub const RESPONSES_ATTACHMENT: &str = "gRPC responses";
pub const STATUS_ATTACHMENT: &str = "gRPC status";

const DEFAULT_STEP_PREFIX: &str = "gRPC interaction";

/// Opens one report step per outgoing call
///
/// # Example
///
/// ```rust
/// use grpc_allure_client_interceptor::prelude::*;
/// use std::fmt::Debug;
/// use std::sync::Arc;
///
/// let lifecycle = Arc::new(InMemoryLifecycle::new());
/// let interceptor = CallInterceptor::builder()
///     .shared_lifecycle(lifecycle.clone())
///     .format_mode(FormatMode::Text)
///     .build();
///
/// assert_eq!(interceptor.formatter().mode(), FormatMode::Text);
/// assert!(lifecycle.steps().is_empty());
/// ```
pub struct CallInterceptor<L = InMemoryLifecycle> {
    lifecycle: Arc<L>,
    formatter: ProtoFormatter,
    step_prefix: String,
    attach_headers: bool,
}

impl<L> Clone for CallInterceptor<L> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            formatter: self.formatter,
            step_prefix: self.step_prefix.clone(),
            attach_headers: self.attach_headers,
        }
    }
}

impl CallInterceptor<InMemoryLifecycle> {
    /// Interceptor recording into a fresh in-memory lifecycle
    pub fn new() -> Self {
        InterceptorBuilder::new().build()
    }

    pub fn builder() -> InterceptorBuilder<InMemoryLifecycle> {
        InterceptorBuilder::new()
    }
}

impl Default for CallInterceptor<InMemoryLifecycle> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ReportLifecycle> CallInterceptor<L> {
    pub fn lifecycle(&self) -> &Arc<L> {
        &self.lifecycle
    }

    pub fn formatter(&self) -> &ProtoFormatter {
        &self.formatter
    }

    /// Request send: open the step and attach the method and the request.
    ///
    /// The request is only read, never modified.
    pub fn begin<Req, Resp>(&self, method: &GrpcMethod, request: &Req) -> CallRecord<Resp, L>
    where
        Req: ReflectMessage + Debug,
        Resp: ReflectMessage + Debug,
    {
        let record = CallRecord {
            step_id: Uuid::new_v4().to_string(),
            method: method.full_name(),
            lifecycle: Arc::clone(&self.lifecycle),
            formatter: self.formatter,
            attach_headers: self.attach_headers,
            responses: Vec::new(),
            closed: false,
        };

        let name = format!("{} {}", self.step_prefix, record.method);
        debug!(step = %record.step_id, method = %record.method, "opening report step");
        record.report(
            "start_step",
            self.lifecycle.start_step(&record.step_id, &name),
        );
        record.attach(Attachment::text(METHOD_ATTACHMENT, method.describe()));
        record.attach(Attachment::new(
            REQUEST_ATTACHMENT,
            self.formatter.format(request),
            self.formatter.mode().content_type(),
        ));
        record
    }
}

/// Configures a [`CallInterceptor`]
pub struct InterceptorBuilder<L> {
    lifecycle: Arc<L>,
    format_mode: FormatMode,
    step_prefix: String,
    attach_headers: bool,
}

impl InterceptorBuilder<InMemoryLifecycle> {
    pub fn new() -> Self {
        Self {
            lifecycle: Arc::new(InMemoryLifecycle::new()),
            format_mode: FormatMode::default(),
            step_prefix: DEFAULT_STEP_PREFIX.to_string(),
            attach_headers: true,
        }
    }
}

impl Default for InterceptorBuilder<InMemoryLifecycle> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> InterceptorBuilder<L> {
    /// Set the lifecycle steps are recorded into
    pub fn lifecycle<NewL: ReportLifecycle>(self, lifecycle: NewL) -> InterceptorBuilder<NewL> {
        self.shared_lifecycle(Arc::new(lifecycle))
    }

    /// Set a lifecycle that is also held by the caller, typically to inspect it
    pub fn shared_lifecycle<NewL: ReportLifecycle>(
        self,
        lifecycle: Arc<NewL>,
    ) -> InterceptorBuilder<NewL> {
        InterceptorBuilder {
            lifecycle,
            format_mode: self.format_mode,
            step_prefix: self.step_prefix,
            attach_headers: self.attach_headers,
        }
    }

    pub fn format_mode(mut self, mode: FormatMode) -> Self {
        self.format_mode = mode;
        self
    }

    /// Text placed before the full method name in step names
    pub fn step_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.step_prefix = prefix.into();
        self
    }

    pub fn attach_headers(mut self, attach: bool) -> Self {
        self.attach_headers = attach;
        self
    }
}

impl<L: ReportLifecycle> InterceptorBuilder<L> {
    pub fn build(self) -> CallInterceptor<L> {
        CallInterceptor {
            lifecycle: self.lifecycle,
            formatter: ProtoFormatter::new(self.format_mode),
            step_prefix: self.step_prefix,
            attach_headers: self.attach_headers,
        }
    }
}

/// State of one intercepted call, from request send until close
///
/// Closing consumes the record, so a step is finalized at most once. A record
/// dropped before its terminal event is closed as `Cancelled`.
pub struct CallRecord<M: ReflectMessage + Debug, L: ReportLifecycle> {
    step_id: String,
    method: String,
    lifecycle: Arc<L>,
    formatter: ProtoFormatter,
    attach_headers: bool,
    responses: Vec<M>,
    closed: bool,
}

impl<M: ReflectMessage + Debug, L: ReportLifecycle> CallRecord<M, L> {
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn responses(&self) -> &[M] {
        &self.responses
    }

    /// Response headers arrived ahead of the final status
    pub fn record_headers(&self, headers: &MetadataMap) {
        if self.attach_headers {
            self.attach(Attachment::text(HEADERS_ATTACHMENT, format_metadata(headers)));
        }
    }

    pub fn record_response(&mut self, message: &M)
    where
        M: Clone,
    {
        self.responses.push(message.clone());
    }

    /// Terminal event: attach responses and status, then finalize the step
    pub fn close(mut self, outcome: CallOutcome) {
        self.finish(&outcome);
    }

    fn finish(&mut self, outcome: &CallOutcome) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.attach(Attachment::new(
            RESPONSES_ATTACHMENT,
            self.formatter.format_all(&self.responses),
            self.formatter.mode().content_type(),
        ));
        self.attach(Attachment::text(STATUS_ATTACHMENT, outcome.to_string()));

        let status = if outcome.is_success() {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        };
        self.report(
            "update_step_status",
            self.lifecycle.update_step_status(&self.step_id, status),
        );
        self.report("stop_step", self.lifecycle.stop_step(&self.step_id));
        debug!(
            step = %self.step_id,
            method = %self.method,
            code = ?outcome.code,
            responses = self.responses.len(),
            "closed report step"
        );
    }

    fn attach(&self, attachment: Attachment) {
        let result = self.lifecycle.add_attachment(&self.step_id, attachment);
        self.report("add_attachment", result);
    }

    /// Lifecycle failures are logged and never reach the call
    fn report(&self, operation: &'static str, result: Result<(), ReportError>) {
        if let Err(error) = result {
            warn!(
                step = %self.step_id,
                method = %self.method,
                operation,
                %error,
                "report lifecycle rejected operation"
            );
        }
    }
}

impl<M: ReflectMessage + Debug, L: ReportLifecycle> Drop for CallRecord<M, L> {
    fn drop(&mut self) {
        if !self.closed {
            self.finish(&CallOutcome::cancelled());
        }
    }
}
