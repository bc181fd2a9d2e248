mod format_messages;
pub mod ports;
mod record_call;

pub use format_messages::{format_metadata, ProtoFormatter};
pub use record_call::{
    CallInterceptor, CallRecord, InterceptorBuilder, HEADERS_ATTACHMENT, METHOD_ATTACHMENT,
    REQUEST_ATTACHMENT, RESPONSES_ATTACHMENT, STATUS_ATTACHMENT,
};
