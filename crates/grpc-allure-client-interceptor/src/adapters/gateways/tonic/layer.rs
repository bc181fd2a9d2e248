use std::fmt::Display;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body as HttpBody, Bytes, Frame, SizeHint};
use prost::bytes::{Buf, BytesMut};
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor};
use tonic::body::Body;
use tonic::codegen::{http, StdError};
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::entities::{CallOutcome, GrpcMethod, MethodKind};
use crate::use_cases::ports::ReportLifecycle;
use crate::use_cases::{CallInterceptor, CallRecord};
use crate::InMemoryLifecycle;

// 1 byte compression flag + 4 bytes big endian length
const FRAME_HEADER_LEN: usize = 5;

/// Tower layer recording the calls of any tonic generated client
///
/// Methods are resolved from the request path through `pool`, so requests and
/// responses are recorded as [`DynamicMessage`]s. Calls to methods missing
/// from the pool, and request streaming calls, pass through unrecorded.
///
/// # Example
///
/// ```rust,ignore
/// let channel = Endpoint::from_static("http://127.0.0.1:50051").connect().await?;
/// let channel = ReportingLayer::new(interceptor, DESCRIPTOR_POOL.clone()).layer(channel);
/// let mut client = GreeterClient::new(channel);
/// ```
pub struct ReportingLayer<L = InMemoryLifecycle> {
    interceptor: CallInterceptor<L>,
    pool: DescriptorPool,
}

impl<L> Clone for ReportingLayer<L> {
    fn clone(&self) -> Self {
        Self {
            interceptor: self.interceptor.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<L: ReportLifecycle> ReportingLayer<L> {
    pub fn new(interceptor: CallInterceptor<L>, pool: DescriptorPool) -> Self {
        Self { interceptor, pool }
    }
}

impl<S, L> Layer<S> for ReportingLayer<L> {
    type Service = ReportingService<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        ReportingService {
            inner,
            interceptor: self.interceptor.clone(),
            pool: self.pool.clone(),
        }
    }
}

/// Service produced by [`ReportingLayer`]
pub struct ReportingService<S, L = InMemoryLifecycle> {
    inner: S,
    interceptor: CallInterceptor<L>,
    pool: DescriptorPool,
}

impl<S: Clone, L> Clone for ReportingService<S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            interceptor: self.interceptor.clone(),
            pool: self.pool.clone(),
        }
    }
}

struct ResolvedMethod {
    method: GrpcMethod,
    input: MessageDescriptor,
    output: MessageDescriptor,
}

impl<S, L> ReportingService<S, L> {
    /// Look up `/<service>/<method>` in the pool
    fn resolve(&self, path: &str) -> Option<ResolvedMethod> {
        let (service, name) = path.strip_prefix('/')?.split_once('/')?;
        let descriptor = self
            .pool
            .get_service_by_name(service)?
            .methods()
            .find(|method| method.name() == name)?;
        let kind = match (
            descriptor.is_client_streaming(),
            descriptor.is_server_streaming(),
        ) {
            (false, false) => MethodKind::Unary,
            (false, true) => MethodKind::ServerStreaming,
            _ => return None,
        };
        Some(ResolvedMethod {
            method: GrpcMethod::new(service, name, kind),
            input: descriptor.input(),
            output: descriptor.output(),
        })
    }
}

impl<S, L, ResBody> Service<http::Request<Body>> for ReportingService<S, L>
where
    S: Service<http::Request<Body>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<StdError>,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<StdError> + Display,
    L: ReportLifecycle + 'static,
{
    type Response = http::Response<Body>;
    type Error = StdError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let resolved = self.resolve(request.uri().path());
        Box::pin(record_call(
            inner,
            self.interceptor.clone(),
            resolved,
            request,
        ))
    }
}

async fn record_call<S, L, ResBody>(
    mut inner: S,
    interceptor: CallInterceptor<L>,
    resolved: Option<ResolvedMethod>,
    request: http::Request<Body>,
) -> Result<http::Response<Body>, StdError>
where
    S: Service<http::Request<Body>, Response = http::Response<ResBody>>,
    S::Error: Into<StdError>,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<StdError> + Display,
    L: ReportLifecycle + 'static,
{
    let Some(resolved) = resolved else {
        return match inner.call(request).await {
            Ok(response) => Ok(response.map(Body::new)),
            Err(error) => Err(error.into()),
        };
    };

    // Unary and server streaming requests carry exactly one message
    let (parts, body) = request.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(status) => return Ok(status.into_http()),
    };
    let call = match decode_request(&resolved.input, &bytes) {
        Some(message) => {
            Some(interceptor.begin::<DynamicMessage, DynamicMessage>(&resolved.method, &message))
        }
        None => {
            debug!(method = %resolved.method, "request not decodable, call not recorded");
            None
        }
    };
    let request = http::Request::from_parts(parts, Body::new(Full::new(bytes)));

    let response = match inner.call(request).await {
        Ok(response) => response,
        Err(error) => {
            let error: StdError = error.into();
            if let Some(call) = call {
                call.close(CallOutcome::new(Code::Unavailable, error.to_string()));
            }
            return Err(error);
        }
    };

    let Some(call) = call else {
        return Ok(response.map(Body::new));
    };
    if let Some(outcome) = early_outcome(&response) {
        call.close(outcome);
        return Ok(response.map(Body::new));
    }

    call.record_headers(&MetadataMap::from_headers(response.headers().clone()));
    Ok(response.map(|body| {
        Body::new(RecordedBody {
            inner: Box::pin(body),
            call: Some(call),
            output: resolved.output,
            buffer: BytesMut::new(),
        })
    }))
}

/// Outcome of a response that ends before any body, trailers-only or not gRPC
fn early_outcome<B>(response: &http::Response<B>) -> Option<CallOutcome> {
    if let Some(status) = Status::from_header_map(response.headers()) {
        return Some(CallOutcome::from(&status));
    }
    let code = match response.status().as_u16() {
        200 => return None,
        400 => Code::Internal,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::Unimplemented,
        429 | 502 | 503 | 504 => Code::Unavailable,
        _ => Code::Unknown,
    };
    Some(CallOutcome::new(
        code,
        format!("HTTP status {}", response.status()),
    ))
}

fn decode_request(input: &MessageDescriptor, bytes: &Bytes) -> Option<DynamicMessage> {
    let mut buffer = BytesMut::from(bytes.as_ref());
    let (compressed, payload) = split_frame(&mut buffer)?;
    if compressed {
        return None;
    }
    DynamicMessage::decode(input.clone(), payload).ok()
}

/// Take one complete length-prefixed message off the front of `buffer`
fn split_frame(buffer: &mut BytesMut) -> Option<(bool, Bytes)> {
    if buffer.len() < FRAME_HEADER_LEN {
        return None;
    }
    let compressed = buffer[0] != 0;
    let len = u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]) as usize;
    if buffer.len() < FRAME_HEADER_LEN + len {
        return None;
    }
    buffer.advance(FRAME_HEADER_LEN);
    Some((compressed, buffer.split_to(len).freeze()))
}

/// Response body that records every message and closes the step on trailers
struct RecordedBody<B, L: ReportLifecycle> {
    inner: Pin<Box<B>>,
    call: Option<CallRecord<DynamicMessage, L>>,
    output: MessageDescriptor,
    buffer: BytesMut,
}

impl<B, L: ReportLifecycle> RecordedBody<B, L> {
    fn record_messages(&mut self) {
        while let Some((compressed, payload)) = split_frame(&mut self.buffer) {
            let Some(call) = self.call.as_mut() else {
                return;
            };
            if compressed {
                debug!(step = %call.step_id(), "compressed response not recorded");
                continue;
            }
            match DynamicMessage::decode(self.output.clone(), payload) {
                Ok(message) => call.record_response(&message),
                Err(error) => {
                    warn!(step = %call.step_id(), %error, "response not decodable")
                }
            }
        }
    }

    fn close(&mut self, outcome: CallOutcome) {
        if let Some(call) = self.call.take() {
            call.close(outcome);
        }
    }
}

impl<B, L> HttpBody for RecordedBody<B, L>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Display,
    L: ReportLifecycle,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, B::Error>>> {
        let this = self.get_mut();
        let frame = ready!(this.inner.as_mut().poll_frame(cx));
        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.buffer.extend_from_slice(data);
                    this.record_messages();
                } else if let Some(trailers) = frame.trailers_ref() {
                    let outcome = match Status::from_header_map(trailers) {
                        Some(status) => CallOutcome::from(&status),
                        None => CallOutcome::new(Code::Internal, "missing grpc-status trailer"),
                    };
                    this.close(outcome);
                }
            }
            Some(Err(error)) => this.close(CallOutcome::new(Code::Unknown, error.to_string())),
            None => this.close(CallOutcome::new(
                Code::Internal,
                "response ended without trailers",
            )),
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.call.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
