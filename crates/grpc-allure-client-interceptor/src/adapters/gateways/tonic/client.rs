use std::fmt::Debug;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::{Stream, StreamExt};
use prost_reflect::ReflectMessage;
use tonic::client::{Grpc, GrpcService};
use tonic::metadata::MetadataMap;
use tonic::codegen::{Body, Bytes, StdError};
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status, Streaming};
use tonic_prost::ProstCodec;

use crate::entities::{CallOutcome, GrpcMethod};
use crate::use_cases::ports::ReportLifecycle;
use crate::use_cases::{CallInterceptor, CallRecord};
use crate::InMemoryLifecycle;

/// gRPC client that records every call through a [`CallInterceptor`]
///
/// Requests, responses and statuses pass through unchanged; recording is a
/// side effect on the interceptor's lifecycle.
pub struct ReportingClient<T, L: ReportLifecycle = InMemoryLifecycle> {
    inner: Grpc<T>,
    interceptor: CallInterceptor<L>,
}

impl<T: Clone, L: ReportLifecycle> Clone for ReportingClient<T, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<L: ReportLifecycle> ReportingClient<Channel, L> {
    /// Connect to `dst` over a new channel
    pub async fn connect<D>(
        dst: D,
        interceptor: CallInterceptor<L>,
    ) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<Endpoint>,
        D::Error: Into<StdError>,
    {
        let channel = Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(channel, interceptor))
    }
}

impl<T, L> ReportingClient<T, L>
where
    T: GrpcService<tonic::body::Body>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    L: ReportLifecycle,
{
    pub fn new(inner: T, interceptor: CallInterceptor<L>) -> Self {
        Self {
            inner: Grpc::new(inner),
            interceptor,
        }
    }

    pub fn interceptor(&self) -> &CallInterceptor<L> {
        &self.interceptor
    }

    /// Perform a unary call, recording it as one report step.
    ///
    /// The call runs over a response stream so that the headers are recorded
    /// before the body is read. Trailers are merged into the returned
    /// metadata, as `tonic::client::Grpc::unary` does.
    pub async fn unary<Req, Resp>(
        &mut self,
        method: &GrpcMethod,
        request: Request<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: ReflectMessage + Debug + 'static,
        Resp: ReflectMessage + Debug + Default + Clone + 'static,
    {
        let mut call = self.interceptor.begin::<Req, Resp>(method, request.get_ref());

        let response = match self.send_server_streaming(method, request).await {
            Ok(response) => response,
            Err(status) => {
                call.close(CallOutcome::from(&status));
                return Err(status);
            }
        };

        call.record_headers(response.metadata());
        let (headers, body, extensions) = response.into_parts();
        match single_message(headers, body).await {
            Ok((metadata, message)) => {
                call.record_response(&message);
                call.close(CallOutcome::ok());
                Ok(Response::from_parts(metadata, message, extensions))
            }
            Err(status) => {
                call.close(CallOutcome::from(&status));
                Err(status)
            }
        }
    }

    /// Perform a server streaming call.
    ///
    /// The step stays open while the returned stream is consumed and closes on
    /// its terminal item, or as cancelled if the stream is dropped early.
    pub async fn server_streaming<Req, Resp>(
        &mut self,
        method: &GrpcMethod,
        request: Request<Req>,
    ) -> Result<Response<RecordedStreaming<Resp, L>>, Status>
    where
        Req: ReflectMessage + Debug + 'static,
        Resp: ReflectMessage + Debug + Default + Clone + 'static,
    {
        let call = self.interceptor.begin::<Req, Resp>(method, request.get_ref());

        match self.send_server_streaming(method, request).await {
            Ok(response) => {
                call.record_headers(response.metadata());
                let (metadata, inner, extensions) = response.into_parts();
                Ok(Response::from_parts(
                    metadata,
                    RecordedStreaming {
                        inner,
                        call: Some(call),
                    },
                    extensions,
                ))
            }
            Err(status) => {
                call.close(CallOutcome::from(&status));
                Err(status)
            }
        }
    }

    async fn send_server_streaming<Req, Resp>(
        &mut self,
        method: &GrpcMethod,
        request: Request<Req>,
    ) -> Result<Response<Streaming<Resp>>, Status>
    where
        Req: ReflectMessage + Debug + 'static,
        Resp: ReflectMessage + Debug + Default + 'static,
    {
        self.ready().await?;
        let path = method.path()?;
        let codec = ProstCodec::<Req, Resp>::default();
        self.inner.server_streaming(request, path, codec).await
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e.into())))
    }
}

/// Read the only message of a unary response, then its trailers
async fn single_message<M>(
    headers: MetadataMap,
    mut body: Streaming<M>,
) -> Result<(MetadataMap, M), Status> {
    let message = match body.message().await {
        Ok(Some(message)) => message,
        Ok(None) => return Err(Status::internal("Missing response message.")),
        Err(mut status) => {
            let trailers = std::mem::take(status.metadata_mut());
            *status.metadata_mut() = merge_metadata(headers, trailers);
            return Err(status);
        }
    };

    let metadata = match body.trailers().await? {
        Some(trailers) => merge_metadata(headers, trailers),
        None => headers,
    };
    Ok((metadata, message))
}

fn merge_metadata(headers: MetadataMap, trailers: MetadataMap) -> MetadataMap {
    let mut merged = headers.into_headers();
    merged.extend(trailers.into_headers());
    MetadataMap::from_headers(merged)
}

/// Response stream of a recorded server streaming call
///
/// Yields exactly what the underlying [`Streaming`] yields.
pub struct RecordedStreaming<M: ReflectMessage + Debug, L: ReportLifecycle = InMemoryLifecycle> {
    inner: Streaming<M>,
    call: Option<CallRecord<M, L>>,
}

// Only `inner` is polled, and `Streaming` is itself `Unpin`
impl<M: ReflectMessage + Debug, L: ReportLifecycle> Unpin for RecordedStreaming<M, L> {}

impl<M, L> RecordedStreaming<M, L>
where
    M: ReflectMessage + Debug + Clone,
    L: ReportLifecycle,
{
    /// Fetch the next message, `Ok(None)` once the stream completed
    pub async fn message(&mut self) -> Result<Option<M>, Status> {
        self.next().await.transpose()
    }

    /// Identifier of the report step, until the call is closed
    pub fn step_id(&self) -> Option<&str> {
        self.call.as_ref().map(|call| call.step_id())
    }
}

impl<M, L> Stream for RecordedStreaming<M, L>
where
    M: ReflectMessage + Debug + Clone,
    L: ReportLifecycle,
{
    type Item = Result<M, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        match &item {
            Some(Ok(message)) => {
                if let Some(call) = this.call.as_mut() {
                    call.record_response(message);
                }
            }
            Some(Err(status)) => {
                if let Some(call) = this.call.take() {
                    call.close(CallOutcome::from(status));
                }
            }
            None => {
                if let Some(call) = this.call.take() {
                    call.close(CallOutcome::ok());
                }
            }
        }
        Poll::Ready(item)
    }
}
