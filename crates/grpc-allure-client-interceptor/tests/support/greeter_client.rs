//! Client stub shaped like tonic-build output for the Greeter service

use tonic::codegen::*;

use super::{HelloReply, HelloRequest};

#[derive(Debug, Clone)]
pub struct GreeterClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl<T> GreeterClient<T>
where
    T: tonic::client::GrpcService<tonic::body::Body>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
{
    pub fn new(inner: T) -> Self {
        let inner = tonic::client::Grpc::new(inner);
        Self { inner }
    }

    pub async fn say_hello(
        &mut self,
        request: impl tonic::IntoRequest<HelloRequest>,
    ) -> std::result::Result<tonic::Response<HelloReply>, tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
        })?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/helloworld.Greeter/SayHello");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("helloworld.Greeter", "SayHello"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn say_hello_stream(
        &mut self,
        request: impl tonic::IntoRequest<HelloRequest>,
    ) -> std::result::Result<
        tonic::Response<tonic::codec::Streaming<HelloReply>>,
        tonic::Status,
    > {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
        })?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/helloworld.Greeter/SayHelloStream");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("helloworld.Greeter", "SayHelloStream"));
        self.inner.server_streaming(req, path, codec).await
    }

    pub async fn say_goodbye(
        &mut self,
        request: impl tonic::IntoRequest<HelloRequest>,
    ) -> std::result::Result<tonic::Response<HelloReply>, tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
        })?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/helloworld.Greeter/SayGoodbye");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("helloworld.Greeter", "SayGoodbye"));
        self.inner.unary(req, path, codec).await
    }
}
