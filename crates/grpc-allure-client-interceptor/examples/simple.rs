//! Simple example demonstrating basic usage of grpc-allure-client-interceptor
//!
//! This example shows how to:
//! - Configure a call interceptor that writes Allure results to disk
//! - Make unary and server streaming calls through a `ReportingClient`
//! - Find the written results once the calls are done
//!
//! A tiny Greeter server runs in-process so the example is self-contained.
//! Results land in `$ALLURE_RESULTS_DIRECTORY`, or `allure-results`.

use std::convert::Infallible;
use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use grpc_allure_client_interceptor::prelude::*;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::header::{HeaderMap, HeaderValue};
use hyper::server::conn::http2;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use prost::Message;
use prost_reflect::{DescriptorPool, MessageDescriptor, ReflectMessage};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use tokio::net::TcpListener;

static POOL: LazyLock<DescriptorPool> = LazyLock::new(|| {
    let message = |name: &str, field: &str| DescriptorProto {
        name: Some(name.to_string()),
        field: vec![FieldDescriptorProto {
            name: Some(field.to_string()),
            number: Some(1),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::String as i32),
            ..Default::default()
        }],
        ..Default::default()
    };
    let file = FileDescriptorProto {
        name: Some("helloworld.proto".to_string()),
        package: Some("helloworld".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![message("HelloRequest", "name"), message("HelloReply", "message")],
        ..Default::default()
    };
    let set = FileDescriptorSet { file: vec![file] };
    DescriptorPool::decode(set.encode_to_vec().as_slice()).expect("valid descriptors")
});

fn descriptor(name: &str) -> MessageDescriptor {
    POOL.get_message_by_name(name).expect("message is declared")
}

#[derive(Clone, PartialEq, Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

impl ReflectMessage for HelloRequest {
    fn descriptor(&self) -> MessageDescriptor {
        descriptor("helloworld.HelloRequest")
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl ReflectMessage for HelloReply {
    fn descriptor(&self) -> MessageDescriptor {
        descriptor("helloworld.HelloReply")
    }
}

/// Helper to wrap a message in a gRPC length prefix
fn grpc_frame(message: &HelloReply) -> Bytes {
    let data = message.encode_to_vec();
    let mut frame = Vec::with_capacity(5 + data.len());
    frame.push(0); // No compression
    frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
    frame.extend_from_slice(&data);
    Bytes::from(frame)
}

/// Greets once for `SayHello`, three times for `SayHelloStream`
async fn greet(
    req: hyper::Request<Incoming>,
) -> Result<hyper::Response<BoxBody<Bytes, Infallible>>, hyper::Error> {
    let streaming = req.uri().path().ends_with("SayHelloStream");
    let body = req.into_body().collect().await?.to_bytes();
    let request = HelloRequest::decode(body.get(5..).unwrap_or_default()).unwrap_or_default();

    let count = if streaming { 3 } else { 1 };
    let mut frames: Vec<Frame<Bytes>> = (1..=count)
        .map(|i| {
            Frame::data(grpc_frame(&HelloReply {
                message: format!("Hello {} #{}", request.name, i),
            }))
        })
        .collect();
    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", HeaderValue::from_static("0"));
    frames.push(Frame::trailers(trailers));

    let body = StreamBody::new(futures::stream::iter(
        frames.into_iter().map(Ok::<_, Infallible>),
    ));
    Ok(hyper::Response::builder()
        .header("content-type", "application/grpc")
        .body(BodyExt::boxed(body))
        .expect("valid response"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = http2::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service_fn(greet))
                    .await;
            });
        }
    });
    println!("Greeter listening on http://{}\n", addr);

    let results = Arc::new(ResultsDirectory::from_env());
    let interceptor = CallInterceptor::builder()
        .shared_lifecycle(results.clone())
        .build();
    let mut client = ReportingClient::connect(format!("http://{}", addr), interceptor).await?;

    // Unary call
    let say_hello = GrpcMethod::unary("helloworld.Greeter", "SayHello");
    let reply = client
        .unary::<HelloRequest, HelloReply>(
            &say_hello,
            tonic::Request::new(HelloRequest {
                name: "Allure".to_string(),
            }),
        )
        .await?;
    println!("Unary reply: {}", reply.into_inner().message);

    // Server streaming call
    let say_hello_stream = GrpcMethod::server_streaming("helloworld.Greeter", "SayHelloStream");
    let mut stream = client
        .server_streaming::<HelloRequest, HelloReply>(
            &say_hello_stream,
            tonic::Request::new(HelloRequest {
                name: "Allure".to_string(),
            }),
        )
        .await?
        .into_inner();
    while let Some(reply) = stream.next().await {
        println!("Streamed reply: {}", reply?.message);
    }

    println!("\n=== Written Results ===");
    for entry in std::fs::read_dir(results.path())? {
        let path = entry?.path();
        if path.to_string_lossy().ends_with("-result.json") {
            let result: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            println!("{} [{}]", result["name"], result["status"]);
        }
    }
    println!("\nResults written to {}", results.path().display());

    Ok(())
}
