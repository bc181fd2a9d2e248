use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::header::{HeaderMap, HeaderValue};
use hyper::server::conn::http2;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use prost::Message;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::{HelloReply, HelloRequest};

type GrpcBody = BoxBody<Bytes, Infallible>;

/// Greeter service answering over HTTP/2 the way a tonic server would
///
/// `SayHello` replies `Hi <name>`; `SayHelloStream` replies `Hi <name>` then
/// `And again Hi <name>`. With errors enabled, `SayHello` fails before any
/// reply and `SayHelloStream` fails after its first reply. `SayHello` can also
/// be made to send its headers and then fail without a reply.
pub struct GreeterEmulator {
    addr: SocketAddr,
    state: Arc<EmulatorState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct EmulatorState {
    return_error: AtomicBool,
    fail_after_headers: AtomicBool,
    requests: Mutex<Vec<HelloRequest>>,
}

impl GreeterEmulator {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(EmulatorState {
            return_error: AtomicBool::new(false),
            fail_after_headers: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        });
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let state = server_state.clone();
                            let io = TokioIo::new(stream);

                            tokio::spawn(async move {
                                let service = service_fn(move |req| {
                                    let state = state.clone();
                                    async move { handle_grpc_request(state, req).await }
                                });

                                let _ = http2::Builder::new(TokioExecutor::new())
                                    .serve_connection(io, service)
                                    .await;
                            });
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_return_error(&self, return_error: bool) {
        self.state.return_error.store(return_error, Ordering::SeqCst);
    }

    pub fn set_fail_after_headers(&self, fail_after_headers: bool) {
        self.state
            .fail_after_headers
            .store(fail_after_headers, Ordering::SeqCst);
    }

    /// Requests exactly as the server decoded them
    pub fn received(&self) -> Vec<HelloRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for GreeterEmulator {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_grpc_request(
    state: Arc<EmulatorState>,
    req: Request<Incoming>,
) -> Result<Response<GrpcBody>, hyper::Error> {
    let path = req.uri().path().to_string();
    let body_bytes = req.into_body().collect().await?.to_bytes();

    // gRPC messages are prefixed with 5 bytes: 1 byte compression flag + 4 bytes length
    let message_data = if body_bytes.len() >= 5 {
        &body_bytes[5..]
    } else {
        &[][..]
    };
    let request = HelloRequest::decode(message_data).unwrap_or_default();
    state.requests.lock().unwrap().push(request.clone());

    let return_error = state.return_error.load(Ordering::SeqCst);
    let fail_after_headers = state.fail_after_headers.load(Ordering::SeqCst);
    let hi = HelloReply::new(format!("Hi {}", request.name));
    let again = HelloReply::new(format!("And again Hi {}", request.name));

    let response = match (path.as_str(), return_error) {
        ("/helloworld.Greeter/SayHello", false) if fail_after_headers => {
            streamed(Vec::new(), "2", Some("something wrong"))
        }
        ("/helloworld.Greeter/SayHello", false) => streamed(vec![hi], "0", None),
        ("/helloworld.Greeter/SayHello", true) => trailers_only("2", "something wrong"),
        ("/helloworld.Greeter/SayHelloStream", false) => streamed(vec![hi, again], "0", None),
        ("/helloworld.Greeter/SayHelloStream", true) => {
            streamed(vec![hi], "2", Some("something wrong"))
        }
        _ => trailers_only("12", "Method not found"),
    };
    Ok(response)
}

fn grpc_frame(message: &HelloReply) -> Bytes {
    let data = message.encode_to_vec();
    let mut frame = Vec::with_capacity(5 + data.len());
    frame.push(0); // No compression
    frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
    frame.extend_from_slice(&data);
    Bytes::from(frame)
}

/// Response headers, one data frame per reply, then the status in trailers
fn streamed(
    replies: Vec<HelloReply>,
    status: &'static str,
    message: Option<&'static str>,
) -> Response<GrpcBody> {
    let mut frames: Vec<Frame<Bytes>> = replies
        .iter()
        .map(|r| Frame::data(grpc_frame(r)))
        .collect();

    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", HeaderValue::from_static(status));
    if let Some(message) = message {
        trailers.insert("grpc-message", HeaderValue::from_static(message));
    }
    frames.push(Frame::trailers(trailers));

    let body = StreamBody::new(futures::stream::iter(
        frames.into_iter().map(Ok::<_, Infallible>),
    ));

    Response::builder()
        .status(200)
        .header("content-type", "application/grpc")
        .header("x-emulator", "greeter")
        .body(body.boxed())
        .unwrap()
}

/// Status carried in the response headers, without any message
fn trailers_only(status: &'static str, message: &'static str) -> Response<GrpcBody> {
    Response::builder()
        .status(200)
        .header("content-type", "application/grpc")
        .header("grpc-status", status)
        .header("grpc-message", message)
        .body(Empty::<Bytes>::new().boxed())
        .unwrap()
}
