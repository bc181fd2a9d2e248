//! Greeter messages, a generated-style client and an in-process gRPC emulator
#![allow(dead_code)]

mod emulator;
mod greeter_client;

pub use emulator::GreeterEmulator;
pub use greeter_client::GreeterClient;
pub use messages::{descriptor_pool, HelloReply, HelloRequest};
