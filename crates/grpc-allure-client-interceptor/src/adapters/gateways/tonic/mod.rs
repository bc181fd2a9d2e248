mod client;
mod layer;

pub use client::{RecordedStreaming, ReportingClient};
pub use layer::{ReportingLayer, ReportingService};
