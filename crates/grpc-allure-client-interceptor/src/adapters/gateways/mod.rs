mod results_dir;
mod tonic;

pub use self::results_dir::ResultsDirectory;
pub use self::tonic::{RecordedStreaming, ReportingClient, ReportingLayer, ReportingService};
