mod writer;

pub use writer::ResultsDirectory;
