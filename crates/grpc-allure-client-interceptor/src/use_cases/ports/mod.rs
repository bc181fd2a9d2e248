mod lifecycle;

pub use lifecycle::ReportLifecycle;
