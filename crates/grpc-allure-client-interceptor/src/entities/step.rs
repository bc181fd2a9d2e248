use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Outcome of a report step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Passed,
    Failed,
}

/// A named text blob attached to a report step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content: String,
    pub content_type: String,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }

    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, content, "text/plain")
    }

    /// File extension used when the attachment is written to disk
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "application/json" => "json",
            _ => "txt",
        }
    }
}

/// One recorded step of a test report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub uuid: String,
    pub name: String,
    pub status: StepStatus,
    pub attachments: Vec<Attachment>,
    pub start: u64,
    pub stop: Option<u64>,
}

impl StepResult {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            status: StepStatus::Pending,
            attachments: Vec::new(),
            start: now_millis(),
            stop: None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.name == name)
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.stop = Some(now_millis());
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
