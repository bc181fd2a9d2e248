use std::env;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{Attachment, StepResult, StepStatus};
use crate::error::ReportError;
use crate::use_cases::ports::ReportLifecycle;
use crate::InMemoryLifecycle;

/// Environment variable naming the results directory
pub const RESULTS_DIRECTORY_ENV: &str = "ALLURE_RESULTS_DIRECTORY";

const DEFAULT_RESULTS_DIRECTORY: &str = "allure-results";

/// Lifecycle that persists finished steps as Allure results
///
/// Every stopped step is written as `<uuid>-result.json` next to one
/// `<uuid>-attachment.<ext>` file per attachment, the layout the Allure
/// command line reads. A step is only held in memory until it is written.
pub struct ResultsDirectory {
    root: PathBuf,
    steps: InMemoryLifecycle,
}

#[derive(Serialize)]
struct AllureResult<'a> {
    uuid: &'a str,
    name: &'a str,
    status: StepStatus,
    stage: &'static str,
    start: u64,
    stop: u64,
    attachments: Vec<AllureAttachment<'a>>,
}

#[derive(Serialize)]
struct AllureAttachment<'a> {
    name: &'a str,
    source: String,
    #[serde(rename = "type")]
    content_type: &'a str,
}

impl ResultsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            steps: InMemoryLifecycle::new(),
        }
    }

    /// Directory from `ALLURE_RESULTS_DIRECTORY`, `allure-results` when unset
    pub fn from_env() -> Self {
        let root = env::var_os(RESULTS_DIRECTORY_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIRECTORY));
        Self::new(root)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Steps started and not yet written out
    pub fn steps(&self) -> Vec<StepResult> {
        self.steps.steps()
    }

    fn write_step(&self, step: &StepResult) -> Result<(), ReportError> {
        fs::create_dir_all(&self.root)?;

        let attachments = step
            .attachments
            .iter()
            .map(|attachment| self.write_attachment(attachment))
            .collect::<Result<Vec<_>, _>>()?;

        let result = AllureResult {
            uuid: &step.uuid,
            name: &step.name,
            status: step.status,
            stage: "finished",
            start: step.start,
            stop: step.stop.unwrap_or(step.start),
            attachments,
        };

        let path = self.root.join(format!("{}-result.json", step.uuid));
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &result)?;
        debug!(step = %step.uuid, path = %path.display(), "wrote report result");
        Ok(())
    }

    fn write_attachment<'a>(
        &self,
        attachment: &'a Attachment,
    ) -> Result<AllureAttachment<'a>, ReportError> {
        let source = format!("{}-attachment.{}", Uuid::new_v4(), attachment.extension());
        fs::write(self.root.join(&source), &attachment.content)?;
        Ok(AllureAttachment {
            name: &attachment.name,
            source,
            content_type: &attachment.content_type,
        })
    }
}

impl ReportLifecycle for ResultsDirectory {
    fn start_step(&self, uuid: &str, name: &str) -> Result<(), ReportError> {
        self.steps.start_step(uuid, name)
    }

    fn add_attachment(&self, uuid: &str, attachment: Attachment) -> Result<(), ReportError> {
        self.steps.add_attachment(uuid, attachment)
    }

    fn update_step_status(&self, uuid: &str, status: StepStatus) -> Result<(), ReportError> {
        self.steps.update_step_status(uuid, status)
    }

    fn stop_step(&self, uuid: &str) -> Result<(), ReportError> {
        self.steps.stop_step(uuid)?;
        let step = self
            .steps
            .remove(uuid)
            .ok_or_else(|| ReportError::StepNotFound(uuid.to_string()))?;
        self.write_step(&step)
    }
}
