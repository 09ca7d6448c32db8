use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::{error::SignError, util::{random::generate_30_alphanumeric, tempfiles::remove_quietly}};

/// Terminal outcome of one job. Delivered once, never revised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningOutcome {
    Signed(Bytes),
    Failed(String),
}

impl SigningOutcome {
    pub fn is_signed(&self) -> bool {
        matches!(self, SigningOutcome::Signed(_))
    }
}

impl From<Result<Bytes, SignError>> for SigningOutcome {
    fn from(result: Result<Bytes, SignError>) -> Self {
        match result {
            Ok(bytes) => SigningOutcome::Signed(bytes),
            Err(err) => SigningOutcome::Failed(err.to_string()),
        }
    }
}

/// Consumed by `send`, so a job can report at most one outcome.
pub type ResultSink = oneshot::Sender<SigningOutcome>;

/// An uploaded file owned by exactly one job. Removing it consumes the handle.
#[derive(Debug)]
pub struct InputFile {
    path: PathBuf,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InputFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(self) -> bool {
        remove_quietly(&self.path).await
    }
}

#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub input: InputFile,
    pub original_name: String,
    pub enqueued_at: DateTime<Utc>,
    pub result_sink: ResultSink,
}

impl Job {
    /// Builds a job for an already fully written file and hands back the
    /// receiving end of its result sink.
    pub fn new(file_path: impl Into<PathBuf>, original_name: &str) -> (Job, oneshot::Receiver<SigningOutcome>) {
        let (result_sink, receiver) = oneshot::channel();
        let job = Job {
            id: generate_30_alphanumeric(),
            input: InputFile::new(file_path),
            original_name: original_name.to_string(),
            enqueued_at: Utc::now(),
            result_sink,
        };
        (job, receiver)
    }
}
