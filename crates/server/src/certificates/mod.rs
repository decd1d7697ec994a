//! Batch dispatch of certificate PDFs.
//!
//! A batch turns uploaded files plus a template into addressed, rendered and
//! sent messages over one shared mail connection:
//!
//! - `filename` - file name to student id, plus the upload pre-filter
//! - `address` - student id to recipient address
//! - `compose` - multipart message with the PDF attached
//! - `logos` - optional inline images referenced from the HTML body
//! - `connection` - the per-batch connection and its cooldown policy
//! - `batch` - the orchestrator driving items and finalizing the batch record
//! - `sink` - durable log/batch storage used by the orchestrator
//! - `summary` - in-memory results and the operator report
//! - `progress` - read side for polling batch progress and recent logs

pub mod address;
pub mod batch;
pub mod compose;
pub mod connection;
pub mod filename;
pub mod logos;
pub mod progress;
pub mod sink;
pub mod summary;

use std::path::Path;

use crate::error::ComposeError;

pub use address::resolve_address;
pub use batch::{BatchDispatcher, BatchJob, ItemOutcome};
pub use compose::{CertificateEmail, compose_certificate_email, sender_mailbox};
pub use connection::{CooldownPolicy, DispatchConnection, MailConnection, SmtpConnection};
pub use filename::{UploadScreening, screen_uploads, validate_certificate_filename};
pub use logos::{InlineLogo, load_inline_logos};
pub use sink::{BatchSink, DatabaseSink, NewLogEntry};
pub use summary::{BatchOutcome, BatchSummary, SendFailure};

/// An uploaded certificate. Its contents can be read exactly once.
#[derive(Debug)]
pub struct CertificateFile {
    name: String,
    contents: Option<Vec<u8>>,
}

impl CertificateFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: Some(contents.into()),
        }
    }

    /// Load a file from disk, keeping only its file name.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::new(name, contents))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&mut self) -> Result<Vec<u8>, ComposeError> {
        self.contents
            .take()
            .ok_or_else(|| ComposeError::AlreadyRead(self.name.clone()))
    }
}
