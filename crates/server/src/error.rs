use sea_orm::DbErr;
use thiserror::Error;

use crate::certificates::BatchSummary;

/// Why an uploaded file name cannot be turned into a recipient identity.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("'{0}' is not a PDF file")]
    NotPdf(String),
    #[error("Invalid filename format: {0}")]
    InvalidFormat(String),
    #[error("Missing student id in filename: {0}")]
    EmptyIdentity(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Cannot derive an email address for '{identity}': {reason}")]
    InvalidAddress { identity: String, reason: String },
    #[error("Testing mode is enabled but no test address is configured")]
    MissingTestAddress,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Certificate file '{0}' has already been read")]
    AlreadyRead(String),
    #[error("Invalid sender address '{address}': {reason}")]
    InvalidSender { address: String, reason: String },
    #[error("Failed to render HTML email: {0}")]
    Render(#[from] askama::Error),
    #[error("Invalid attachment content type: {0}")]
    Attachment(String),
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to open mail connection: {0}")]
    Open(String),
    #[error("Mail connection is not open")]
    NotOpen,
    #[error("Failed to send email: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Db(#[from] DbErr),
    #[error("Certificate batch {0} does not exist")]
    MissingBatch(i32),
    #[error("Certificate batch {0} is not processing and cannot be finalized")]
    NotProcessing(i32),
}

/// Failure of a single certificate; recorded in the log and never propagated.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Filename(#[from] FilenameError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure that stops a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    InvalidSender(ComposeError),
}

/// A batch that stopped early, together with the items processed before it did.
#[derive(Debug, Error)]
#[error("Certificate batch aborted: {source}")]
pub struct BatchAborted {
    pub summary: BatchSummary,
    #[source]
    pub source: BatchError,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Template {0} not found")]
    NotFound(i32),
    #[error("Template '{0}' is predefined and cannot be modified")]
    PredefinedImmutable(String),
    #[error("Unknown college code '{0}'")]
    UnknownCollege(String),
    #[error("A template named '{name}' already exists for college {college}")]
    Duplicate { name: String, college: String },
    #[error(transparent)]
    Db(#[from] DbErr),
}
