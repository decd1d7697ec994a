//! Batch orchestration.
//!
//! Items are processed strictly in submission order over one connection.
//! Per-item failures become log rows and failure counts; only an unopenable
//! connection or a storage failure stops the batch.

use lettre::message::Mailbox;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{AppConfig, CollegeInfo};
use crate::entity::certificate_batch::BatchStatus;
use crate::entity::email_log::SendStatus;
use crate::entity::{email_configuration, email_template};
use crate::error::{BatchAborted, BatchError, FilenameError, ItemError};

use super::address::resolve_address;
use super::compose::{compose_certificate_email, sender_mailbox};
use super::connection::{CooldownPolicy, DispatchConnection, MailConnection};
use super::filename::validate_certificate_filename;
use super::logos::{InlineLogo, load_inline_logos};
use super::sink::{BatchSink, NewLogEntry};
use super::summary::BatchSummary;
use super::CertificateFile;

pub const CANCELLED_DETAIL: &str = "cancelled by request";

/// Longest identity or file name stored on a log row.
pub const LOG_FIELD_MAX_CHARS: usize = 255;

fn clip(value: &str) -> String {
    value.chars().take(LOG_FIELD_MAX_CHARS).collect()
}

/// Result of one item, filled in stage by stage as the pipeline progresses.
#[derive(Debug)]
pub struct ItemOutcome {
    pub filename: String,
    pub identity: Option<String>,
    pub address: Option<String>,
    pub error: Option<ItemError>,
}

impl ItemOutcome {
    fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            identity: None,
            address: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Identity to record: the student id when known, else the file name.
    pub fn log_identity(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.filename)
    }

    fn log_entry(&self, template_id: i32, batch_id: Option<i32>) -> NewLogEntry {
        NewLogEntry {
            student_id: clip(self.log_identity()),
            email: self.address.clone(),
            certificate_filename: clip(&self.filename),
            template_id: Some(template_id),
            batch_id,
            status: if self.is_success() {
                SendStatus::Success
            } else {
                SendStatus::Failed
            },
            error_message: self.error_message(),
        }
    }
}

/// One batch to send.
pub struct BatchJob<'t> {
    pub template: &'t email_template::Model,
    pub files: Vec<CertificateFile>,
    /// Batch record to keep up to date; without one only logs are written.
    pub batch_id: Option<i32>,
    /// Checked between items; once set, remaining items are skipped.
    pub cancel: Option<Arc<AtomicBool>>,
}

enum RunEnd {
    Finished,
    Cancelled,
}

/// Inputs shared by every item of one batch.
struct ItemContext<'t> {
    sender: Mailbox,
    template: &'t email_template::Model,
    branding: Option<&'t CollegeInfo>,
    logos: Vec<InlineLogo>,
}

fn cancel_requested(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
}

fn log_cancelled(processed: usize, total: usize) {
    tracing::info!(
        name = "certificates.batch.cancelled",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        processed = processed,
        total = total,
        message = "Certificate batch cancelled by request"
    );
}

/// Drives batches with a fixed email configuration, app config and sink.
pub struct BatchDispatcher<'a, S: ?Sized> {
    settings: &'a email_configuration::Model,
    config: &'a AppConfig,
    sink: &'a S,
}

impl<'a, S: BatchSink + ?Sized> BatchDispatcher<'a, S> {
    pub fn new(
        settings: &'a email_configuration::Model,
        config: &'a AppConfig,
        sink: &'a S,
    ) -> Self {
        Self {
            settings,
            config,
            sink,
        }
    }

    /// Send every file of `job` through `connection`.
    ///
    /// The connection is closed on every exit path and the batch record, if
    /// any, is finalized. On a fatal error the summary of the items processed
    /// so far is returned inside [`BatchAborted`].
    #[tracing::instrument(
        skip_all,
        fields(template_id = job.template.id, batch_id = ?job.batch_id, total = job.files.len())
    )]
    pub async fn run<C: MailConnection>(
        &self,
        connection: C,
        job: BatchJob<'_>,
    ) -> Result<BatchSummary, BatchAborted> {
        let BatchJob {
            template,
            files,
            batch_id,
            cancel,
        } = job;
        let mut summary = BatchSummary::new(files.len());
        let mut dispatch = DispatchConnection::new(
            connection,
            CooldownPolicy::from_config(&self.config.certificates),
        );

        let result = self
            .drive(
                &mut dispatch,
                template,
                files,
                batch_id,
                cancel.as_deref(),
                &mut summary,
            )
            .await;
        dispatch.close().await;

        let (status, details, fatal) = match result {
            Ok(RunEnd::Finished) => (
                BatchStatus::from_counts(summary.successful, summary.failed),
                None,
                None,
            ),
            Ok(RunEnd::Cancelled) => (
                BatchStatus::Cancelled,
                Some(CANCELLED_DETAIL.to_string()),
                None,
            ),
            Err(error) => (BatchStatus::Failed, Some(error.to_string()), Some(error)),
        };

        if let Some(batch_id) = batch_id
            && let Err(e) = self.sink.finalize(batch_id, status, details).await
        {
            tracing::error!(
                name = "certificates.batch.finalize_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                batch_id = batch_id,
                message = "Failed to finalize certificate batch"
            );
            if fatal.is_none() {
                return Err(BatchAborted {
                    summary,
                    source: e.into(),
                });
            }
        }

        match fatal {
            Some(source) => {
                tracing::error!(
                    name = "certificates.batch.aborted",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %source,
                    processed = summary.processed(),
                    total = summary.total,
                    message = "Certificate batch aborted"
                );
                Err(BatchAborted { summary, source })
            }
            None => {
                tracing::info!(
                    name = "certificates.batch.finished",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    status = %status,
                    successful = summary.successful,
                    failed = summary.failed,
                    total = summary.total,
                    cooldowns = dispatch.cooldowns(),
                    message = "Certificate batch finished"
                );
                Ok(summary)
            }
        }
    }

    async fn drive<C: MailConnection>(
        &self,
        dispatch: &mut DispatchConnection<C>,
        template: &email_template::Model,
        files: Vec<CertificateFile>,
        batch_id: Option<i32>,
        cancel: Option<&AtomicBool>,
        summary: &mut BatchSummary,
    ) -> Result<RunEnd, BatchError> {
        let sender = sender_mailbox(self.settings).map_err(BatchError::InvalidSender)?;
        dispatch.open().await?;

        let context = ItemContext {
            sender,
            template,
            branding: self.config.college(&template.college),
            logos: load_inline_logos(self.config.certificates.logo_dir.as_deref()).await,
        };
        let total = files.len();

        for (index, mut file) in files.into_iter().enumerate() {
            if cancel_requested(cancel) {
                log_cancelled(index, total);
                return Ok(RunEnd::Cancelled);
            }

            let mut outcome = ItemOutcome::new(file.name());
            if let Err(e) = self.attempt(dispatch, &context, &mut file, &mut outcome).await {
                tracing::warn!(
                    name = "certificates.batch.item_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    file = %outcome.filename,
                    error = %e,
                    message = "Certificate could not be sent"
                );
                outcome.error = Some(e);
            }

            summary.record(&outcome);
            self.sink
                .append_log(outcome.log_entry(template.id, batch_id))
                .await?;
            if let Some(batch_id) = batch_id {
                self.sink
                    .record_outcome(batch_id, outcome.is_success())
                    .await?;
            }

            let remaining = total - index - 1;
            if remaining > 0 && cancel_requested(cancel) {
                log_cancelled(index + 1, total);
                return Ok(RunEnd::Cancelled);
            }
            dispatch.item_done(remaining).await?;
        }

        Ok(RunEnd::Finished)
    }

    async fn attempt<C: MailConnection>(
        &self,
        dispatch: &mut DispatchConnection<C>,
        context: &ItemContext<'_>,
        file: &mut CertificateFile,
        outcome: &mut ItemOutcome,
    ) -> Result<(), ItemError> {
        let identity =
            validate_certificate_filename(file.name(), self.config.certificates.testing_mode)
                .inspect_err(|e: &FilenameError| {
                    tracing::warn!(
                        name = "certificates.batch.unscreened_file",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        error = %e,
                        message = "Invalid file reached the batch; uploads should be screened first"
                    );
                })?;

        outcome.identity = Some(identity.clone());
        let address = resolve_address(&identity, self.settings, &self.config.certificates)?;
        outcome.address = Some(address.to_string());

        let message =
            compose_certificate_email(context.template, context.branding, &context.logos, file)?
                .into_message(&context.sender, address)?;
        dispatch.send(message).await?;

        tracing::info!(
            name = "certificates.batch.item_sent",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            file = %outcome.filename,
            email = ?outcome.address,
            message = "Sent certificate email"
        );
        Ok(())
    }
}
