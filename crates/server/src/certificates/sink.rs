//! Durable storage for per-item outcomes and per-batch state.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::entity::certificate_batch::{self, BatchStatus};
use crate::entity::email_log::{self, SendStatus};
use crate::error::PersistenceError;

/// One row for the email log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLogEntry {
    pub student_id: String,
    pub email: Option<String>,
    pub certificate_filename: String,
    pub template_id: Option<i32>,
    pub batch_id: Option<i32>,
    pub status: SendStatus,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Create a batch record already in `processing` state.
    async fn start_batch(
        &self,
        template_id: Option<i32>,
        total: usize,
    ) -> Result<i32, PersistenceError>;

    async fn append_log(&self, entry: NewLogEntry) -> Result<(), PersistenceError>;

    /// Atomically add one to the success or failure counter of a batch.
    async fn record_outcome(&self, batch_id: i32, success: bool) -> Result<(), PersistenceError>;

    /// Move a processing batch to a terminal state. Happens once per batch.
    async fn finalize(
        &self,
        batch_id: i32,
        status: BatchStatus,
        error_details: Option<String>,
    ) -> Result<(), PersistenceError>;
}

/// [`BatchSink`] backed by the application database.
#[derive(Clone, Debug)]
pub struct DatabaseSink {
    db: Arc<DatabaseConnection>,
}

impl DatabaseSink {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BatchSink for DatabaseSink {
    #[tracing::instrument(skip(self))]
    async fn start_batch(
        &self,
        template_id: Option<i32>,
        total: usize,
    ) -> Result<i32, PersistenceError> {
        let batch = certificate_batch::ActiveModel {
            id: ActiveValue::NotSet,
            template_id: ActiveValue::Set(template_id),
            total_certificates: ActiveValue::Set(i32::try_from(total).unwrap_or(i32::MAX)),
            successful_sends: ActiveValue::Set(0),
            failed_sends: ActiveValue::Set(0),
            status: ActiveValue::Set(BatchStatus::Processing.as_str().to_string()),
            started_at: ActiveValue::Set(OffsetDateTime::now_utc()),
            completed_at: ActiveValue::Set(None),
            error_details: ActiveValue::Set(None),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(batch.id)
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<(), PersistenceError> {
        email_log::ActiveModel {
            id: ActiveValue::NotSet,
            student_id: ActiveValue::Set(entry.student_id),
            email: ActiveValue::Set(entry.email),
            certificate_filename: ActiveValue::Set(entry.certificate_filename),
            template_id: ActiveValue::Set(entry.template_id),
            batch_id: ActiveValue::Set(entry.batch_id),
            status: ActiveValue::Set(entry.status.as_str().to_string()),
            error_message: ActiveValue::Set(entry.error_message),
            sent_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(())
    }

    async fn record_outcome(&self, batch_id: i32, success: bool) -> Result<(), PersistenceError> {
        let counter = if success {
            certificate_batch::Column::SuccessfulSends
        } else {
            certificate_batch::Column::FailedSends
        };
        let result = certificate_batch::Entity::update_many()
            .col_expr(counter, Expr::col(counter).add(1))
            .filter(certificate_batch::Column::Id.eq(batch_id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(PersistenceError::MissingBatch(batch_id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn finalize(
        &self,
        batch_id: i32,
        status: BatchStatus,
        error_details: Option<String>,
    ) -> Result<(), PersistenceError> {
        let result = certificate_batch::Entity::update_many()
            .col_expr(
                certificate_batch::Column::Status,
                Expr::value(status.as_str()),
            )
            .col_expr(
                certificate_batch::Column::CompletedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .col_expr(
                certificate_batch::Column::ErrorDetails,
                Expr::value(error_details),
            )
            .filter(certificate_batch::Column::Id.eq(batch_id))
            .filter(certificate_batch::Column::Status.eq(BatchStatus::Processing.as_str()))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(PersistenceError::NotProcessing(batch_id));
        }
        Ok(())
    }
}
