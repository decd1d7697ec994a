//! Read side for batch progress and the email log.

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::entity::certificate_batch::{self, BatchStatus};
use crate::entity::email_log;

/// Snapshot of a batch for polling readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub status: String,
    pub total: i32,
    pub successful: i32,
    pub failed: i32,
    pub completed: bool,
}

impl From<certificate_batch::Model> for BatchProgress {
    fn from(batch: certificate_batch::Model) -> Self {
        let completed = batch.batch_status().is_some_and(BatchStatus::is_terminal);
        Self {
            status: batch.status,
            total: batch.total_certificates,
            successful: batch.successful_sends,
            failed: batch.failed_sends,
            completed,
        }
    }
}

pub async fn batch_progress(
    db: &DatabaseConnection,
    batch_id: i32,
) -> Result<Option<BatchProgress>, DbErr> {
    Ok(certificate_batch::Entity::find_by_id(batch_id)
        .one(db)
        .await?
        .map(BatchProgress::from))
}

/// Log rows shown when no limit is asked for.
pub const DEFAULT_RECENT_LOGS: u64 = 20;

/// Most recent log rows first.
pub async fn recent_logs(
    db: &DatabaseConnection,
    limit: u64,
) -> Result<Vec<email_log::Model>, DbErr> {
    email_log::Entity::find()
        .order_by_desc(email_log::Column::SentAt)
        .order_by_desc(email_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

/// Log rows of one batch in the order they were written.
pub async fn batch_logs(
    db: &DatabaseConnection,
    batch_id: i32,
) -> Result<Vec<email_log::Model>, DbErr> {
    email_log::Entity::find()
        .filter(email_log::Column::BatchId.eq(batch_id))
        .order_by_asc(email_log::Column::Id)
        .all(db)
        .await
}

/// One log row as a single operator-facing line.
pub fn log_line(log: &email_log::Model) -> String {
    let sent_at = log
        .sent_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| log.sent_at.to_string());
    let mut line = format!(
        "{sent_at}  {:<7}  {}  {}  {}",
        log.status,
        log.student_id,
        log.email.as_deref().unwrap_or("-"),
        log.certificate_filename
    );
    if let Some(error) = &log.error_message {
        line.push_str("  ");
        line.push_str(error);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn log(status: &str, email: Option<&str>, error: Option<&str>) -> email_log::Model {
        email_log::Model {
            id: 1,
            student_id: "2000-1-0123".into(),
            email: email.map(str::to_string),
            certificate_filename: "2000-1-0123.pdf".into(),
            template_id: Some(7),
            batch_id: Some(3),
            status: status.into(),
            error_message: error.map(str::to_string),
            sent_at: datetime!(2026-10-19 08:30:00 UTC),
        }
    }

    #[test]
    fn successful_log_line() {
        assert_eq!(
            log_line(&log("success", Some("200010123@psu.palawan.edu.ph"), None)),
            "2026-10-19T08:30:00Z  success  2000-1-0123  200010123@psu.palawan.edu.ph  \
             2000-1-0123.pdf"
        );
    }

    #[test]
    fn failed_log_line_shows_error_and_missing_address() {
        assert_eq!(
            log_line(&log("failed", None, Some("Invalid filename format"))),
            "2026-10-19T08:30:00Z  failed   2000-1-0123  -  2000-1-0123.pdf  \
             Invalid filename format"
        );
    }
}
