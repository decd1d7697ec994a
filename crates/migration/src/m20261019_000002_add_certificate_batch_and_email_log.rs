use sea_orm_migration::{prelude::*, schema::*};

use crate::m20261019_000001_add_email_template_and_configuration::EmailTemplate;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Add batch progress records and the append-only per-send email log
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CertificateBatch::Table)
                    .if_not_exists()
                    .col(pk_auto(CertificateBatch::Id))
                    .col(integer_null(CertificateBatch::TemplateId))
                    .col(integer(CertificateBatch::TotalCertificates).default(0))
                    .col(integer(CertificateBatch::SuccessfulSends).default(0))
                    .col(integer(CertificateBatch::FailedSends).default(0))
                    .col(
                        ColumnDef::new(CertificateBatch::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending")
                            .comment("pending, processing, completed, failed or cancelled"),
                    )
                    .col(
                        timestamp_with_time_zone(CertificateBatch::StartedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(CertificateBatch::CompletedAt))
                    .col(text_null(CertificateBatch::ErrorDetails))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_certificate_batch_template")
                            .from(CertificateBatch::Table, CertificateBatch::TemplateId)
                            .to(EmailTemplate::Table, EmailTemplate::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailLog::Table)
                    .if_not_exists()
                    .col(pk_auto(EmailLog::Id))
                    .col(string_len(EmailLog::StudentId, 255))
                    .col(string_null(EmailLog::Email))
                    .col(string_len(EmailLog::CertificateFilename, 255))
                    .col(integer_null(EmailLog::TemplateId))
                    .col(integer_null(EmailLog::BatchId))
                    .col(
                        ColumnDef::new(EmailLog::Status)
                            .string_len(10)
                            .not_null()
                            .comment("Outcome of the send: 'success' or 'failed'"),
                    )
                    .col(text_null(EmailLog::ErrorMessage))
                    .col(
                        timestamp_with_time_zone(EmailLog::SentAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_log_template")
                            .from(EmailLog::Table, EmailLog::TemplateId)
                            .to(EmailTemplate::Table, EmailTemplate::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_log_batch")
                            .from(EmailLog::Table, EmailLog::BatchId)
                            .to(CertificateBatch::Table, CertificateBatch::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_log_sent_at_status")
                    .table(EmailLog::Table)
                    .col((EmailLog::SentAt, IndexOrder::Desc))
                    .col(EmailLog::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_log_student_id")
                    .table(EmailLog::Table)
                    .col(EmailLog::StudentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_certificate_batch_started_at")
                    .table(CertificateBatch::Table)
                    .col(CertificateBatch::StartedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_certificate_batch_started_at")
                    .table(CertificateBatch::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_log_student_id")
                    .table(EmailLog::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_log_sent_at_status")
                    .table(EmailLog::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(EmailLog::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CertificateBatch::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CertificateBatch {
    Table,
    Id,
    TemplateId,
    TotalCertificates,
    SuccessfulSends,
    FailedSends,
    Status,
    StartedAt,
    CompletedAt,
    ErrorDetails,
}

#[derive(Iden)]
pub enum EmailLog {
    Table,
    Id,
    StudentId,
    Email,
    CertificateFilename,
    TemplateId,
    BatchId,
    Status,
    ErrorMessage,
    SentAt,
}
