use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Add the email template catalog and the singleton email configuration row
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailTemplate::Table)
                    .if_not_exists()
                    .col(pk_auto(EmailTemplate::Id))
                    .col(string_len(EmailTemplate::Name, 200))
                    .col(string_len(EmailTemplate::Subject, 300))
                    .col(string_len(EmailTemplate::HeaderMessage, 200))
                    .col(text(EmailTemplate::BodyContent))
                    .col(string_len(EmailTemplate::College, 10))
                    .col(boolean(EmailTemplate::IsPredefined).default(false))
                    .col(
                        timestamp_with_time_zone(EmailTemplate::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EmailTemplate::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Same template name may exist once per college
        manager
            .create_index(
                Index::create()
                    .name("idx_email_template_name_college")
                    .table(EmailTemplate::Table)
                    .col(EmailTemplate::Name)
                    .col(EmailTemplate::College)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailConfiguration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailConfiguration::Id)
                            .integer()
                            .not_null()
                            .primary_key()
                            .comment("Always 1: the table holds a single row"),
                    )
                    .col(string_len(EmailConfiguration::EmailDomain, 100))
                    .col(string(EmailConfiguration::FromEmail))
                    .col(string_len(EmailConfiguration::FromName, 200))
                    .col(string_len(EmailConfiguration::SmtpHost, 200))
                    .col(integer(EmailConfiguration::SmtpPort).default(587))
                    .col(
                        timestamp_with_time_zone(EmailConfiguration::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailConfiguration::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_template_name_college")
                    .table(EmailTemplate::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(EmailTemplate::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum EmailTemplate {
    Table,
    Id,
    Name,
    Subject,
    HeaderMessage,
    BodyContent,
    College,
    IsPredefined,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum EmailConfiguration {
    Table,
    Id,
    EmailDomain,
    FromEmail,
    FromName,
    SmtpHost,
    SmtpPort,
    UpdatedAt,
}
