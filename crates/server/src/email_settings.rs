//! The singleton email configuration row.
//!
//! Exactly one row (id 1) exists once the settings have been loaded. It is
//! read once per batch and passed down explicitly; nothing deletes it.

use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr, EntityTrait};
use time::OffsetDateTime;

use crate::config::SmtpConfig;
use crate::entity::email_configuration;

pub const SETTINGS_ID: i32 = 1;
pub const DEFAULT_EMAIL_DOMAIN: &str = "psu.palawan.edu.ph";
pub const DEFAULT_FROM_NAME: &str = "College of Sciences";

/// Editable fields of the email configuration; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailSettingsUpdate {
    pub email_domain: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
}

/// Return the configuration row, creating it from defaults on first access.
#[tracing::instrument(skip_all)]
pub async fn load_or_default(
    db: &DatabaseConnection,
    smtp: &SmtpConfig,
) -> Result<email_configuration::Model, DbErr> {
    if let Some(existing) = email_configuration::Entity::find_by_id(SETTINGS_ID)
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let defaults = email_configuration::ActiveModel {
        id: ActiveValue::Set(SETTINGS_ID),
        email_domain: ActiveValue::Set(DEFAULT_EMAIL_DOMAIN.to_string()),
        from_email: ActiveValue::Set(smtp.from.clone()),
        from_name: ActiveValue::Set(DEFAULT_FROM_NAME.to_string()),
        smtp_host: ActiveValue::Set(smtp.server.clone()),
        smtp_port: ActiveValue::Set(i32::from(smtp.port)),
        updated_at: ActiveValue::Set(OffsetDateTime::now_utc()),
    };

    match defaults.insert(db).await {
        Ok(created) => {
            tracing::info!(
                name = "email_settings.created_defaults",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                email_domain = %created.email_domain,
                message = "Created default email configuration"
            );
            Ok(created)
        }
        // Another writer may have created the row in the meantime
        Err(insert_err) => email_configuration::Entity::find_by_id(SETTINGS_ID)
            .one(db)
            .await?
            .ok_or(insert_err),
    }
}

/// Apply an administrator's changes to the configuration row.
#[tracing::instrument(skip(db, smtp))]
pub async fn update_settings(
    db: &DatabaseConnection,
    smtp: &SmtpConfig,
    update: EmailSettingsUpdate,
) -> Result<email_configuration::Model, DbErr> {
    let current = load_or_default(db, smtp).await?;
    let mut active: email_configuration::ActiveModel = current.into();
    if let Some(domain) = update.email_domain {
        active.email_domain = ActiveValue::Set(domain);
    }
    if let Some(from_email) = update.from_email {
        active.from_email = ActiveValue::Set(from_email);
    }
    if let Some(from_name) = update.from_name {
        active.from_name = ActiveValue::Set(from_name);
    }
    if let Some(host) = update.smtp_host {
        active.smtp_host = ActiveValue::Set(host);
    }
    if let Some(port) = update.smtp_port {
        active.smtp_port = ActiveValue::Set(i32::from(port));
    }
    active.updated_at = ActiveValue::Set(OffsetDateTime::now_utc());
    active.update(db).await
}
