//! Batch distribution of per-student certificate PDFs by email.
//!
//! Operators upload a set of PDFs named after student ids, pick a template,
//! and the [`certificates`] module sends one personalized email per file over
//! a single SMTP connection, recording every attempt in the email log.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod certificates;
pub mod config;
pub mod email_settings;
pub mod email_templates;
pub mod entity;
pub mod error;
pub mod profiles;
pub mod template_catalog;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
