pub mod certificate_batch;
pub mod email_configuration;
pub mod email_log;
pub mod email_template;
pub mod user_profile;
