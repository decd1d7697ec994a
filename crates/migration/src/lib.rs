pub use sea_orm_migration::prelude::*;

mod m20261019_000001_add_email_template_and_configuration;
mod m20261019_000002_add_certificate_batch_and_email_log;
mod m20261019_000003_add_user_profile;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261019_000001_add_email_template_and_configuration::Migration),
            Box::new(m20261019_000002_add_certificate_batch_and_email_log::Migration),
            Box::new(m20261019_000003_add_user_profile::Migration),
        ]
    }
}
