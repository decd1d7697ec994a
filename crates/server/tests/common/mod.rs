//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use certificate_mailer::certificates::{BatchSink, CertificateFile, MailConnection, NewLogEntry};
use certificate_mailer::config::{AppConfig, CertificateConfig, CollegeInfo, SmtpConfig};
use certificate_mailer::entity::certificate_batch::BatchStatus;
use certificate_mailer::entity::{email_configuration, email_template};
use certificate_mailer::error::{PersistenceError, TransportError};
use lettre::Message;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

pub const DOMAIN: &str = "psu.palawan.edu.ph";
pub const TEST_ADDRESS: &str = "qa@example.com";

/// In-memory SQLite database with the application tables.
pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    for ddl in [
        r#"CREATE TABLE email_template (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            subject TEXT NOT NULL,
            header_message TEXT NOT NULL,
            body_content TEXT NOT NULL,
            college TEXT NOT NULL,
            is_predefined INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (name, college)
        );"#,
        r#"CREATE TABLE email_configuration (
            id INTEGER PRIMARY KEY,
            email_domain TEXT NOT NULL,
            from_email TEXT NOT NULL,
            from_name TEXT NOT NULL,
            smtp_host TEXT NOT NULL,
            smtp_port INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE certificate_batch (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            template_id INTEGER NULL,
            total_certificates INTEGER NOT NULL,
            successful_sends INTEGER NOT NULL DEFAULT 0,
            failed_sends INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            started_at TEXT NOT NULL,
            completed_at TEXT NULL,
            error_details TEXT NULL
        );"#,
        r#"CREATE TABLE email_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            email TEXT NULL,
            certificate_filename TEXT NOT NULL,
            template_id INTEGER NULL,
            batch_id INTEGER NULL,
            status TEXT NOT NULL,
            error_message TEXT NULL,
            sent_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE user_profile (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL UNIQUE,
            college TEXT NULL,
            created_at TEXT NOT NULL
        );"#,
    ] {
        db.execute(Statement::from_string(DbBackend::Sqlite, ddl))
            .await
            .expect("create table");
    }

    db
}

/// Drop a table so that subsequent writes to it fail.
pub async fn drop_table(db: &DatabaseConnection, table: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        format!("DROP TABLE {table};"),
    ))
    .await
    .map(|_| ())
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        smtp: SmtpConfig {
            server: "smtp.example.com".into(),
            port: 587,
            username: "mailer".into(),
            password: "secret".into(),
            from: "registrar@psu.palawan.edu.ph".into(),
            timeout_secs: 30,
        },
        certificates: CertificateConfig::default(),
        colleges: BTreeMap::from([
            (
                "CS".to_string(),
                CollegeInfo {
                    name: "College of Sciences".into(),
                    email: "cs@psu.palawan.edu.ph".into(),
                },
            ),
            (
                "CE".to_string(),
                CollegeInfo {
                    name: "College of Engineering".into(),
                    email: "ce@psu.palawan.edu.ph".into(),
                },
            ),
        ]),
    }
}

pub fn testing_mode_config() -> AppConfig {
    let mut config = test_config();
    config.certificates.testing_mode = true;
    config.certificates.test_address = Some(TEST_ADDRESS.into());
    config
}

pub fn settings() -> email_configuration::Model {
    email_configuration::Model {
        id: 1,
        email_domain: DOMAIN.into(),
        from_email: "registrar@psu.palawan.edu.ph".into(),
        from_name: "College of Sciences".into(),
        smtp_host: "smtp.example.com".into(),
        smtp_port: 587,
        updated_at: OffsetDateTime::now_utc(),
    }
}

pub fn template() -> email_template::Model {
    let now = OffsetDateTime::now_utc();
    email_template::Model {
        id: 7,
        name: "Report of Grades".into(),
        subject: "Report of Grades".into(),
        header_message: "Hello, Alchemist!".into(),
        body_content: "Kindly see the attached file.".into(),
        college: "CS".into(),
        is_predefined: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn pdf(name: &str) -> CertificateFile {
    CertificateFile::new(name, b"%PDF-1.4 test".to_vec())
}

/// `count` well-formed certificates with distinct student ids.
pub fn student_pdfs(count: usize) -> Vec<CertificateFile> {
    (0..count)
        .map(|i| pdf(&format!("2000-1-{i:04}.pdf")))
        .collect()
}

#[derive(Debug, Default)]
pub struct FakeMailState {
    pub opens: usize,
    pub closes: usize,
    pub sent: Vec<String>,
    pub fail_open: bool,
    /// Opens beyond this many fail.
    pub fail_open_after: Option<usize>,
    pub rejected: HashSet<String>,
    /// Raise this flag once this many messages were sent.
    pub cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

/// Mail connection that records instead of sending.
#[derive(Clone, Debug, Default)]
pub struct FakeConnection {
    pub state: Arc<Mutex<FakeMailState>>,
}

impl FakeConnection {
    pub fn failing_open() -> Self {
        let connection = Self::default();
        connection.state.lock().unwrap().fail_open = true;
        connection
    }

    pub fn rejecting(address: &str) -> Self {
        let connection = Self::default();
        connection
            .state
            .lock()
            .unwrap()
            .rejected
            .insert(address.to_string());
        connection
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl MailConnection for FakeConnection {
    async fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        if state.fail_open || state.fail_open_after.is_some_and(|n| state.opens > n) {
            return Err(TransportError::Open("connection refused".into()));
        }
        Ok(())
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        let recipient = message
            .envelope()
            .to()
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        if state.rejected.contains(&recipient) {
            return Err(TransportError::Send(format!(
                "550 mailbox unavailable: {recipient}"
            )));
        }
        state.sent.push(recipient);
        if let Some((after, flag)) = &state.cancel_after
            && state.sent.len() >= *after
        {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}

#[derive(Clone, Debug)]
pub struct RecordedBatch {
    pub template_id: Option<i32>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub status: BatchStatus,
    pub error_details: Option<String>,
    pub finalize_calls: usize,
    /// (successful, failed) after every counter update.
    pub history: Vec<(usize, usize)>,
}

#[derive(Debug, Default)]
pub struct RecordingState {
    pub batches: Vec<RecordedBatch>,
    pub logs: Vec<NewLogEntry>,
    /// Zero-based index of the first log append that fails.
    pub fail_append_at: Option<usize>,
    appends: usize,
}

/// In-memory [`BatchSink`] for tests that do not need a database.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub state: Mutex<RecordingState>,
}

impl RecordingSink {
    pub fn failing_append_at(index: usize) -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().fail_append_at = Some(index);
        sink
    }

    pub fn batch(&self, batch_id: i32) -> RecordedBatch {
        self.state.lock().unwrap().batches[batch_id as usize - 1].clone()
    }

    pub fn logs(&self) -> Vec<NewLogEntry> {
        self.state.lock().unwrap().logs.clone()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn start_batch(
        &self,
        template_id: Option<i32>,
        total: usize,
    ) -> Result<i32, PersistenceError> {
        let mut state = self.state.lock().unwrap();
        state.batches.push(RecordedBatch {
            template_id,
            total,
            successful: 0,
            failed: 0,
            status: BatchStatus::Processing,
            error_details: None,
            finalize_calls: 0,
            history: Vec::new(),
        });
        Ok(state.batches.len() as i32)
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().unwrap();
        let index = state.appends;
        state.appends += 1;
        if state.fail_append_at.is_some_and(|at| index >= at) {
            return Err(PersistenceError::Db(DbErr::Custom("disk full".into())));
        }
        state.logs.push(entry);
        Ok(())
    }

    async fn record_outcome(&self, batch_id: i32, success: bool) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().unwrap();
        let batch = state
            .batches
            .get_mut(batch_id as usize - 1)
            .ok_or(PersistenceError::MissingBatch(batch_id))?;
        if success {
            batch.successful += 1;
        } else {
            batch.failed += 1;
        }
        batch.history.push((batch.successful, batch.failed));
        Ok(())
    }

    async fn finalize(
        &self,
        batch_id: i32,
        status: BatchStatus,
        error_details: Option<String>,
    ) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().unwrap();
        let batch = state
            .batches
            .get_mut(batch_id as usize - 1)
            .ok_or(PersistenceError::MissingBatch(batch_id))?;
        batch.finalize_calls += 1;
        if batch.status != BatchStatus::Processing {
            return Err(PersistenceError::NotProcessing(batch_id));
        }
        batch.status = status;
        batch.error_details = error_details;
        Ok(())
    }
}
