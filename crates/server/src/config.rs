use lettre::Address;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// SMTP credentials and the defaults used when the email configuration row
/// is first created.
#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CertificateConfig {
    /// Rehearsal mode: every certificate goes to `test_address` and file names
    /// are not checked for the student id shape.
    #[serde(default)]
    pub testing_mode: bool,
    #[serde(default)]
    pub test_address: Option<String>,
    /// Number of processed items between two connection cooldowns.
    #[serde(default = "default_cooldown_every")]
    pub cooldown_every: usize,
    #[serde(default = "default_cooldown_pause_secs")]
    pub cooldown_pause_secs: u64,
    /// Directory holding `college_logo.png` / `nexus_logo.png`, embedded
    /// inline when present.
    #[serde(default)]
    pub logo_dir: Option<PathBuf>,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            testing_mode: false,
            test_address: None,
            cooldown_every: default_cooldown_every(),
            cooldown_pause_secs: default_cooldown_pause_secs(),
            logo_dir: None,
        }
    }
}

impl CertificateConfig {
    pub fn cooldown_pause(&self) -> Duration {
        Duration::from_secs(self.cooldown_pause_secs)
    }
}

/// Display metadata of a college, used for template seeding and email branding.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CollegeInfo {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub certificates: CertificateConfig,
    #[serde(default)]
    pub colleges: BTreeMap<String, CollegeInfo>,
}

impl AppConfig {
    /// Look up a college by code. Codes compare case-insensitively since
    /// environment overrides may change key casing.
    pub fn college(&self, code: &str) -> Option<&CollegeInfo> {
        self.college_code(code).and_then(|key| self.colleges.get(key))
    }

    /// Configured spelling of a college code.
    pub fn college_code(&self, code: &str) -> Option<&String> {
        self.colleges
            .keys()
            .find(|key| key.eq_ignore_ascii_case(code))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp.port == 0 {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        if self.certificates.cooldown_every == 0 {
            return Err(ConfigError::Validation(
                "certificates.cooldown_every must be > 0".into(),
            ));
        }
        if self.certificates.testing_mode {
            let Some(address) = self.certificates.test_address.as_deref() else {
                return Err(ConfigError::Validation(
                    "certificates.test_address is required when testing_mode is enabled".into(),
                ));
            };
            address.parse::<Address>().map_err(|e| {
                ConfigError::Validation(format!(
                    "certificates.test_address '{address}' is not a valid email address: {e}"
                ))
            })?;
        }
        if let Some((code, _)) = self
            .colleges
            .iter()
            .find(|(_, info)| info.name.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "colleges.{code}.name must not be empty"
            )));
        }
        Ok(())
    }
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

fn default_cooldown_every() -> usize {
    80
}

fn default_cooldown_pause_secs() -> u64 {
    100
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `SMTP__PORT`, `CERTIFICATES__TESTING_MODE`) overrides the
/// file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
