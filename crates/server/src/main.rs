use certificate_mailer::AppResources;
use certificate_mailer::certificates::progress::{
    DEFAULT_RECENT_LOGS, batch_logs, batch_progress, log_line, recent_logs,
};
use certificate_mailer::certificates::summary::{rejection_report, screening_notice};
use certificate_mailer::certificates::{
    BatchDispatcher, BatchJob, BatchSink, CertificateFile, DatabaseSink, SmtpConnection,
    screen_uploads,
};
use certificate_mailer::config::load_config_or_panic;
use certificate_mailer::email_settings::{self, EmailSettingsUpdate};
use certificate_mailer::email_templates::CertificateEmailTemplate;
use certificate_mailer::profiles;
use certificate_mailer::template_catalog::{self, TemplateScope};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use sea_orm::Database;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "certificate-mailer")]
#[command(version)]
#[command(about = "Send certificate PDFs to students by email", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the predefined templates for every configured college
    SeedTemplates,
    /// List templates
    Templates {
        /// Only templates of this college
        #[arg(long, conflicts_with = "user")]
        college: Option<String>,
        /// Only templates visible to this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Assign a user to a college
    Profile {
        user_id: String,
        #[arg(long)]
        college: Option<String>,
        /// Superusers are never scoped to a college
        #[arg(long)]
        superuser: bool,
    },
    /// Show or change the email configuration
    Settings {
        #[arg(long)]
        email_domain: Option<String>,
        #[arg(long)]
        from_email: Option<String>,
        #[arg(long)]
        from_name: Option<String>,
        #[arg(long)]
        smtp_host: Option<String>,
        #[arg(long)]
        smtp_port: Option<u16>,
    },
    /// Send one certificate email per file
    Send {
        /// Template to render
        #[arg(long)]
        template: i32,
        /// Certificate PDFs named after student ids (e.g. 2000-1-0123.pdf)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Render a template as HTML with a placeholder for the attachment
    Preview {
        #[arg(long)]
        template: i32,
    },
    /// Print the progress of a batch as JSON
    Progress { batch_id: i32 },
    /// Show the email log, newest first
    Logs {
        /// Number of rows to show
        #[arg(long, default_value_t = DEFAULT_RECENT_LOGS)]
        limit: u64,
        /// Every row of one batch, in send order
        #[arg(long, conflicts_with = "limit")]
        batch: Option<i32>,
    },
}

fn initialize_standard_tracing() {
    let default_directives = "certificate_mailer=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    initialize_standard_tracing();

    let cli = Cli::parse();
    let config = Arc::new(load_config_or_panic());
    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("Failed to connect to database")?,
    );
    let resources = AppResources { db, config };

    match cli.command {
        Commands::SeedTemplates => seed_templates(&resources).await,
        Commands::Templates { college, user } => list_templates(&resources, college, user).await,
        Commands::Profile {
            user_id,
            college,
            superuser,
        } => {
            let profile = profiles::provision_profile(
                &resources.db,
                &resources.config,
                &user_id,
                college.as_deref(),
                superuser,
            )
            .await?;
            match profile {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => println!("{user_id} is a superuser and sees every template."),
            }
            Ok(())
        }
        Commands::Settings {
            email_domain,
            from_email,
            from_name,
            smtp_host,
            smtp_port,
        } => {
            let update = EmailSettingsUpdate {
                email_domain,
                from_email,
                from_name,
                smtp_host,
                smtp_port,
            };
            let settings = if update == EmailSettingsUpdate::default() {
                email_settings::load_or_default(&resources.db, &resources.config.smtp).await?
            } else {
                email_settings::update_settings(&resources.db, &resources.config.smtp, update)
                    .await?
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Send { template, files } => send(&resources, template, files).await,
        Commands::Preview { template } => {
            let template = template_catalog::get_template(&resources.db, template).await?;
            let html = CertificateEmailTemplate::new(
                &template,
                resources.config.college(&template.college),
            )
            .preview()
            .render_html()?;
            println!("{html}");
            Ok(())
        }
        Commands::Progress { batch_id } => {
            let progress = batch_progress(&resources.db, batch_id)
                .await?
                .ok_or_else(|| eyre!("Certificate batch {batch_id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&progress)?);
            Ok(())
        }
        Commands::Logs { limit, batch } => {
            let logs = match batch {
                Some(batch_id) => batch_logs(&resources.db, batch_id).await?,
                None => recent_logs(&resources.db, limit).await?,
            };
            for log in &logs {
                println!("{}", log_line(log));
            }
            Ok(())
        }
    }
}

async fn seed_templates(resources: &AppResources) -> color_eyre::eyre::Result<()> {
    let report =
        template_catalog::seed_predefined_templates(&resources.db, &resources.config).await?;
    println!(
        "Seeded templates for {} colleges: {} created, {} already present.",
        report.colleges, report.created, report.skipped
    );
    Ok(())
}

async fn list_templates(
    resources: &AppResources,
    college: Option<String>,
    user: Option<String>,
) -> color_eyre::eyre::Result<()> {
    let scope = match (college, user) {
        (Some(code), _) => TemplateScope::College(
            resources.config.college_code(&code).cloned().unwrap_or(code),
        ),
        (None, Some(user_id)) => profiles::template_scope(&resources.db, &user_id).await?,
        (None, None) => TemplateScope::All,
    };
    for template in template_catalog::list_templates(&resources.db, &scope).await? {
        println!(
            "{:>4}  {:<8} {}{}",
            template.id,
            template.college,
            template.name,
            if template.is_predefined {
                " (predefined)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

async fn send(
    resources: &AppResources,
    template_id: i32,
    paths: Vec<PathBuf>,
) -> color_eyre::eyre::Result<()> {
    let config = resources.config.as_ref();
    let template = template_catalog::get_template(&resources.db, template_id).await?;
    let settings = email_settings::load_or_default(&resources.db, &config.smtp).await?;

    let mut uploads = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = CertificateFile::from_path(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        uploads.push(file);
    }

    let screening = screen_uploads(uploads, config.certificates.testing_mode);
    if let Some(report) = rejection_report(&screening.rejected) {
        println!("{report}");
    }
    if let Some(notice) = screening_notice(screening.accepted.len(), screening.rejected.len()) {
        println!("{notice}");
    }
    if screening.accepted.is_empty() {
        return Ok(());
    }

    let sink = DatabaseSink::new(resources.db.clone());
    let batch_id = sink
        .start_batch(Some(template.id), screening.accepted.len())
        .await?;
    println!(
        "Batch {batch_id}: sending {} certificates with '{}'.",
        screening.accepted.len(),
        template.name
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(
                    name = "cli.cancel_requested",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    message = "Cancellation requested, stopping after the current certificate"
                );
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let dispatcher = BatchDispatcher::new(&settings, config, &sink);
    let job = BatchJob {
        template: &template,
        files: screening.accepted,
        batch_id: Some(batch_id),
        cancel: Some(cancel.clone()),
    };

    match dispatcher
        .run(SmtpConnection::new(&settings, &config.smtp), job)
        .await
    {
        Ok(summary) => {
            if cancel.load(Ordering::SeqCst) {
                println!(
                    "Batch cancelled after {} of {} certificates.",
                    summary.processed(),
                    summary.total
                );
            }
            if summary.processed() > 0 {
                println!("{}", summary.headline());
            }
            if let Some(report) = summary.error_report() {
                println!("{report}");
            }
            Ok(())
        }
        Err(aborted) => {
            if aborted.summary.processed() > 0 {
                println!("{}", aborted.summary.headline());
            }
            if let Some(report) = aborted.summary.error_report() {
                println!("{report}");
            }
            Err(aborted.into())
        }
    }
}
