//! Template catalog, email settings and user profiles on SQLite.

mod common;

use certificate_mailer::certificates::progress::{DEFAULT_RECENT_LOGS, log_line, recent_logs};
use certificate_mailer::certificates::{BatchSink, DatabaseSink, NewLogEntry};
use certificate_mailer::email_settings::{
    DEFAULT_EMAIL_DOMAIN, DEFAULT_FROM_NAME, EmailSettingsUpdate, load_or_default,
    update_settings,
};
use certificate_mailer::entity::certificate_batch;
use certificate_mailer::entity::email_log::SendStatus;
use certificate_mailer::error::CatalogError;
use certificate_mailer::profiles::{provision_profile, template_scope};
use certificate_mailer::template_catalog::{
    TemplateDraft, TemplateScope, create_template, delete_template, get_template,
    list_templates, seed_predefined_templates, update_template,
};
use common::{setup_db, test_config};
use sea_orm::EntityTrait;
use std::sync::Arc;

fn draft(name: &str, college: &str) -> TemplateDraft {
    TemplateDraft {
        name: name.into(),
        subject: format!("{name} subject"),
        header_message: "Good day!".into(),
        body_content: "Please find your certificate attached.".into(),
        college: college.into(),
    }
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let db = setup_db().await;
    let config = test_config();

    let first = seed_predefined_templates(&db, &config).await.unwrap();
    assert_eq!((first.created, first.skipped, first.colleges), (4, 0, 2));

    let second = seed_predefined_templates(&db, &config).await.unwrap();
    assert_eq!((second.created, second.skipped), (0, 4));

    let all = list_templates(&db, &TemplateScope::All).await.unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|t| t.is_predefined));
}

#[tokio::test]
async fn seeded_bodies_name_their_college() {
    let db = setup_db().await;
    let config = test_config();
    seed_predefined_templates(&db, &config).await.unwrap();

    let cs = list_templates(&db, &TemplateScope::College("CS".into()))
        .await
        .unwrap();
    let names: Vec<&str> = cs.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Certificate of Registration", "Report of Grades"]);

    assert!(cs[0].body_content.contains("Welcome to the College of Sciences!"));
    assert!(!cs[0].body_content.contains("{college_name}"));
    assert!(cs[1].body_content.contains("cs@psu.palawan.edu.ph"));
    assert!(!cs[1].body_content.contains("{college_email}"));
}

#[tokio::test]
async fn predefined_templates_are_immutable() {
    let db = setup_db().await;
    let config = test_config();
    seed_predefined_templates(&db, &config).await.unwrap();
    let predefined = list_templates(&db, &TemplateScope::College("CS".into()))
        .await
        .unwrap()
        .remove(0);

    assert!(matches!(
        update_template(&db, &config, predefined.id, draft("Renamed", "CS")).await,
        Err(CatalogError::PredefinedImmutable(_))
    ));
    assert!(matches!(
        delete_template(&db, predefined.id).await,
        Err(CatalogError::PredefinedImmutable(_))
    ));
    assert_eq!(get_template(&db, predefined.id).await.unwrap(), predefined);
}

#[tokio::test]
async fn custom_templates_are_validated_and_scoped() {
    let db = setup_db().await;
    let config = test_config();

    let created = create_template(&db, &config, draft("Dean's List", "cs"))
        .await
        .unwrap();
    assert_eq!(created.college, "CS");
    assert!(!created.is_predefined);

    assert!(matches!(
        create_template(&db, &config, draft("Dean's List", "CS")).await,
        Err(CatalogError::Duplicate { .. })
    ));
    assert!(matches!(
        create_template(&db, &config, draft("Dean's List", "XX")).await,
        Err(CatalogError::UnknownCollege(code)) if code == "XX"
    ));
    // Same name in another college is fine
    create_template(&db, &config, draft("Dean's List", "CE"))
        .await
        .unwrap();

    let updated = update_template(&db, &config, created.id, draft("Honors", "CS"))
        .await
        .unwrap();
    assert_eq!(updated.name, "Honors");
    assert_eq!(updated.subject, "Honors subject");

    let ce = list_templates(&db, &TemplateScope::College("CE".into()))
        .await
        .unwrap();
    assert_eq!(ce.len(), 1);
    assert_eq!(ce[0].college, "CE");

    assert!(matches!(
        get_template(&db, 999).await,
        Err(CatalogError::NotFound(999))
    ));
}

#[tokio::test]
async fn deleting_a_template_keeps_its_history() {
    let db = Arc::new(setup_db().await);
    let config = test_config();
    let template = create_template(&db, &config, draft("One-off", "CS"))
        .await
        .unwrap();

    let sink = DatabaseSink::new(db.clone());
    let batch_id = sink.start_batch(Some(template.id), 1).await.unwrap();
    sink.append_log(NewLogEntry {
        student_id: "2000-1-0123".into(),
        email: Some("200010123@psu.palawan.edu.ph".into()),
        certificate_filename: "2000-1-0123.pdf".into(),
        template_id: Some(template.id),
        batch_id: Some(batch_id),
        status: SendStatus::Success,
        error_message: None,
    })
    .await
    .unwrap();

    delete_template(&db, template.id).await.unwrap();

    assert!(matches!(
        get_template(&db, template.id).await,
        Err(CatalogError::NotFound(_))
    ));
    let logs = recent_logs(&db, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].template_id, None);
    assert_eq!(logs[0].batch_id, Some(batch_id));

    let batch = certificate_batch::Entity::find_by_id(batch_id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.template_id, None);
}

#[tokio::test]
async fn email_settings_are_a_singleton() {
    let db = setup_db().await;
    let config = test_config();

    let first = load_or_default(&db, &config.smtp).await.unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(first.email_domain, DEFAULT_EMAIL_DOMAIN);
    assert_eq!(first.from_name, DEFAULT_FROM_NAME);
    assert_eq!(first.from_email, config.smtp.from);
    assert_eq!(first.smtp_host, config.smtp.server);
    assert_eq!(first.smtp_port, 587);

    let second = load_or_default(&db, &config.smtp).await.unwrap();
    assert_eq!(first, second);

    let updated = update_settings(
        &db,
        &config.smtp,
        EmailSettingsUpdate {
            email_domain: Some("students.example.edu".into()),
            smtp_port: Some(2525),
            ..EmailSettingsUpdate::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.id, 1);
    assert_eq!(updated.email_domain, "students.example.edu");
    assert_eq!(updated.smtp_port, 2525);
    assert_eq!(updated.from_name, DEFAULT_FROM_NAME);

    let reloaded = load_or_default(&db, &config.smtp).await.unwrap();
    assert_eq!(reloaded.email_domain, "students.example.edu");
}

#[tokio::test]
async fn profiles_scope_templates() {
    let db = setup_db().await;
    let config = test_config();

    assert_eq!(
        provision_profile(&db, &config, "admin", Some("CS"), true)
            .await
            .unwrap(),
        None
    );
    assert_eq!(template_scope(&db, "admin").await.unwrap(), TemplateScope::All);

    let staff = provision_profile(&db, &config, "registrar", Some("ce"), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staff.college.as_deref(), Some("CE"));
    assert_eq!(
        template_scope(&db, "registrar").await.unwrap(),
        TemplateScope::College("CE".into())
    );

    // An existing profile is kept as is
    let again = provision_profile(&db, &config, "registrar", Some("CS"), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again, staff);

    let unassigned = provision_profile(&db, &config, "clerk", None, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unassigned.college, None);
    assert_eq!(template_scope(&db, "clerk").await.unwrap(), TemplateScope::All);

    assert!(matches!(
        provision_profile(&db, &config, "visitor", Some("XX"), false).await,
        Err(CatalogError::UnknownCollege(_))
    ));
}

#[tokio::test]
async fn recent_logs_show_the_newest_twenty() {
    let db = Arc::new(setup_db().await);
    let sink = DatabaseSink::new(db.clone());
    for i in 0..25 {
        sink.append_log(NewLogEntry {
            student_id: format!("2000-1-{i:04}"),
            email: None,
            certificate_filename: format!("2000-1-{i:04}.pdf"),
            template_id: None,
            batch_id: None,
            status: SendStatus::Failed,
            error_message: Some("550 mailbox unavailable".into()),
        })
        .await
        .unwrap();
    }

    let logs = recent_logs(&db, DEFAULT_RECENT_LOGS).await.unwrap();
    assert_eq!(logs.len(), 20);
    assert_eq!(logs[0].student_id, "2000-1-0024");
    assert_eq!(logs[19].student_id, "2000-1-0005");
    assert!(log_line(&logs[0]).ends_with("2000-1-0024.pdf  550 mailbox unavailable"));
}
