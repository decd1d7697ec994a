//! Email template catalog.
//!
//! Templates are unique per (name, college). Predefined templates come from
//! [`seed_predefined_templates`] and can neither be updated nor deleted here.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::entity::{certificate_batch, email_log, email_template};
use crate::error::CatalogError;

/// Which templates a user may pick from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateScope {
    /// No college scoping applies (superusers, or users without a college).
    All,
    College(String),
}

/// Administrator-editable fields of a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateDraft {
    pub name: String,
    pub subject: String,
    pub header_message: String,
    pub body_content: String,
    pub college: String,
}

struct Blueprint {
    name: &'static str,
    subject: &'static str,
    header_message: &'static str,
    body_content: &'static str,
}

const PREDEFINED: [Blueprint; 2] = [
    Blueprint {
        name: "Certificate of Registration",
        subject: "Certificate of Registration",
        header_message: "Congratulations!",
        body_content: "On behalf of the {college_name}, we are sending you your Certificate of Registration, which serves as your proof of enrollment.

It is important that you keep this document as part of your record, as this is an official school document.

<h3 style=\"letter-spacing: 1px;\">Welcome to the {college_name}!</h3>",
    },
    Blueprint {
        name: "Report of Grades",
        subject: "Report of Grades",
        header_message: "Hello, Alchemist!",
        body_content: "Kindly see the attached file for the copy of your report of grades for the semester: FIRST Sem. 2025-2026

For questions or concerns, please send an e-mail to {college_email}, with \"Report of Grades\" as the subject line.

Thank you so much.

<div style=\"color: red; font-style: italic;\">
    This e-mail is confidential. It may also be legally privileged. If you are not the addressee you should not copy, forward, disclose or use any part of it.
    If you have received this message in error, please delete it and all copies from your system and notify the sender immediately.
</div>",
    },
];

/// Outcome of seeding predefined templates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
    pub colleges: usize,
}

/// Templates visible in `scope`, predefined first, then by name.
pub async fn list_templates(
    db: &DatabaseConnection,
    scope: &TemplateScope,
) -> Result<Vec<email_template::Model>, CatalogError> {
    let mut query = email_template::Entity::find();
    if let TemplateScope::College(code) = scope {
        query = query.filter(email_template::Column::College.eq(code.as_str()));
    }
    Ok(query
        .order_by_desc(email_template::Column::IsPredefined)
        .order_by_asc(email_template::Column::Name)
        .all(db)
        .await?)
}

pub async fn get_template(
    db: &DatabaseConnection,
    id: i32,
) -> Result<email_template::Model, CatalogError> {
    email_template::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(CatalogError::NotFound(id))
}

#[tracing::instrument(
    skip(db, config, draft),
    fields(name = %draft.name, college = %draft.college)
)]
pub async fn create_template(
    db: &DatabaseConnection,
    config: &AppConfig,
    draft: TemplateDraft,
) -> Result<email_template::Model, CatalogError> {
    let college = known_college(config, &draft.college)?;
    ensure_unique(db, &draft.name, &college, None).await?;

    let now = OffsetDateTime::now_utc();
    let created = email_template::ActiveModel {
        id: ActiveValue::NotSet,
        name: ActiveValue::Set(draft.name),
        subject: ActiveValue::Set(draft.subject),
        header_message: ActiveValue::Set(draft.header_message),
        body_content: ActiveValue::Set(draft.body_content),
        college: ActiveValue::Set(college),
        is_predefined: ActiveValue::Set(false),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
    }
    .insert(db)
    .await?;
    Ok(created)
}

#[tracing::instrument(skip(db, config, draft))]
pub async fn update_template(
    db: &DatabaseConnection,
    config: &AppConfig,
    id: i32,
    draft: TemplateDraft,
) -> Result<email_template::Model, CatalogError> {
    let existing = get_template(db, id).await?;
    if existing.is_predefined {
        return Err(CatalogError::PredefinedImmutable(existing.name));
    }
    let college = known_college(config, &draft.college)?;
    ensure_unique(db, &draft.name, &college, Some(id)).await?;

    let mut active: email_template::ActiveModel = existing.into();
    active.name = ActiveValue::Set(draft.name);
    active.subject = ActiveValue::Set(draft.subject);
    active.header_message = ActiveValue::Set(draft.header_message);
    active.body_content = ActiveValue::Set(draft.body_content);
    active.college = ActiveValue::Set(college);
    active.updated_at = ActiveValue::Set(OffsetDateTime::now_utc());
    Ok(active.update(db).await?)
}

/// Delete a template. Logs and batches keep their rows with the reference
/// cleared.
#[tracing::instrument(skip(db))]
pub async fn delete_template(db: &DatabaseConnection, id: i32) -> Result<(), CatalogError> {
    let existing = get_template(db, id).await?;
    if existing.is_predefined {
        return Err(CatalogError::PredefinedImmutable(existing.name));
    }

    let txn = db.begin().await?;
    email_log::Entity::update_many()
        .col_expr(email_log::Column::TemplateId, Expr::value(Option::<i32>::None))
        .filter(email_log::Column::TemplateId.eq(id))
        .exec(&txn)
        .await?;
    certificate_batch::Entity::update_many()
        .col_expr(
            certificate_batch::Column::TemplateId,
            Expr::value(Option::<i32>::None),
        )
        .filter(certificate_batch::Column::TemplateId.eq(id))
        .exec(&txn)
        .await?;
    email_template::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

/// Create the predefined templates for every configured college. Existing
/// (name, college) pairs are left untouched, so seeding can be repeated.
#[tracing::instrument(skip_all)]
pub async fn seed_predefined_templates(
    db: &DatabaseConnection,
    config: &AppConfig,
) -> Result<SeedReport, CatalogError> {
    let mut report = SeedReport {
        colleges: config.colleges.len(),
        ..SeedReport::default()
    };

    for (code, college) in &config.colleges {
        for blueprint in &PREDEFINED {
            let exists = email_template::Entity::find()
                .filter(email_template::Column::Name.eq(blueprint.name))
                .filter(email_template::Column::College.eq(code.as_str()))
                .one(db)
                .await?
                .is_some();
            if exists {
                report.skipped += 1;
                continue;
            }

            let body = blueprint
                .body_content
                .replace("{college_name}", &college.name)
                .replace("{college_email}", &college.email);
            let now = OffsetDateTime::now_utc();
            email_template::ActiveModel {
                id: ActiveValue::NotSet,
                name: ActiveValue::Set(blueprint.name.to_string()),
                subject: ActiveValue::Set(blueprint.subject.to_string()),
                header_message: ActiveValue::Set(blueprint.header_message.to_string()),
                body_content: ActiveValue::Set(body),
                college: ActiveValue::Set(code.clone()),
                is_predefined: ActiveValue::Set(true),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            }
            .insert(db)
            .await?;
            report.created += 1;

            tracing::info!(
                name = "template_catalog.seeded",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                template = blueprint.name,
                college = %code,
                message = "Created predefined template"
            );
        }
    }

    Ok(report)
}

/// Canonical code of a configured college.
fn known_college(config: &AppConfig, code: &str) -> Result<String, CatalogError> {
    config
        .college_code(code)
        .cloned()
        .ok_or_else(|| CatalogError::UnknownCollege(code.to_string()))
}

async fn ensure_unique(
    db: &DatabaseConnection,
    name: &str,
    college: &str,
    except: Option<i32>,
) -> Result<(), CatalogError> {
    let mut query = email_template::Entity::find()
        .filter(email_template::Column::Name.eq(name))
        .filter(email_template::Column::College.eq(college));
    if let Some(id) = except {
        query = query.filter(email_template::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(CatalogError::Duplicate {
            name: name.to_string(),
            college: college.to_string(),
        });
    }
    Ok(())
}
