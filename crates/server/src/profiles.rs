//! Per-user college assignment.
//!
//! A profile ties an operator account to at most one college. The college
//! decides which templates the operator is offered.

use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::entity::user_profile;
use crate::error::CatalogError;
use crate::template_catalog::TemplateScope;

/// Make sure `user_id` has a profile.
///
/// Superusers never get one and see every template. An existing profile is
/// returned unchanged; otherwise one is created with `college`, which must be
/// a configured college code when given.
#[tracing::instrument(skip(db, config))]
pub async fn provision_profile(
    db: &DatabaseConnection,
    config: &AppConfig,
    user_id: &str,
    college: Option<&str>,
    is_superuser: bool,
) -> Result<Option<user_profile::Model>, CatalogError> {
    if is_superuser {
        return Ok(None);
    }
    if let Some(existing) = find_profile(db, user_id).await? {
        return Ok(Some(existing));
    }

    let college = college
        .map(|code| {
            config
                .college_code(code)
                .cloned()
                .ok_or_else(|| CatalogError::UnknownCollege(code.to_string()))
        })
        .transpose()?;

    let created = user_profile::ActiveModel {
        id: ActiveValue::NotSet,
        user_id: ActiveValue::Set(user_id.to_string()),
        college: ActiveValue::Set(college),
        created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
    }
    .insert(db)
    .await?;

    tracing::info!(
        name = "profiles.created",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        user_id = %created.user_id,
        college = ?created.college,
        message = "Created user profile"
    );
    Ok(Some(created))
}

pub async fn find_profile(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Option<user_profile::Model>, DbErr> {
    user_profile::Entity::find()
        .filter(user_profile::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// Templates `user_id` may choose from. Users without a profile or without a
/// college are not restricted.
pub async fn template_scope(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<TemplateScope, DbErr> {
    Ok(find_profile(db, user_id)
        .await?
        .and_then(|profile| profile.college)
        .map_or(TemplateScope::All, TemplateScope::College))
}
