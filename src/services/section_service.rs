use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{AuditAction, log_audit},
    cache::{self, EntityKind},
    dto::sections::{CreateSectionRequest, ReorderRequest, SECTION_STATUSES, UpdateSectionRequest},
    entity::{
        course_sections::{
            ActiveModel as SectionActive, Column as SectionCol, Entity as CourseSections,
            Model as SectionModel,
        },
        courses::Entity as Courses,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CourseSection,
    ordering,
    permissions::{Action, ensure_can},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_section(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
    payload: CreateSectionRequest,
) -> AppResult<ApiResponse<CourseSection>> {
    let failed = || AppError::ActionFailed("There was an error creating your section".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageSections).map_err(|_| failed())?;
    let status = validate_status(payload.status).map_err(|_| failed())?;

    if Courses::find_by_id(course_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }

    // Read-then-write; a concurrent sibling insert may pick the same order.
    let order = ordering::next_section_order(&state.orm, course_id).await?;

    let section = SectionActive {
        id: Set(Uuid::new_v4()),
        course_id: Set(course_id),
        name: Set(payload.name),
        status: Set(status),
        order: Set(order),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    cache::invalidate_section(&state.cache, section.id, course_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::SectionCreate,
        Some(serde_json::json!({ "section_id": section.id, "course_id": course_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully created your section",
        section_from_entity(section),
        Some(Meta::empty()),
    ))
}

pub async fn update_section(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateSectionRequest,
) -> AppResult<ApiResponse<CourseSection>> {
    let failed = || AppError::ActionFailed("There was an error updating your section".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageSections).map_err(|_| failed())?;

    let existing = CourseSections::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    let course_id = existing.course_id;

    let mut active: SectionActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(status) = payload.status {
        active.status = Set(validate_status(Some(status)).map_err(|_| failed())?);
    }
    active.updated_at = Set(Utc::now().into());
    let section = active.update(&state.orm).await?;

    cache::invalidate_section(&state.cache, section.id, course_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::SectionUpdate,
        Some(serde_json::json!({ "section_id": section.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully updated your section",
        section_from_entity(section),
        Some(Meta::empty()),
    ))
}

/// Deletes one row. Sibling orders are left with a gap until the next
/// reorder call compacts them.
pub async fn delete_section(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_can(user.role, Action::ManageSections)
        .map_err(|_| AppError::ActionFailed("There was an error deleting your section".into()))?;

    let existing = CourseSections::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    let course_id = existing.course_id;

    CourseSections::delete_by_id(id).exec(&state.orm).await?;

    cache::invalidate_section(&state.cache, id, course_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::SectionDelete,
        Some(serde_json::json!({ "section_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully deleted your section",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Rewrites sibling orders to the list positions of `payload.ids`, as one
/// transaction. The list may omit siblings (they keep their stale order) but
/// every supplied id must belong to the given course.
pub async fn reorder_sections(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
    payload: ReorderRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let failed = || AppError::ActionFailed("Error reordering your sections".into());
    if payload.ids.is_empty() {
        return Err(failed());
    }
    ensure_can(user.role, Action::ManageSections).map_err(|_| failed())?;

    let txn = state.orm.begin().await?;

    let known = CourseSections::find()
        .filter(SectionCol::Id.is_in(payload.ids.clone()))
        .filter(SectionCol::CourseId.eq(course_id))
        .all(&txn)
        .await?;
    if known.len() != payload.ids.len() {
        return Err(failed());
    }

    for (id, order) in ordering::sequence(&payload.ids) {
        CourseSections::update_many()
            .col_expr(SectionCol::Order, Expr::value(order))
            .filter(SectionCol::Id.eq(id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    state
        .cache
        .invalidate(&cache::global_tag(EntityKind::CourseSections));
    for id in &payload.ids {
        state
            .cache
            .invalidate(&cache::id_tag(EntityKind::CourseSections, *id));
    }
    state
        .cache
        .invalidate(&cache::id_tag(EntityKind::Courses, course_id));

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::SectionReorder,
        Some(serde_json::json!({ "course_id": course_id, "count": payload.ids.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully reordered your sections",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_status(status: Option<String>) -> Result<String, AppError> {
    let status = status.unwrap_or_else(|| "private".to_string());
    if SECTION_STATUSES.contains(&status.as_str()) {
        Ok(status)
    } else {
        Err(AppError::BadRequest("Invalid section status".into()))
    }
}

pub fn section_from_entity(model: SectionModel) -> CourseSection {
    CourseSection {
        id: model.id,
        course_id: model.course_id,
        name: model.name,
        status: model.status,
        order: model.order,
    }
}
