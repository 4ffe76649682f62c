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
    dto::lessons::{CreateLessonRequest, LESSON_STATUSES, UpdateLessonRequest},
    entity::{
        course_sections::Entity as CourseSections,
        lessons::{
            ActiveModel as LessonActive, Column as LessonCol, Entity as Lessons,
            Model as LessonModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Lesson,
    ordering,
    permissions::{Action, ensure_can},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_lesson(
    state: &AppState,
    user: &AuthUser,
    section_id: Uuid,
    payload: CreateLessonRequest,
) -> AppResult<ApiResponse<Lesson>> {
    let failed = || AppError::ActionFailed("There was an error creating your lesson".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageLessons).map_err(|_| failed())?;
    let status = validate_status(payload.status).map_err(|_| failed())?;

    let section = CourseSections::find_by_id(section_id).one(&state.orm).await?;
    let section = match section {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };

    let order = ordering::next_lesson_order(&state.orm, section_id).await?;

    let lesson = LessonActive {
        id: Set(Uuid::new_v4()),
        section_id: Set(section_id),
        name: Set(payload.name),
        description: Set(payload.description),
        status: Set(status),
        order: Set(order),
        video_url: Set(payload.video_url),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    cache::invalidate_lesson(&state.cache, lesson.id, section_id, section.course_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::LessonCreate,
        Some(serde_json::json!({ "lesson_id": lesson.id, "section_id": section_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully created your lesson",
        lesson_from_entity(lesson),
        Some(Meta::empty()),
    ))
}

pub async fn update_lesson(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateLessonRequest,
) -> AppResult<ApiResponse<Lesson>> {
    let failed = || AppError::ActionFailed("There was an error updating your lesson".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageLessons).map_err(|_| failed())?;

    let existing = Lessons::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };
    let section_id = existing.section_id;

    let section = CourseSections::find_by_id(section_id).one(&state.orm).await?;
    let course_id = section.map(|s| s.course_id);

    let mut active: LessonActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(status) = payload.status {
        active.status = Set(validate_status(Some(status)).map_err(|_| failed())?);
    }
    if let Some(video_url) = payload.video_url {
        active.video_url = Set(Some(video_url));
    }
    active.updated_at = Set(Utc::now().into());
    let lesson = active.update(&state.orm).await?;

    if let Some(course_id) = course_id {
        cache::invalidate_lesson(&state.cache, lesson.id, section_id, course_id);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::LessonUpdate,
        Some(serde_json::json!({ "lesson_id": lesson.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully updated your lesson",
        lesson_from_entity(lesson),
        Some(Meta::empty()),
    ))
}

pub async fn delete_lesson(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_can(user.role, Action::ManageLessons)
        .map_err(|_| AppError::ActionFailed("There was an error deleting your lesson".into()))?;

    let existing = Lessons::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };
    let section_id = existing.section_id;
    let section = CourseSections::find_by_id(section_id).one(&state.orm).await?;

    Lessons::delete_by_id(id).exec(&state.orm).await?;

    if let Some(section) = section {
        cache::invalidate_lesson(&state.cache, id, section_id, section.course_id);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::LessonDelete,
        Some(serde_json::json!({ "lesson_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully deleted your lesson",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Same contract as section reordering, scoped to one section.
pub async fn reorder_lessons(
    state: &AppState,
    user: &AuthUser,
    section_id: Uuid,
    lesson_ids: Vec<Uuid>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let failed = || AppError::ActionFailed("Error reordering your lessons".into());
    if lesson_ids.is_empty() {
        return Err(failed());
    }
    ensure_can(user.role, Action::ManageLessons).map_err(|_| failed())?;

    let section = CourseSections::find_by_id(section_id).one(&state.orm).await?;
    let section = match section {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };

    let txn = state.orm.begin().await?;

    let known = Lessons::find()
        .filter(LessonCol::Id.is_in(lesson_ids.clone()))
        .filter(LessonCol::SectionId.eq(section_id))
        .all(&txn)
        .await?;
    if known.len() != lesson_ids.len() {
        return Err(failed());
    }

    for (id, order) in ordering::sequence(&lesson_ids) {
        Lessons::update_many()
            .col_expr(LessonCol::Order, Expr::value(order))
            .filter(LessonCol::Id.eq(id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    state.cache.invalidate(&cache::global_tag(EntityKind::Lessons));
    for id in &lesson_ids {
        state.cache.invalidate(&cache::id_tag(EntityKind::Lessons, *id));
    }
    state
        .cache
        .invalidate(&cache::id_tag(EntityKind::CourseSections, section_id));
    state
        .cache
        .invalidate(&cache::id_tag(EntityKind::Courses, section.course_id));

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::LessonReorder,
        Some(serde_json::json!({ "section_id": section_id, "count": lesson_ids.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully reordered your lessons",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_status(status: Option<String>) -> Result<String, AppError> {
    let status = status.unwrap_or_else(|| "private".to_string());
    if LESSON_STATUSES.contains(&status.as_str()) {
        Ok(status)
    } else {
        Err(AppError::BadRequest("Invalid lesson status".into()))
    }
}

pub fn lesson_from_entity(model: LessonModel) -> Lesson {
    Lesson {
        id: model.id,
        section_id: model.section_id,
        name: model.name,
        description: model.description,
        status: model.status,
        order: model.order,
        video_url: model.video_url,
    }
}
