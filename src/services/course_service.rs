use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{AuditAction, log_audit},
    cache::{self, EntityKind},
    dto::courses::{CourseList, CreateCourseRequest, UpdateCourseRequest},
    entity::{
        course_products::{Column as CourseProductCol, Entity as CourseProducts},
        course_sections::{Column as SectionCol, Entity as CourseSections},
        courses::{ActiveModel as CourseActive, Column as CourseCol, Entity as Courses, Model as CourseModel},
        lessons::{Column as LessonCol, Entity as Lessons},
        user_course_accesses::{Column as AccessCol, Entity as UserCourseAccesses},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Course, CourseDetail, CourseSection, Lesson, SectionWithLessons},
    permissions::{Action, can, ensure_can},
    response::{ApiResponse, Meta},
    routes::params::CourseQuery,
    state::AppState,
};

pub async fn list_courses(
    state: &AppState,
    user: &AuthUser,
    query: CourseQuery,
) -> AppResult<ApiResponse<CourseList>> {
    ensure_can(user.role, Action::ManageCourses)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(CourseCol::Name).ilike(pattern.clone()))
                .add(Expr::col(CourseCol::Description).ilike(pattern)),
        );
    }

    let finder = Courses::find()
        .filter(condition)
        .order_by_desc(CourseCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(course_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Courses", CourseList { items }, Some(meta)))
}

/// What a caller may see of a course's content. Admins see everything,
/// owners (a `user_course_accesses` row) see public sections with public and
/// preview lessons, everyone else gets previews only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentScope {
    Admin,
    Owned,
    Preview,
}

impl ContentScope {
    fn as_str(self) -> &'static str {
        match self {
            ContentScope::Admin => "admin",
            ContentScope::Owned => "owned",
            ContentScope::Preview => "preview",
        }
    }

    fn section_visible(self, status: &str) -> bool {
        self == ContentScope::Admin || status == "public"
    }

    fn lesson_visible(self, status: &str) -> bool {
        match self {
            ContentScope::Admin => true,
            ContentScope::Owned => status == "public" || status == "preview",
            ContentScope::Preview => status == "preview",
        }
    }
}

async fn content_scope(state: &AppState, user: &AuthUser, course_id: Uuid) -> AppResult<ContentScope> {
    if can(user.role, Action::ManageCourses) {
        return Ok(ContentScope::Admin);
    }
    let owned = UserCourseAccesses::find()
        .filter(AccessCol::UserId.eq(user.user_id))
        .filter(AccessCol::CourseId.eq(course_id))
        .one(&state.orm)
        .await?;
    Ok(if owned.is_some() {
        ContentScope::Owned
    } else {
        ContentScope::Preview
    })
}

/// Course with ordered sections and lessons, trimmed to what the caller's
/// access allows. Cached per scope under the course id tag, so any mutation
/// in the containment chain recomputes it; the scope itself is resolved
/// fresh on every call so a refund takes effect immediately.
pub async fn get_course(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CourseDetail>> {
    let scope = content_scope(state, user, id).await?;
    let cache_key = format!("courses:{id}:detail:{}", scope.as_str());
    if let Some(detail) = state.cache.get::<CourseDetail>(&cache_key) {
        return Ok(ApiResponse::success("Course", detail, None));
    }

    let course = Courses::find_by_id(id).one(&state.orm).await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let sections = CourseSections::find()
        .filter(SectionCol::CourseId.eq(id))
        .order_by_asc(SectionCol::Order)
        .order_by_asc(SectionCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let section_ids: Vec<Uuid> = sections.iter().map(|s| s.id).collect();
    let lessons = if section_ids.is_empty() {
        Vec::new()
    } else {
        Lessons::find()
            .filter(LessonCol::SectionId.is_in(section_ids))
            .order_by_asc(LessonCol::Order)
            .order_by_asc(LessonCol::CreatedAt)
            .all(&state.orm)
            .await?
    };

    let sections = sections
        .into_iter()
        .filter(|section| scope.section_visible(&section.status))
        .map(|section| {
            let lessons = lessons
                .iter()
                .filter(|l| l.section_id == section.id && scope.lesson_visible(&l.status))
                .cloned()
                .map(|l| Lesson {
                    id: l.id,
                    section_id: l.section_id,
                    name: l.name,
                    description: l.description,
                    status: l.status,
                    order: l.order,
                    video_url: l.video_url,
                })
                .collect();
            SectionWithLessons {
                section: CourseSection {
                    id: section.id,
                    course_id: section.course_id,
                    name: section.name,
                    status: section.status,
                    order: section.order,
                },
                lessons,
            }
        })
        .collect();

    let detail = CourseDetail {
        course: course_from_entity(course),
        sections,
    };

    state.cache.put(
        &cache_key,
        &detail,
        &[
            cache::global_tag(EntityKind::Courses),
            cache::id_tag(EntityKind::Courses, id),
        ],
    );

    Ok(ApiResponse::success("Course", detail, None))
}

pub async fn create_course(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCourseRequest,
) -> AppResult<ApiResponse<Course>> {
    let failed = || AppError::ActionFailed("There was an error creating your course".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageCourses).map_err(|_| failed())?;

    let course = CourseActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    cache::invalidate_course(&state.cache, course.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CourseCreate,
        Some(serde_json::json!({ "course_id": course.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully created your course",
        course_from_entity(course),
        Some(Meta::empty()),
    ))
}

pub async fn update_course(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCourseRequest,
) -> AppResult<ApiResponse<Course>> {
    let failed = || AppError::ActionFailed("There was an error updating your course".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageCourses).map_err(|_| failed())?;

    let existing = Courses::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let mut active: CourseActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    active.updated_at = Set(Utc::now().into());
    let course = active.update(&state.orm).await?;

    cache::invalidate_course(&state.cache, course.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CourseUpdate,
        Some(serde_json::json!({ "course_id": course.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully updated your course",
        course_from_entity(course),
        Some(Meta::empty()),
    ))
}

pub async fn delete_course(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let failed = || AppError::ActionFailed("There was an error deleting your course".into());
    ensure_can(user.role, Action::ManageCourses).map_err(|_| failed())?;

    // Courses bundled into a product must be unlinked first.
    let link_count = CourseProducts::find()
        .filter(CourseProductCol::CourseId.eq(id))
        .count(&state.orm)
        .await?;
    if link_count > 0 {
        return Err(failed());
    }

    let result = Courses::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    cache::invalidate_course(&state.cache, id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CourseDelete,
        Some(serde_json::json!({ "course_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully deleted your course",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn course_from_entity(model: CourseModel) -> Course {
    Course {
        id: model.id,
        name: model.name,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
