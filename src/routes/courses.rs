use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::courses::{CourseList, CreateCourseRequest, UpdateCourseRequest},
    dto::sections::{CreateSectionRequest, ReorderRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Course, CourseDetail, CourseSection},
    response::ApiResponse,
    routes::params::CourseQuery,
    services::{course_service, section_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses))
        .route("/", post(create_course))
        .route("/{id}", get(get_course))
        .route("/{id}", put(update_course))
        .route("/{id}", delete(delete_course))
        .route("/{id}/sections", post(create_section))
        .route("/{id}/sections/reorder", post(reorder_sections))
}

#[utoipa::path(
    get,
    path = "/api/courses",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search in name/description"),
    ),
    responses(
        (status = 200, description = "List courses (admin only)", body = ApiResponse<CourseList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn list_courses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CourseQuery>,
) -> AppResult<Json<ApiResponse<CourseList>>> {
    let resp = course_service::list_courses(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course with ordered sections and lessons, trimmed to the caller's access", body = ApiResponse<CourseDetail>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn get_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CourseDetail>>> {
    let resp = course_service::get_course(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 200, description = "Create course", body = ApiResponse<Course>),
        (status = 400, description = "Invalid input or not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCourseRequest>,
) -> AppResult<Json<ApiResponse<Course>>> {
    let resp = course_service::create_course(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Update course", body = ApiResponse<Course>),
        (status = 400, description = "Invalid input or not allowed"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> AppResult<Json<ApiResponse<Course>>> {
    let resp = course_service::update_course(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Delete course"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = course_service::delete_course(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/sections",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = CreateSectionRequest,
    responses(
        (status = 200, description = "Create section appended at the next order", body = ApiResponse<CourseSection>),
        (status = 400, description = "Invalid input or not allowed"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
pub async fn create_section(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateSectionRequest>,
) -> AppResult<Json<ApiResponse<CourseSection>>> {
    let resp = section_service::create_section(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/sections/reorder",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Reorder sections to the supplied id order"),
        (status = 400, description = "Empty list, foreign ids or not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
pub async fn reorder_sections(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = section_service::reorder_sections(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
