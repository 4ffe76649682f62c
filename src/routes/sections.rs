use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post, put},
};
use uuid::Uuid;

use crate::{
    dto::lessons::CreateLessonRequest,
    dto::sections::{ReorderRequest, UpdateSectionRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{CourseSection, Lesson},
    response::ApiResponse,
    services::{lesson_service, section_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(update_section))
        .route("/{id}", delete(delete_section))
        .route("/{id}/lessons", post(create_lesson))
        .route("/{id}/lessons/reorder", post(reorder_lessons))
}

#[utoipa::path(
    put,
    path = "/api/sections/{id}",
    params(
        ("id" = Uuid, Path, description = "Section ID")
    ),
    request_body = UpdateSectionRequest,
    responses(
        (status = 200, description = "Update section", body = ApiResponse<CourseSection>),
        (status = 400, description = "Invalid input or not allowed"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
pub async fn update_section(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSectionRequest>,
) -> AppResult<Json<ApiResponse<CourseSection>>> {
    let resp = section_service::update_section(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/sections/{id}",
    params(
        ("id" = Uuid, Path, description = "Section ID")
    ),
    responses(
        (status = 200, description = "Delete section; sibling orders keep their gap"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sections"
)]
pub async fn delete_section(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = section_service::delete_section(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/sections/{id}/lessons",
    params(
        ("id" = Uuid, Path, description = "Section ID")
    ),
    request_body = CreateLessonRequest,
    responses(
        (status = 200, description = "Create lesson appended at the next order", body = ApiResponse<Lesson>),
        (status = 400, description = "Invalid input or not allowed"),
        (status = 404, description = "Section not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateLessonRequest>,
) -> AppResult<Json<ApiResponse<Lesson>>> {
    let resp = lesson_service::create_lesson(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/sections/{id}/lessons/reorder",
    params(
        ("id" = Uuid, Path, description = "Section ID")
    ),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Reorder lessons to the supplied id order"),
        (status = 400, description = "Empty list, foreign ids or not allowed"),
        (status = 404, description = "Section not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn reorder_lessons(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = lesson_service::reorder_lessons(&state, &user, id, payload.ids).await?;
    Ok(Json(resp))
}
