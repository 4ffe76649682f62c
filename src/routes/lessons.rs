use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, put},
};
use uuid::Uuid;

use crate::{
    dto::lessons::UpdateLessonRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Lesson,
    response::ApiResponse,
    services::lesson_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(update_lesson))
        .route("/{id}", delete(delete_lesson))
}

#[utoipa::path(
    put,
    path = "/api/lessons/{id}",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = UpdateLessonRequest,
    responses(
        (status = 200, description = "Update lesson", body = ApiResponse<Lesson>),
        (status = 400, description = "Invalid input or not allowed"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn update_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLessonRequest>,
) -> AppResult<Json<ApiResponse<Lesson>>> {
    let resp = lesson_service::update_lesson(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/lessons/{id}",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Delete lesson; sibling orders keep their gap"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = lesson_service::delete_lesson(&state, &user, id).await?;
    Ok(Json(resp))
}
