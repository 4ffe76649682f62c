use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::purchases::PurchaseList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Purchase, StatsSummary},
    response::ApiResponse,
    routes::params::PurchaseListQuery,
    services::{admin_service, purchase_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchases", get(list_all_purchases))
        .route("/purchases/{id}/refund", post(refund_purchase))
        .route("/stats", get(get_stats))
}

#[utoipa::path(
    get,
    path = "/api/admin/purchases",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("refunded" = Option<bool>, Query, description = "Filter by refund state"),
    ),
    responses(
        (status = 200, description = "All purchases (admin only)", body = ApiResponse<PurchaseList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_purchases(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PurchaseListQuery>,
) -> AppResult<Json<ApiResponse<PurchaseList>>> {
    let resp = purchase_service::list_all_purchases(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/purchases/{id}/refund",
    params(
        ("id" = Uuid, Path, description = "Purchase ID")
    ),
    responses(
        (status = 200, description = "Refund purchase and revoke course access", body = ApiResponse<Purchase>),
        (status = 400, description = "Already refunded or not allowed"),
        (status = 404, description = "Not Found"),
        (status = 502, description = "Payment provider error; nothing persisted"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn refund_purchase(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Purchase>>> {
    let resp = purchase_service::refund_purchase(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Sales dashboard aggregates", body = ApiResponse<StatsSummary>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<StatsSummary>>> {
    let resp = admin_service::get_stats(&state, &user).await?;
    Ok(Json(resp))
}
