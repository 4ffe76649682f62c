use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::purchases::{ConfirmPurchaseRequest, PurchaseList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Purchase,
    response::ApiResponse,
    services::purchase_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_purchases))
        .route("/confirm", post(confirm_purchase))
}

#[utoipa::path(
    get,
    path = "/api/purchases",
    responses(
        (status = 200, description = "Own purchase history", body = ApiResponse<PurchaseList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Purchases"
)]
pub async fn list_my_purchases(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PurchaseList>>> {
    let resp = purchase_service::list_my_purchases(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/purchases/confirm",
    request_body = ConfirmPurchaseRequest,
    responses(
        (status = 200, description = "Record a paid checkout session as a purchase", body = ApiResponse<Purchase>),
        (status = 400, description = "Session unpaid or not for this user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Purchases"
)]
pub async fn confirm_purchase(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConfirmPurchaseRequest>,
) -> AppResult<Json<ApiResponse<Purchase>>> {
    let resp = purchase_service::confirm_purchase(&state, &user, payload).await?;
    Ok(Json(resp))
}
