use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Purchase;

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmPurchaseRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PurchaseList {
    pub items: Vec<Purchase>,
}
