use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const SECTION_STATUSES: [&str; 2] = ["public", "private"];

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSectionRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSectionRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub status: Option<String>,
}

/// Full desired ordering of sibling section ids, first id becomes order 0.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}
