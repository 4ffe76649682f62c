use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Product;

pub const PRODUCT_STATUSES: [&str; 2] = ["public", "private"];
pub const PRODUCT_TAGS: [&str; 5] = ["recommended", "popular", "new", "bestseller", "featured"];

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(url)]
    pub image_url: String,
    #[validate(range(min = 0))]
    pub price_in_dollars: i32,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Courses bundled into this product.
    #[serde(default)]
    pub course_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(range(min = 0))]
    pub price_in_dollars: Option<i32>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
    pub course_ids: Option<Vec<Uuid>>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

/// Product detail with the bundled courses and their content counts.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub courses: Vec<ProductCourseSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductCourseSummary {
    pub id: Uuid,
    pub name: String,
    pub section_count: i64,
    pub lesson_count: i64,
}
