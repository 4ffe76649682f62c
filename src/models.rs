use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::permissions::Role;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseSection {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub status: String,
    pub order: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Lesson {
    pub id: Uuid,
    pub section_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub order: i32,
    pub video_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SectionWithLessons {
    #[serde(flatten)]
    pub section: CourseSection,
    pub lessons: Vec<Lesson>,
}

/// Course with its sections and lessons in sibling order. The shape cached
/// reads store for course detail pages.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub sections: Vec<SectionWithLessons>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub price_in_dollars: i32,
    pub status: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized product snapshot stored on a purchase at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSnapshot {
    pub name: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub price_paid_in_cents: i32,
    pub product_details: ProductSnapshot,
    pub payment_session_id: String,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsSummary {
    pub net_sales_in_cents: i64,
    pub total_purchases: i64,
    pub refunded_purchases: i64,
    pub customer_count: i64,
    pub course_count: i64,
    pub product_count: i64,
    pub average_net_sales_per_customer_in_cents: i64,
}
