use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

pub const LESSON_STATUSES: [&str; 3] = ["public", "private", "preview"];

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
}
