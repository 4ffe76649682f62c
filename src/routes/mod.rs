use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod courses;
pub mod doc;
pub mod health;
pub mod lessons;
pub mod params;
pub mod products;
pub mod purchases;
pub mod sections;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/courses", courses::router())
        .nest("/sections", sections::router())
        .nest("/lessons", lessons::router())
        .nest("/products", products::router())
        .nest("/purchases", purchases::router())
        .nest("/admin", admin::router())
}
