pub mod auth;
pub mod courses;
pub mod lessons;
pub mod products;
pub mod purchases;
pub mod sections;
