pub mod admin_service;
pub mod auth_service;
pub mod course_service;
pub mod lesson_service;
pub mod product_service;
pub mod purchase_service;
pub mod section_service;
