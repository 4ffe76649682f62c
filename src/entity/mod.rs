pub mod audit_logs;
pub mod course_products;
pub mod course_sections;
pub mod courses;
pub mod lessons;
pub mod products;
pub mod purchases;
pub mod user_course_accesses;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use course_products::Entity as CourseProducts;
pub use course_sections::Entity as CourseSections;
pub use courses::Entity as Courses;
pub use lessons::Entity as Lessons;
pub use products::Entity as Products;
pub use purchases::Entity as Purchases;
pub use user_course_accesses::Entity as UserCourseAccesses;
pub use users::Entity as Users;
