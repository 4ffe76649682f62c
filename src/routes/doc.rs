use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
        courses::{CourseList, CreateCourseRequest, UpdateCourseRequest},
        lessons::{CreateLessonRequest, UpdateLessonRequest},
        products::{
            CreateProductRequest, ProductCourseSummary, ProductDetail, ProductList,
            UpdateProductRequest,
        },
        purchases::{CheckoutResponse, ConfirmPurchaseRequest, PurchaseList},
        sections::{CreateSectionRequest, ReorderRequest, UpdateSectionRequest},
    },
    models::{
        Course, CourseDetail, CourseSection, Lesson, Product, ProductSnapshot, Purchase,
        SectionWithLessons, StatsSummary, User,
    },
    permissions::Role,
    response::{ApiResponse, Meta},
    routes::{admin, auth, courses, health, lessons, params, products, purchases, sections},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        courses::list_courses,
        courses::get_course,
        courses::create_course,
        courses::update_course,
        courses::delete_course,
        courses::create_section,
        courses::reorder_sections,
        sections::update_section,
        sections::delete_section,
        sections::create_lesson,
        sections::reorder_lessons,
        lessons::update_lesson,
        lessons::delete_lesson,
        products::list_public_products,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::checkout,
        purchases::list_my_purchases,
        purchases::confirm_purchase,
        admin::list_all_purchases,
        admin::refund_purchase,
        admin::get_stats,
    ),
    components(
        schemas(
            User,
            Role,
            Course,
            CourseSection,
            Lesson,
            SectionWithLessons,
            CourseDetail,
            Product,
            ProductSnapshot,
            Purchase,
            StatsSummary,
            Claims,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateCourseRequest,
            UpdateCourseRequest,
            CourseList,
            CreateSectionRequest,
            UpdateSectionRequest,
            ReorderRequest,
            CreateLessonRequest,
            UpdateLessonRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            ProductDetail,
            ProductCourseSummary,
            CheckoutResponse,
            ConfirmPurchaseRequest,
            PurchaseList,
            params::Pagination,
            params::CourseQuery,
            params::ProductQuery,
            params::PurchaseListQuery,
            Meta,
            ApiResponse<CourseDetail>,
            ApiResponse<ProductList>,
            ApiResponse<PurchaseList>,
            ApiResponse<StatsSummary>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Courses", description = "Course management"),
        (name = "Sections", description = "Course section management and ordering"),
        (name = "Lessons", description = "Lesson management and ordering"),
        (name = "Products", description = "Product catalog and management"),
        (name = "Purchases", description = "Checkout and purchase history"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
