use std::sync::Arc;

use course_platform_api::{
    cache::TagCache,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        courses::CreateCourseRequest,
        lessons::CreateLessonRequest,
        products::CreateProductRequest,
        purchases::ConfirmPurchaseRequest,
        sections::CreateSectionRequest,
    },
    entity::{
        purchases::Entity as Purchases,
        user_course_accesses::{Column as AccessCol, Entity as UserCourseAccesses},
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    payments::{MockGateway, PaymentGateway},
    permissions::Role,
    routes::params::{Pagination, PurchaseListQuery},
    services::{course_service, lesson_service, product_service, purchase_service, section_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use uuid::Uuid;

// Integration flow: user checks out a product, confirms the paid session,
// gains course access; admin refunds and access is revoked atomically.
#[tokio::test]
async fn checkout_confirm_and_refund_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let (state, gateway) = setup_state(&database_url).await?;

    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin = AuthUser {
        user_id: admin_id,
        role: Role::Admin,
    };
    let buyer = AuthUser {
        user_id,
        role: Role::User,
    };

    let course = course_service::create_course(
        &state,
        &admin,
        CreateCourseRequest {
            name: "Async Rust".into(),
            description: "Futures and executors".into(),
        },
    )
    .await?
    .data
    .expect("course");

    let section = section_service::create_section(
        &state,
        &admin,
        course.id,
        CreateSectionRequest {
            name: "Getting Started".into(),
            status: Some("public".into()),
        },
    )
    .await?
    .data
    .expect("section");
    let lesson = lesson_service::create_lesson(
        &state,
        &admin,
        section.id,
        CreateLessonRequest {
            name: "Core Concepts".into(),
            description: None,
            status: Some("public".into()),
            video_url: Some("https://videos.example/core-concepts".into()),
        },
    )
    .await?
    .data
    .expect("lesson");

    let product = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Async Rust Bundle".into(),
            description: "Full course access".into(),
            image_url: "https://images.example/bundle.png".into(),
            price_in_dollars: 49,
            status: Some("public".into()),
            tags: vec!["new".into()],
            course_ids: vec![course.id],
        },
    )
    .await?
    .data
    .expect("product");

    // A course bundled into a product cannot be deleted.
    let err = course_service::delete_course(&state, &admin, course.id)
        .await
        .expect_err("bundled course must not be deletable");
    assert!(matches!(err, AppError::ActionFailed(_)));

    // Before buying, the course's public lessons are out of reach.
    let before = course_service::get_course(&state, &buyer, course.id)
        .await?
        .data
        .expect("detail");
    assert!(
        !before
            .sections
            .iter()
            .flat_map(|s| &s.lessons)
            .any(|l| l.id == lesson.id),
        "public lessons require course access"
    );

    // Checkout opens a gateway session priced in cents.
    let checkout = purchase_service::checkout(&state, &buyer, product.id)
        .await?
        .data
        .expect("checkout");
    let session = gateway.retrieve_session(&checkout.session_id).await?;
    assert_eq!(session.amount_total_in_cents, 4900);

    // Confirming the paid session records the purchase and grants access.
    let purchase = purchase_service::confirm_purchase(
        &state,
        &buyer,
        ConfirmPurchaseRequest {
            session_id: checkout.session_id.clone(),
        },
    )
    .await?
    .data
    .expect("purchase");
    assert_eq!(purchase.price_paid_in_cents, 4900);
    assert_eq!(purchase.product_details.name, "Async Rust Bundle");
    assert!(purchase.refunded_at.is_none());

    let access = UserCourseAccesses::find()
        .filter(AccessCol::UserId.eq(user_id))
        .filter(AccessCol::CourseId.eq(course.id))
        .one(&state.orm)
        .await?;
    assert!(access.is_some(), "confirm must grant course access");

    let owned = course_service::get_course(&state, &buyer, course.id)
        .await?
        .data
        .expect("detail");
    assert!(
        owned
            .sections
            .iter()
            .flat_map(|s| &s.lessons)
            .any(|l| l.id == lesson.id),
        "purchase must unlock the course's public lessons"
    );

    // Confirming the same session again returns the original purchase.
    let again = purchase_service::confirm_purchase(
        &state,
        &buyer,
        ConfirmPurchaseRequest {
            session_id: checkout.session_id.clone(),
        },
    )
    .await?
    .data
    .expect("purchase");
    assert_eq!(again.id, purchase.id);
    let count = Purchases::find().all(&state.orm).await?.len();
    assert_eq!(count, 1, "confirm is idempotent per session");

    // The buyer already owns the product, so a second checkout is refused.
    let err = purchase_service::checkout(&state, &buyer, product.id)
        .await
        .expect_err("owned product cannot be bought again");
    assert!(matches!(err, AppError::BadRequest(_)));

    let history = purchase_service::list_my_purchases(&state, &buyer)
        .await?
        .data
        .expect("history");
    assert_eq!(history.items.len(), 1);

    // A failing gateway aborts the refund; nothing is persisted.
    gateway.set_fail_refunds(true);
    let err = purchase_service::refund_purchase(&state, &admin, purchase.id)
        .await
        .expect_err("gateway failure must abort the refund");
    assert!(matches!(err, AppError::Payment(_)));

    let reloaded = Purchases::find_by_id(purchase.id)
        .one(&state.orm)
        .await?
        .expect("purchase row");
    assert!(
        reloaded.refunded_at.is_none(),
        "refunded_at must stay null when the gateway refund fails"
    );
    let access = UserCourseAccesses::find()
        .filter(AccessCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?;
    assert!(access.is_some(), "access must survive an aborted refund");

    // With the gateway healthy again the refund lands in one transaction.
    gateway.set_fail_refunds(false);
    let refunded = purchase_service::refund_purchase(&state, &admin, purchase.id)
        .await?
        .data
        .expect("refunded purchase");
    assert!(refunded.refunded_at.is_some());
    assert_eq!(gateway.refunded_payment_intents().len(), 1);

    let access = UserCourseAccesses::find()
        .filter(AccessCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?;
    assert!(access.is_none(), "refund must revoke course access");

    let revoked = course_service::get_course(&state, &buyer, course.id)
        .await?
        .data
        .expect("detail");
    assert!(
        !revoked
            .sections
            .iter()
            .flat_map(|s| &s.lessons)
            .any(|l| l.id == lesson.id),
        "refund must re-lock the course's public lessons"
    );

    // Refunding twice is refused.
    let err = purchase_service::refund_purchase(&state, &admin, purchase.id)
        .await
        .expect_err("purchase can be refunded at most once");
    assert!(matches!(err, AppError::ActionFailed(_)));

    // The buyer cannot refund or see the global ledger.
    let err = purchase_service::refund_purchase(&state, &buyer, purchase.id)
        .await
        .expect_err("buyers cannot refund");
    assert!(matches!(err, AppError::ActionFailed(_)));

    let ledger = purchase_service::list_all_purchases(
        &state,
        &admin,
        PurchaseListQuery {
            pagination: Pagination {
                page: Some(1),
                per_page: Some(20),
            },
            refunded: Some(true),
        },
    )
    .await?
    .data
    .expect("ledger");
    assert_eq!(ledger.items.len(), 1);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<(AppState, Arc<MockGateway>)> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE audit_logs, user_course_accesses, purchases, course_products, products, lessons, course_sections, courses, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let gateway = Arc::new(MockGateway::new());
    let state = AppState {
        pool,
        orm,
        cache: Arc::new(TagCache::new()),
        payments: gateway.clone(),
    };

    Ok((state, gateway))
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
