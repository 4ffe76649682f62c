use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{AuditAction, log_audit},
    cache::{self, EntityKind},
    dto::products::{
        CreateProductRequest, PRODUCT_STATUSES, PRODUCT_TAGS, ProductCourseSummary,
        ProductDetail, ProductList, UpdateProductRequest,
    },
    entity::{
        course_products::{
            ActiveModel as CourseProductActive, Column as CourseProductCol,
            Entity as CourseProducts,
        },
        course_sections::{Column as SectionCol, Entity as CourseSections},
        courses::{Column as CourseCol, Entity as Courses},
        lessons::{Column as LessonCol, Entity as Lessons},
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products, Model as ProductModel},
        purchases::{Column as PurchaseCol, Entity as Purchases},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    permissions::{Action, ensure_can},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

/// Public catalog: only `public` products, newest first. Cached per page
/// under the products global tag.
pub async fn list_public_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let cache_key = format!("products:public:p{page}:l{limit}");
    if let Some((items, total)) = state.cache.get::<(Vec<Product>, i64)>(&cache_key) {
        let meta = Meta::new(page, limit, total);
        return Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)));
    }

    let finder = Products::find()
        .filter(ProductCol::Status.eq("public"))
        .order_by_desc(ProductCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    state.cache.put(
        &cache_key,
        &(&items, total),
        &[cache::global_tag(EntityKind::Products)],
    );

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Admin listing across all statuses with search; not cached.
pub async fn list_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_can(user.role, Action::ManageProducts)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProductCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProductCol::Description).ilike(pattern)),
        );
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(ProductCol::Status.eq(status.clone()));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(ProductCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Product detail with bundled course summaries. Tagged with the bundled
/// course ids so content edits anywhere in a course recompute it.
pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let cache_key = format!("products:{id}:detail");
    if let Some(detail) = state.cache.get::<ProductDetail>(&cache_key) {
        return Ok(ApiResponse::success("Product", detail, None));
    }

    let product = Products::find_by_id(id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let course_ids: Vec<Uuid> = CourseProducts::find()
        .filter(CourseProductCol::ProductId.eq(id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|link| link.course_id)
        .collect();

    let mut courses = Vec::new();
    if !course_ids.is_empty() {
        let course_rows = Courses::find()
            .filter(CourseCol::Id.is_in(course_ids.clone()))
            .all(&state.orm)
            .await?;
        for course in course_rows {
            let section_ids: Vec<Uuid> = CourseSections::find()
                .filter(SectionCol::CourseId.eq(course.id))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();
            let section_count = section_ids.len() as i64;
            let lesson_count = if section_ids.is_empty() {
                0
            } else {
                Lessons::find()
                    .filter(LessonCol::SectionId.is_in(section_ids))
                    .count(&state.orm)
                    .await? as i64
            };
            courses.push(ProductCourseSummary {
                id: course.id,
                name: course.name,
                section_count,
                lesson_count,
            });
        }
    }

    let detail = ProductDetail {
        product: product_from_entity(product),
        courses,
    };

    let mut tags = vec![
        cache::global_tag(EntityKind::Products),
        cache::id_tag(EntityKind::Products, id),
    ];
    for course_id in &course_ids {
        tags.push(cache::id_tag(EntityKind::Courses, *course_id));
    }
    state.cache.put(&cache_key, &detail, &tags);

    Ok(ApiResponse::success("Product", detail, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let failed = || AppError::ActionFailed("There was an error creating your product".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageProducts).map_err(|_| failed())?;
    let status = validate_status(payload.status).map_err(|_| failed())?;
    validate_tags(&payload.tags).map_err(|_| failed())?;

    let txn = state.orm.begin().await?;

    if !payload.course_ids.is_empty() {
        let count = Courses::find()
            .filter(CourseCol::Id.is_in(payload.course_ids.clone()))
            .count(&txn)
            .await? as usize;
        if count != payload.course_ids.len() {
            return Err(failed());
        }
    }

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        image_url: Set(payload.image_url),
        price_in_dollars: Set(payload.price_in_dollars),
        status: Set(status),
        tags: Set(serde_json::json!(payload.tags)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for course_id in &payload.course_ids {
        CourseProductActive {
            course_id: Set(*course_id),
            product_id: Set(product.id),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    cache::invalidate_product(&state.cache, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductCreate,
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully created your product",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let failed = || AppError::ActionFailed("There was an error updating your product".into());
    payload.validate().map_err(|_| failed())?;
    ensure_can(user.role, Action::ManageProducts).map_err(|_| failed())?;

    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let txn = state.orm.begin().await?;

    let mut active: ProductActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(image_url);
    }
    if let Some(price) = payload.price_in_dollars {
        active.price_in_dollars = Set(price);
    }
    if let Some(status) = payload.status {
        active.status = Set(validate_status(Some(status)).map_err(|_| failed())?);
    }
    if let Some(tags) = payload.tags {
        validate_tags(&tags).map_err(|_| failed())?;
        active.tags = Set(serde_json::json!(tags));
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    if let Some(course_ids) = payload.course_ids {
        if !course_ids.is_empty() {
            let count = Courses::find()
                .filter(CourseCol::Id.is_in(course_ids.clone()))
                .count(&txn)
                .await? as usize;
            if count != course_ids.len() {
                return Err(failed());
            }
        }
        CourseProducts::delete_many()
            .filter(CourseProductCol::ProductId.eq(id))
            .exec(&txn)
            .await?;
        for course_id in &course_ids {
            CourseProductActive {
                course_id: Set(*course_id),
                product_id: Set(id),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    cache::invalidate_product(&state.cache, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductUpdate,
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully updated your product",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Products with recorded purchases cannot be deleted; purchases keep their
/// denormalized snapshot either way.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let failed = || AppError::ActionFailed("There was an error deleting your product".into());
    ensure_can(user.role, Action::ManageProducts).map_err(|_| failed())?;

    let purchase_count = Purchases::find()
        .filter(PurchaseCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if purchase_count > 0 {
        return Err(failed());
    }

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    cache::invalidate_product(&state.cache, id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductDelete,
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully deleted your product",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_status(status: Option<String>) -> Result<String, AppError> {
    let status = status.unwrap_or_else(|| "private".to_string());
    if PRODUCT_STATUSES.contains(&status.as_str()) {
        Ok(status)
    } else {
        Err(AppError::BadRequest("Invalid product status".into()))
    }
}

fn validate_tags(tags: &[String]) -> Result<(), AppError> {
    for tag in tags {
        if !PRODUCT_TAGS.contains(&tag.as_str()) {
            return Err(AppError::BadRequest("Invalid product tag".into()));
        }
    }
    Ok(())
}

pub fn product_from_entity(model: ProductModel) -> Product {
    let tags = serde_json::from_value(model.tags).unwrap_or_default();
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        image_url: model.image_url,
        price_in_dollars: model.price_in_dollars,
        status: model.status,
        tags,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
