use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{AuditAction, log_audit},
    cache::{self, EntityKind},
    dto::purchases::{CheckoutResponse, ConfirmPurchaseRequest, PurchaseList},
    entity::{
        course_products::{Column as CourseProductCol, Entity as CourseProducts},
        products::Entity as Products,
        purchases::{
            ActiveModel as PurchaseActive, Column as PurchaseCol, Entity as Purchases,
            Model as PurchaseModel,
        },
        user_course_accesses::{
            ActiveModel as AccessActive, Column as AccessCol, Entity as UserCourseAccesses,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ProductSnapshot, Purchase},
    payments::CheckoutSessionRequest,
    permissions::{Action, ensure_can},
    response::{ApiResponse, Meta},
    routes::params::PurchaseListQuery,
    state::AppState,
};

/// Open a gateway checkout session for a public product the user does not
/// already own.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    ensure_can(user.role, Action::Checkout)?;

    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    let product = match product {
        Some(p) if p.status == "public" => p,
        Some(_) => return Err(AppError::NotFound),
        None => return Err(AppError::NotFound),
    };

    let owned = Purchases::find()
        .filter(
            Condition::all()
                .add(PurchaseCol::UserId.eq(user.user_id))
                .add(PurchaseCol::ProductId.eq(product_id))
                .add(PurchaseCol::RefundedAt.is_null()),
        )
        .one(&state.orm)
        .await?;
    if owned.is_some() {
        return Err(AppError::BadRequest("Product already purchased".into()));
    }

    let session = state
        .payments
        .create_checkout_session(CheckoutSessionRequest {
            user_id: user.user_id,
            product_id,
            product_name: product.name.clone(),
            amount_in_cents: (product.price_in_dollars as i64) * 100,
        })
        .await?;

    Ok(ApiResponse::success(
        "Checkout session created",
        CheckoutResponse {
            session_id: session.id,
            checkout_url: session.url,
        },
        Some(Meta::empty()),
    ))
}

/// Record a paid checkout session as a purchase: snapshot the product,
/// grant access to every bundled course, all in one transaction. Idempotent
/// by session id.
pub async fn confirm_purchase(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPurchaseRequest,
) -> AppResult<ApiResponse<Purchase>> {
    let failed = || AppError::ActionFailed("There was an error recording your purchase".into());
    payload.validate().map_err(|_| failed())?;

    let existing = Purchases::find()
        .filter(PurchaseCol::PaymentSessionId.eq(payload.session_id.as_str()))
        .one(&state.orm)
        .await?;
    if let Some(purchase) = existing {
        return Ok(ApiResponse::success(
            "Purchase already recorded",
            purchase_from_entity(purchase)?,
            Some(Meta::empty()),
        ));
    }

    let session = state.payments.retrieve_session(&payload.session_id).await?;
    if !session.is_paid() {
        return Err(failed());
    }
    let product_id = session.product_id.ok_or_else(failed)?;
    match session.user_id {
        Some(session_user) if session_user == user.user_id => {}
        _ => return Err(failed()),
    }

    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(failed()),
    };

    let snapshot = ProductSnapshot {
        name: product.name.clone(),
        description: product.description.clone(),
        image_url: product.image_url.clone(),
    };

    let txn = state.orm.begin().await?;

    let purchase = PurchaseActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(product_id),
        price_paid_in_cents: Set(session.amount_total_in_cents as i32),
        product_details: Set(serde_json::to_value(&snapshot)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?),
        payment_session_id: Set(payload.session_id.clone()),
        refunded_at: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let course_ids: Vec<Uuid> = CourseProducts::find()
        .filter(CourseProductCol::ProductId.eq(product_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|link| link.course_id)
        .collect();

    for course_id in &course_ids {
        let already = UserCourseAccesses::find()
            .filter(
                Condition::all()
                    .add(AccessCol::UserId.eq(user.user_id))
                    .add(AccessCol::CourseId.eq(*course_id)),
            )
            .one(&txn)
            .await?;
        if already.is_none() {
            AccessActive {
                user_id: Set(user.user_id),
                course_id: Set(*course_id),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    cache::invalidate_purchase(&state.cache, purchase.id, user.user_id, product_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::PurchaseRecorded,
        Some(serde_json::json!({ "purchase_id": purchase.id, "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully recorded your purchase",
        purchase_from_entity(purchase)?,
        Some(Meta::empty()),
    ))
}

/// Own purchase history, newest first. Cached under the user-scoped tag.
pub async fn list_my_purchases(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PurchaseList>> {
    ensure_can(user.role, Action::ViewOwnPurchases)?;

    let cache_key = format!("purchases:user:{}", user.user_id);
    if let Some(items) = state.cache.get::<Vec<Purchase>>(&cache_key) {
        return Ok(ApiResponse::success(
            "Purchases",
            PurchaseList { items },
            None,
        ));
    }

    let items: Vec<Purchase> = Purchases::find()
        .filter(PurchaseCol::UserId.eq(user.user_id))
        .order_by_desc(PurchaseCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(purchase_from_entity)
        .collect::<AppResult<_>>()?;

    state.cache.put(
        &cache_key,
        &items,
        &[
            cache::global_tag(EntityKind::Purchases),
            cache::user_tag(EntityKind::Purchases, user.user_id),
        ],
    );

    Ok(ApiResponse::success(
        "Purchases",
        PurchaseList { items },
        None,
    ))
}

pub async fn list_all_purchases(
    state: &AppState,
    user: &AuthUser,
    query: PurchaseListQuery,
) -> AppResult<ApiResponse<PurchaseList>> {
    ensure_can(user.role, Action::ViewAllPurchases)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(refunded) = query.refunded {
        condition = condition.add(if refunded {
            PurchaseCol::RefundedAt.is_not_null()
        } else {
            PurchaseCol::RefundedAt.is_null()
        });
    }

    let finder = Purchases::find()
        .filter(condition)
        .order_by_desc(PurchaseCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items: Vec<Purchase> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(purchase_from_entity)
        .collect::<AppResult<_>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Purchases",
        PurchaseList { items },
        Some(meta),
    ))
}

/// Mark refunded, issue the gateway refund and revoke course access inside
/// one transaction. A gateway failure aborts the transaction, so
/// `refunded_at` stays null.
pub async fn refund_purchase(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Purchase>> {
    let failed = || AppError::ActionFailed("There was an error refunding this purchase".into());
    ensure_can(user.role, Action::RefundPurchases).map_err(|_| failed())?;

    let txn = state.orm.begin().await?;

    let purchase = Purchases::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let purchase = match purchase {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    if purchase.refunded_at.is_some() {
        return Err(failed());
    }
    let (purchase_user_id, product_id) = (purchase.user_id, purchase.product_id);
    let session_id = purchase.payment_session_id.clone();

    let mut active: PurchaseActive = purchase.into();
    active.refunded_at = Set(Some(Utc::now().into()));
    let refunded = active.update(&txn).await?;

    let session = state.payments.retrieve_session(&session_id).await?;
    let payment_intent_id = match session.payment_intent_id {
        Some(pi) => pi,
        None => return Err(failed()),
    };
    state.payments.create_refund(&payment_intent_id).await?;

    let course_ids: Vec<Uuid> = CourseProducts::find()
        .filter(CourseProductCol::ProductId.eq(product_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|link| link.course_id)
        .collect();
    if !course_ids.is_empty() {
        UserCourseAccesses::delete_many()
            .filter(
                Condition::all()
                    .add(AccessCol::UserId.eq(purchase_user_id))
                    .add(AccessCol::CourseId.is_in(course_ids)),
            )
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    cache::invalidate_purchase(&state.cache, refunded.id, purchase_user_id, product_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::PurchaseRefund,
        Some(serde_json::json!({ "purchase_id": refunded.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Successfully refunded purchase",
        purchase_from_entity(refunded)?,
        Some(Meta::empty()),
    ))
}

pub fn purchase_from_entity(model: PurchaseModel) -> AppResult<Purchase> {
    let product_details: ProductSnapshot = serde_json::from_value(model.product_details)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(Purchase {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        price_paid_in_cents: model.price_paid_in_cents,
        product_details,
        payment_session_id: model.payment_session_id,
        refunded_at: model.refunded_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    })
}
