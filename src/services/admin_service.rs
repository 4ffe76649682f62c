use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};

use crate::{
    cache::{self, EntityKind},
    entity::{
        courses::Entity as Courses,
        products::Entity as Products,
        purchases::{Column as PurchaseCol, Entity as Purchases},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::StatsSummary,
    permissions::{Action, ensure_can},
    response::ApiResponse,
    state::AppState,
};

/// Sales dashboard aggregates. Cached until any purchase, product or course
/// mutation invalidates the corresponding global tag.
pub async fn get_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<StatsSummary>> {
    ensure_can(user.role, Action::ViewStats)?;

    let cache_key = "admin:stats";
    if let Some(stats) = state.cache.get::<StatsSummary>(cache_key) {
        return Ok(ApiResponse::success("Stats", stats, None));
    }

    let net_sales: Option<Option<i64>> = Purchases::find()
        .select_only()
        .column_as(Expr::col(PurchaseCol::PricePaidInCents).sum(), "total")
        .filter(PurchaseCol::RefundedAt.is_null())
        .into_tuple()
        .one(&state.orm)
        .await?;
    let net_sales_in_cents = net_sales.flatten().unwrap_or(0);

    let total_purchases = Purchases::find().count(&state.orm).await? as i64;
    let refunded_purchases = Purchases::find()
        .filter(PurchaseCol::RefundedAt.is_not_null())
        .count(&state.orm)
        .await? as i64;

    let customers: Option<Option<i64>> = Purchases::find()
        .select_only()
        .column_as(Expr::col(PurchaseCol::UserId).count_distinct(), "customers")
        .into_tuple()
        .one(&state.orm)
        .await?;
    let customer_count = customers.flatten().unwrap_or(0);

    let course_count = Courses::find().count(&state.orm).await? as i64;
    let product_count = Products::find().count(&state.orm).await? as i64;

    let average_net_sales_per_customer_in_cents = if customer_count > 0 {
        net_sales_in_cents / customer_count
    } else {
        0
    };

    let stats = StatsSummary {
        net_sales_in_cents,
        total_purchases,
        refunded_purchases,
        customer_count,
        course_count,
        product_count,
        average_net_sales_per_customer_in_cents,
    };

    state.cache.put(
        cache_key,
        &stats,
        &[
            cache::global_tag(EntityKind::Purchases),
            cache::global_tag(EntityKind::Products),
            cache::global_tag(EntityKind::Courses),
        ],
    );

    Ok(ApiResponse::success("Stats", stats, None))
}
