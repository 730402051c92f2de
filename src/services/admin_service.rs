use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    middleware::policy::{Action, Resource, authorize},
    models::{Order, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::LowStockQuery,
    services::order_service::order_from_entity,
    state::AppState,
};

#[derive(Debug, Serialize, FromQueryResult, ToSchema)]
pub struct LowStockRow {
    pub variant_id: Uuid,
    pub variant_name: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub stock: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockList {
    pub items: Vec<LowStockRow>,
}

/// Explicit admin status transition, validated against the lifecycle
/// relation on [`OrderStatus`].
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    next: OrderStatus,
) -> AppResult<ApiResponse<Order>> {
    authorize(Some(user), Resource::Orders, Action::UpdateStatus)?;

    let txn = state.orm.begin().await?;

    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&existing.status).ok_or_else(|| {
        AppError::Integrity(format!("unknown order status {:?} in store", existing.status))
    })?;
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {current} to {next}"
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, status = %order.status, "order status updated");

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    authorize(Some(user), Resource::Inventory, Action::List)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination.normalize();

    let finder = ProductVariants::find()
        .filter(VariantCol::Stock.lte(threshold))
        .join(JoinType::InnerJoin, crate::entity::product_variants::Relation::Products.def())
        .select_only()
        .column_as(VariantCol::Id, "variant_id")
        .column_as(VariantCol::Name, "variant_name")
        .column_as(ProdCol::Id, "product_id")
        .column_as(ProdCol::Name, "product_name")
        .column_as(VariantCol::Stock, "stock")
        .order_by_asc(VariantCol::Stock);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .into_model::<LowStockRow>()
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        LowStockList { items },
        Some(meta),
    ))
}
