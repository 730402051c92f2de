use std::collections::HashMap;

use chrono::Utc;
use rand::Rng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderItemView, OrderList, OrderLineRequest, OrderResponse, PlaceOrderRequest},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    middleware::policy::{Action, Resource, authorize},
    models::{Order, OrderStatus},
    notifier::{OrderMailContext, OrderMailItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

const ORDER_TOKEN_LEN: usize = 8;
const ORDER_TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_TOKEN_ATTEMPTS: usize = 5;

struct ResolvedLine {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    product_name: String,
    variant_name: Option<String>,
    quantity: i32,
    price: i64,
}

/// Validate, persist and price a submitted order in one transaction, then
/// hand the committed order to the notifier. Any validation failure rolls
/// the whole submission back; no stock is decremented on a rejected order.
pub async fn place_order(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::BadRequest("A contact email is required".into()));
    }
    if payload.shipping_address.trim().is_empty() {
        return Err(AppError::BadRequest("A shipping address is required".into()));
    }

    let txn = state.orm.begin().await?;

    // Lock and validate every line before any stock is touched.
    let lines = resolve_lines(&txn, &payload.items).await?;

    let customer_name = match user {
        Some(auth) => Users::find_by_id(auth.user_id)
            .one(&txn)
            .await?
            .map(|u| u.email)
            .unwrap_or_else(|| "Guest".to_string()),
        None => "Guest".to_string(),
    };

    let unique_order_id = reserve_order_token(&txn).await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        unique_order_id: Set(unique_order_id),
        user_id: Set(user.map(|u| u.user_id)),
        email: Set(payload.email),
        phone: Set(payload.phone),
        shipping_address: Set(payload.shipping_address),
        payment_method: Set(payload.payment_method),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        total_price: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut total_price: i64 = 0;
    let mut item_views: Vec<OrderItemView> = Vec::new();

    for line in &lines {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            variant_id: Set(line.variant_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        // reduce stock on the locked row
        match line.variant_id {
            Some(variant_id) => {
                ProductVariants::update_many()
                    .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).sub(line.quantity))
                    .filter(VariantCol::Id.eq(variant_id))
                    .exec(&txn)
                    .await?;
            }
            None => {
                Products::update_many()
                    .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
                    .filter(ProdCol::Id.eq(line.product_id))
                    .exec(&txn)
                    .await?;
            }
        }

        total_price += line.price * i64::from(line.quantity);
        item_views.push(OrderItemView {
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            variant_name: line.variant_name.clone(),
            quantity: line.quantity,
            price: line.price,
        });
    }

    let mut active: OrderActive = order.into();
    active.total_price = Set(total_price);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    let order = order_from_entity(order)?;
    let mail_ctx = build_mail_context(&order, customer_name, &item_views);
    state.notifier.order_placed(&mail_ctx).await;

    let response = order_response(order, item_views);
    Ok(ApiResponse::success(
        "Order placed",
        response,
        Some(Meta::empty()),
    ))
}

async fn resolve_lines<C: ConnectionTrait>(
    txn: &C,
    items: &[OrderLineRequest],
) -> AppResult<Vec<ResolvedLine>> {
    let mut lines = Vec::with_capacity(items.len());
    // Remaining stock per locked row, so repeated references to the same
    // variant cannot pass validation individually yet oversell in aggregate.
    let mut remaining: HashMap<Uuid, i32> = HashMap::new();

    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest("Quantity must be positive".into()));
        }

        let line = match (item.variant_id, item.product_id) {
            (Some(variant_id), _) => {
                let variant = ProductVariants::find_by_id(variant_id)
                    .lock(LockType::Update)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("Unknown product variant {variant_id}"))
                    })?;
                let product = Products::find_by_id(variant.product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("Unknown product for variant {variant_id}"))
                    })?;

                let left = remaining.entry(variant.id).or_insert(variant.stock);
                if *left < item.quantity {
                    return Err(AppError::BadRequest(format!(
                        "Not enough stock for {} - {}. Available: {}, Requested: {}",
                        product.name, variant.name, *left, item.quantity
                    )));
                }
                *left -= item.quantity;

                ResolvedLine {
                    product_id: product.id,
                    variant_id: Some(variant.id),
                    product_name: product.name,
                    variant_name: Some(variant.name),
                    quantity: item.quantity,
                    price: variant.price,
                }
            }
            (None, Some(product_id)) => {
                let product = Products::find_by_id(product_id)
                    .lock(LockType::Update)
                    .one(txn)
                    .await?
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown product {product_id}")))?;

                let has_variants = ProductVariants::find()
                    .filter(VariantCol::ProductId.eq(product.id))
                    .count(txn)
                    .await?
                    > 0;
                if has_variants {
                    return Err(AppError::BadRequest(format!(
                        "{} requires a variant selection",
                        product.name
                    )));
                }
                let stock = product.stock.ok_or_else(|| {
                    AppError::BadRequest(format!("{} is not available for sale", product.name))
                })?;

                let left = remaining.entry(product.id).or_insert(stock);
                if *left < item.quantity {
                    return Err(AppError::BadRequest(format!(
                        "Not enough stock for {}. Available: {}, Requested: {}",
                        product.name, *left, item.quantity
                    )));
                }
                *left -= item.quantity;

                ResolvedLine {
                    product_id: product.id,
                    variant_id: None,
                    product_name: product.name,
                    variant_name: None,
                    quantity: item.quantity,
                    price: product.base_price,
                }
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "Each line needs a product_id or variant_id".into(),
                ));
            }
        };

        lines.push(line);
    }

    Ok(lines)
}

pub fn new_order_token() -> String {
    let mut rng = rand::rng();
    let token: String = (0..ORDER_TOKEN_LEN)
        .map(|_| ORDER_TOKEN_ALPHABET[rng.random_range(0..ORDER_TOKEN_ALPHABET.len())] as char)
        .collect();
    format!("ORD-{token}")
}

/// Draw an unused external order id, re-drawing on collision. The token space
/// makes exhaustion unreachable in practice.
async fn reserve_order_token<C: ConnectionTrait>(txn: &C) -> AppResult<String> {
    for _ in 0..ORDER_TOKEN_ATTEMPTS {
        let token = new_order_token();
        let taken = Orders::find()
            .filter(OrderCol::UniqueOrderId.eq(token.as_str()))
            .count(txn)
            .await?
            > 0;
        if !taken {
            return Ok(token);
        }
    }
    Err(AppError::Integrity(
        "could not allocate a unique order id".into(),
    ))
}

pub async fn get_order_by_public_id(
    state: &AppState,
    unique_order_id: &str,
) -> AppResult<ApiResponse<OrderResponse>> {
    let order = Orders::find()
        .filter(OrderCol::UniqueOrderId.eq(unique_order_id))
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => order_from_entity(o)?,
        None => return Err(AppError::NotFound),
    };

    let items = load_item_views(state, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        order_response(order, items),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    authorize(Some(user), Resource::Orders, Action::List)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown order status {status}")))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

async fn load_item_views(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderItemView>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?;

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let product_names: HashMap<Uuid, String> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();
    let variant_names: HashMap<Uuid, String> = if variant_ids.is_empty() {
        HashMap::new()
    } else {
        ProductVariants::find()
            .filter(VariantCol::Id.is_in(variant_ids))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|v| (v.id, v.name))
            .collect()
    };

    Ok(items
        .into_iter()
        .map(|item| OrderItemView {
            product_id: item.product_id,
            variant_id: item.variant_id,
            product_name: product_names
                .get(&item.product_id)
                .cloned()
                .unwrap_or_default(),
            variant_name: item
                .variant_id
                .and_then(|id| variant_names.get(&id).cloned()),
            quantity: item.quantity,
            price: item.price,
        })
        .collect())
}

fn build_mail_context(
    order: &Order,
    customer_name: String,
    items: &[OrderItemView],
) -> OrderMailContext {
    OrderMailContext {
        unique_order_id: order.unique_order_id.clone(),
        placed_at: order.created_at,
        customer_name,
        email: order.email.clone(),
        phone: order.phone.clone(),
        shipping_address: order.shipping_address.clone(),
        payment_method: order.payment_method.clone(),
        total_price: order.total_price,
        items: items
            .iter()
            .map(|item| OrderMailItem {
                name: item.product_name.clone(),
                variant_name: item.variant_name.clone(),
                quantity: item.quantity,
                unit_price: item.price,
                line_total: item.price * i64::from(item.quantity),
            })
            .collect(),
    }
}

pub fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = OrderStatus::parse(&model.status).ok_or_else(|| {
        AppError::Integrity(format!("unknown order status {:?} in store", model.status))
    })?;
    Ok(Order {
        id: model.id,
        unique_order_id: model.unique_order_id,
        user_id: model.user_id,
        email: model.email,
        phone: model.phone,
        shipping_address: model.shipping_address,
        payment_method: model.payment_method,
        status,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_response(order: Order, items: Vec<OrderItemView>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        unique_order_id: order.unique_order_id,
        user_id: order.user_id,
        email: order.email,
        phone: order.phone,
        shipping_address: order.shipping_address,
        payment_method: order.payment_method,
        status: order.status,
        total_price: order.total_price,
        created_at: order.created_at,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_tokens_match_the_external_pattern() {
        for _ in 0..100 {
            let token = new_order_token();
            let suffix = token.strip_prefix("ORD-").expect("ORD- prefix");
            assert_eq!(suffix.len(), 8);
            assert!(
                suffix
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
                "unexpected character in {token}"
            );
        }
    }
}
