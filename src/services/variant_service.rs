use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    dto::variants::{CreateVariantRequest, UpdateVariantRequest, VariantList},
    entity::{
        product_variants::{
            ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
        },
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    middleware::policy::{Action, Resource, authorize},
    models::ProductVariant,
    response::{ApiResponse, Meta},
    routes::params::VariantQuery,
    services::product_service::variant_from_entity,
    state::AppState,
};

pub async fn list_variants(
    state: &AppState,
    query: VariantQuery,
) -> AppResult<ApiResponse<VariantList>> {
    let mut condition = Condition::all();
    if let Some(product_id) = query.product_id {
        condition = condition.add(VariantCol::ProductId.eq(product_id));
    }

    let items = ProductVariants::find()
        .filter(condition)
        .order_by_asc(VariantCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(variant_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Variants",
        VariantList { items },
        Some(Meta::empty()),
    ))
}

pub async fn get_variant(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductVariant>> {
    let variant = ProductVariants::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(variant_from_entity);
    match variant {
        Some(v) => Ok(ApiResponse::success("Variant", v, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_variant(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateVariantRequest,
) -> AppResult<ApiResponse<ProductVariant>> {
    authorize(Some(user), Resource::Variants, Action::Create)?;

    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    if product.is_none() {
        return Err(AppError::BadRequest(format!("Unknown product {product_id}")));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }

    let variant = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        name: Set(payload.name),
        price: Set(payload.price),
        stock: Set(payload.stock),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Variant created",
        variant_from_entity(variant),
        Some(Meta::empty()),
    ))
}

pub async fn update_variant(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateVariantRequest,
) -> AppResult<ApiResponse<ProductVariant>> {
    authorize(Some(user), Resource::Variants, Action::Update)?;
    let existing = ProductVariants::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(v) => v,
        None => return Err(AppError::NotFound),
    };

    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".into()));
        }
    }

    let mut active: VariantActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    let variant = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        variant_from_entity(variant),
        Some(Meta::empty()),
    ))
}

pub async fn delete_variant(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    authorize(Some(user), Resource::Variants, Action::Delete)?;
    let result = ProductVariants::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
