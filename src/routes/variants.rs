use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, put},
};
use uuid::Uuid;

use crate::{
    dto::variants::{UpdateVariantRequest, VariantList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ProductVariant,
    response::ApiResponse,
    routes::params::VariantQuery,
    services::variant_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_variants))
        .route("/{id}", get(get_variant))
        .route("/{id}", put(update_variant))
        .route("/{id}", delete(delete_variant))
}

#[utoipa::path(
    get,
    path = "/api/variants",
    params(("product_id" = Option<Uuid>, Query, description = "Filter by product")),
    responses(
        (status = 200, description = "List variants", body = ApiResponse<VariantList>)
    ),
    tag = "Variants"
)]
pub async fn list_variants(
    State(state): State<AppState>,
    Query(query): Query<VariantQuery>,
) -> AppResult<Json<ApiResponse<VariantList>>> {
    let resp = variant_service::list_variants(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant ID")),
    responses(
        (status = 200, description = "Get variant", body = ApiResponse<ProductVariant>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Variants"
)]
pub async fn get_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductVariant>>> {
    let resp = variant_service::get_variant(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant ID")),
    request_body = UpdateVariantRequest,
    responses(
        (status = 200, description = "Updated variant", body = ApiResponse<ProductVariant>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Variants"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVariantRequest>,
) -> AppResult<Json<ApiResponse<ProductVariant>>> {
    let resp = variant_service::update_variant(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant ID")),
    responses(
        (status = 200, description = "Deleted variant"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Variants"
)]
pub async fn delete_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = variant_service::delete_variant(&state, &user, id).await?;
    Ok(Json(resp))
}
