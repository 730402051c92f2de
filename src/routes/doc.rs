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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        orders::{OrderItemView, OrderList, OrderLineRequest, OrderResponse, PlaceOrderRequest},
        prescriptions::PrescriptionRequest,
        products::{CreateProductRequest, ProductDetail, ProductList, UpdateProductRequest},
        variants::{CreateVariantRequest, UpdateVariantRequest, VariantList},
    },
    models::{Category, Order, OrderItem, OrderStatus, Product, ProductVariant, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, categories, health, orders, params, prescriptions, products, variants},
    services::admin_service::{LowStockList, LowStockRow},
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
        auth::login,
        auth::register,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_product_variants,
        products::create_product_variant,
        variants::list_variants,
        variants::get_variant,
        variants::update_variant,
        variants::delete_variant,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        admin::update_order_status,
        admin::list_low_stock,
        prescriptions::submit_prescription_request,
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            ProductVariant,
            Order,
            OrderItem,
            OrderStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductDetail,
            ProductList,
            CreateVariantRequest,
            UpdateVariantRequest,
            VariantList,
            PlaceOrderRequest,
            OrderLineRequest,
            OrderItemView,
            OrderResponse,
            OrderList,
            PrescriptionRequest,
            admin::UpdateOrderStatusRequest,
            LowStockRow,
            LowStockList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductDetail>,
            ApiResponse<ProductList>,
            ApiResponse<OrderResponse>,
            ApiResponse<OrderList>,
            ApiResponse<LowStockList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Categories", description = "Catalog category endpoints"),
        (name = "Products", description = "Catalog product endpoints"),
        (name = "Variants", description = "Product variant endpoints"),
        (name = "Orders", description = "Order placement and lookup"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Prescriptions", description = "Prescription request intake"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
