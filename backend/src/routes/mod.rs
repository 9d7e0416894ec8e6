//! Route definitions for the batchtrace API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - parties, ingredients, products, rules
        .nest("/catalog", catalog_routes())
        // Protected routes - supplier formulations
        .nest("/formulations", formulation_routes())
        // Protected routes - supplier lots
        .nest("/ingredient-batches", ingredient_batch_routes())
        // Protected routes - recipes
        .nest("/recipes", recipe_routes())
        .nest("/products", product_routes())
        // Protected routes - manufacturer inventory
        .nest("/inventory", inventory_routes())
        // Protected routes - production
        .nest("/production", production_routes())
        // Protected routes - recall lookups
        .nest("/trace", trace_routes())
        // Protected routes - reports
        .nest("/reports", reporting_routes())
}

/// Catalog routes (protected)
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/parties/me", put(handlers::register_party))
        .route(
            "/ingredients",
            get(handlers::list_ingredients).post(handlers::declare_ingredient),
        )
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/products", post(handlers::define_product))
        .route(
            "/products/:product_id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route(
            "/do-not-combine",
            get(handlers::list_do_not_combine).post(handlers::declare_do_not_combine),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Formulation routes (protected)
fn formulation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_formulations).post(handlers::create_formulation),
        )
        .route("/active", get(handlers::list_active_formulations))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Ingredient batch routes (protected)
fn ingredient_batch_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_ingredient_batches).post(handlers::create_ingredient_batch),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Recipe routes (protected)
fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_recipe))
        .route("/:recipe_id", get(handlers::get_recipe))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Per-product recipe routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/:product_id/recipes", get(handlers::list_product_recipes))
        .route("/:product_id/recipes/active", get(handlers::get_active_recipe))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/receipts", post(handlers::receive_ingredient))
        .route("/on-hand", get(handlers::get_on_hand))
        .route("/almost-expiring", get(handlers::get_almost_expiring))
        .route("/nearly-out-of-stock", get(handlers::get_nearly_out_of_stock))
        .route("/lots/:lot_number", get(handlers::get_lot_receipts))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Production routes (protected)
fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/batches", post(handlers::produce_batch))
        .route("/batches/:lot_number", get(handlers::get_product_batch))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Traceability routes (protected)
fn trace_routes() -> Router<AppState> {
    Router::new()
        .route("/products/:lot_number", get(handlers::trace_backward))
        .route("/ingredients/:lot_number", get(handlers::trace_forward))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Reporting routes (protected)
fn reporting_routes() -> Router<AppState> {
    Router::new()
        .route("/supplier-spend", get(handlers::get_supplier_spend))
        .route("/unit-cost/:lot_number", get(handlers::get_unit_cost))
        .route("/ingredient-listing", get(handlers::get_ingredient_listing))
        .route("/compare", get(handlers::compare_products))
        .route("/health-risks", get(handlers::get_health_risks))
        .route(
            "/products/:product_id/ingredients",
            get(handlers::get_product_ingredients),
        )
        .route(
            "/products/:product_id/last-batch",
            get(handlers::get_last_batch_ingredients),
        )
        .route(
            "/manufacturers-not-supplied-by/:supplier_id",
            get(handlers::get_manufacturers_not_supplied_by),
        )
        .route(
            "/batches/:lot_number/excluded-ingredients",
            get(handlers::get_excluded_ingredients),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}
