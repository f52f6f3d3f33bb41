pub mod application;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::inventory_service::InventoryService;
use application::order_service::OrderService;
use application::payment_service::PaymentProcessor;
use domain::payment::RetryPolicy;
use infrastructure::catalog::DieselProductCatalog;
use infrastructure::notifier::LogNotifier;
use infrastructure::provider::AutoApproveProvider;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool
        .get()
        .expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::list_orders,
        handlers::orders::change_status,
        handlers::inventory::reserve,
        handlers::inventory::release,
        handlers::inventory::get_levels,
        handlers::payments::create_payment,
        handlers::payments::get_payment_by_order,
    ),
    components(schemas(
        handlers::orders::OrderLineRequest,
        handlers::orders::CreateOrderRequest,
        handlers::orders::OrderLineResponse,
        handlers::orders::OrderResponse,
        handlers::orders::ChangeStatusRequest,
        handlers::orders::OrderPageResponse,
        handlers::inventory::QuantityRequest,
        handlers::inventory::StockLevelsResponse,
        handlers::payments::CreatePaymentRequest,
        handlers::payments::CreatePaymentResponse,
        handlers::payments::PaymentResponse,
    )),
    tags(
        (name = "orders", description = "Order creation and lifecycle"),
        (name = "inventory", description = "Stock reservation ledger"),
        (name = "billing", description = "Payment processing"),
    )
)]
pub struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// Wires the default collaborators around the shared pool: the Diesel-backed
/// product catalog, the auto-approving payment provider and the log-only
/// notifier. The caller is responsible for `.await`-ing (or
/// `tokio::spawn`-ing) the returned server.
pub fn build_server(
    pool: DbPool,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let payments = PaymentProcessor::new(
        pool.clone(),
        Arc::new(AutoApproveProvider),
        RetryPolicy::default(),
    );
    let inventory = InventoryService::new(pool.clone());
    let orders = OrderService::new(
        pool.clone(),
        Arc::new(DieselProductCatalog::new(pool)),
        Arc::new(payments.clone()),
        Arc::new(LogNotifier),
    );

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(orders.clone()))
            .app_data(web::Data::new(inventory.clone()))
            .app_data(web::Data::new(payments.clone()))
            .wrap(Logger::default())
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route(
                        "/{id}/status",
                        web::post().to(handlers::orders::change_status),
                    ),
            )
            .service(
                web::scope("/inventory")
                    .route(
                        "/{product_id}/reserve",
                        web::post().to(handlers::inventory::reserve),
                    )
                    .route(
                        "/{product_id}/release",
                        web::post().to(handlers::inventory::release),
                    )
                    .route(
                        "/{product_id}",
                        web::get().to(handlers::inventory::get_levels),
                    ),
            )
            .service(
                web::scope("/billing")
                    .route(
                        "/payments",
                        web::post().to(handlers::payments::create_payment),
                    )
                    .route(
                        "/payments/{order_id}",
                        web::get().to(handlers::payments::get_payment_by_order),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
