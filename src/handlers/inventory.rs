use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::inventory_service::InventoryService;
use crate::domain::inventory::StockLevels;
use crate::errors::ApiError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuantityRequest {
    /// Units to move; must be at least 1.
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLevelsResponse {
    pub product_id: Uuid,
    pub available_qty: i32,
    pub reserved_qty: i32,
}

impl From<StockLevels> for StockLevelsResponse {
    fn from(levels: StockLevels) -> Self {
        Self {
            product_id: levels.product_id,
            available_qty: levels.available_qty,
            reserved_qty: levels.reserved_qty,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /inventory/{product_id}/reserve
///
/// Moves units from available to reserved under a row lock, so concurrent
/// reservations for the same product serialize and never oversell.
#[utoipa::path(
    post,
    path = "/inventory/{product_id}/reserve",
    params(
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Stock reserved", body = StockLevelsResponse),
        (status = 400, description = "Quantity below 1"),
        (status = 404, description = "No inventory record for the product"),
        (status = 422, description = "Not enough available stock"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "inventory"
)]
pub async fn reserve(
    service: web::Data<InventoryService>,
    path: web::Path<Uuid>,
    body: web::Json<QuantityRequest>,
) -> Result<HttpResponse, ApiError> {
    let product_id = path.into_inner();
    let quantity = body.quantity;

    let levels = web::block(move || service.reserve(product_id, quantity))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(StockLevelsResponse::from(levels)))
}

/// POST /inventory/{product_id}/release
///
/// Returns previously reserved units to the available pool.
#[utoipa::path(
    post,
    path = "/inventory/{product_id}/release",
    params(
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Stock released", body = StockLevelsResponse),
        (status = 400, description = "Quantity below 1"),
        (status = 404, description = "No inventory record for the product"),
        (status = 422, description = "More units than are currently reserved"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "inventory"
)]
pub async fn release(
    service: web::Data<InventoryService>,
    path: web::Path<Uuid>,
    body: web::Json<QuantityRequest>,
) -> Result<HttpResponse, ApiError> {
    let product_id = path.into_inner();
    let quantity = body.quantity;

    let levels = web::block(move || service.release(product_id, quantity))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(StockLevelsResponse::from(levels)))
}

/// GET /inventory/{product_id}
///
/// Returns current stock counters for a product.
#[utoipa::path(
    get,
    path = "/inventory/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    responses(
        (status = 200, description = "Current stock levels", body = StockLevelsResponse),
        (status = 404, description = "No inventory record for the product"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "inventory"
)]
pub async fn get_levels(
    service: web::Data<InventoryService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let product_id = path.into_inner();

    let levels = web::block(move || service.get(product_id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(StockLevelsResponse::from(levels)))
}
