use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::OrderService;
use crate::domain::errors::DomainError;
use crate::domain::order::{OrderListQuery, OrderStatus, OrderView, RequestedLine};
use crate::errors::ApiError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub order_lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Decimal amount as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Decimal amount as a string to avoid floating-point issues, e.g. "9.99"
    pub total_amount: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub order_lines: Vec<OrderLineResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    /// Target status literal, e.g. "CONFIRMED"
    pub status: String,
}

fn to_response(order: OrderView) -> OrderResponse {
    OrderResponse {
        id: order.id,
        user_id: order.user_id,
        total_amount: order.total_amount.to_string(),
        status: order.status.to_string(),
        created_at: order.created_at.to_rfc3339(),
        updated_at: order.updated_at.to_rfc3339(),
        order_lines: order
            .lines
            .into_iter()
            .map(|l| OrderLineResponse {
                id: l.id,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price.to_string(),
            })
            .collect(),
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Restrict to a single user's orders.
    pub user_id: Option<Uuid>,
    /// Restrict to one status literal, e.g. "PENDING".
    pub status: Option<String>,
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_size")]
    pub size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderPageResponse {
    pub items: Vec<OrderResponse>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub page: i64,
    pub size: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Creates an order from catalog products: prices the lines, reserves stock,
/// requests the payment and writes the audit trail, all in one database
/// transaction. Any failing step leaves no trace of the order.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Empty order or non-positive quantity"),
        (status = 422, description = "Unknown product or insufficient stock"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<OrderService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let lines: Vec<RequestedLine> = body
        .order_lines
        .iter()
        .map(|l| RequestedLine {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect();

    let order = web::block(move || service.create_order(body.user_id, lines))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            // A missing product makes the order unprocessable; 404 would
            // wrongly point at the /orders resource itself.
            if matches!(e, DomainError::NotFound { .. }) {
                ApiError::UnprocessableEntity(e.to_string())
            } else {
                ApiError::from(e)
            }
        })?;

    Ok(HttpResponse::Created().json(to_response(order)))
}

/// GET /orders/{id}
///
/// Returns the order together with its lines.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrderService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order_id = path.into_inner();

    let result = web::block(move || service.get_order(order_id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    match result {
        Some(order) => Ok(HttpResponse::Ok().json(to_response(order))),
        None => Err(ApiError::NotFound(format!("order {order_id} not found"))),
    }
}

/// GET /orders
///
/// Returns a page of orders, newest first, without their lines. Optional
/// `user_id` and `status` filters combine with AND.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("user_id" = Option<Uuid>, Query, description = "Filter by user"),
        ("status" = Option<String>, Query, description = "Filter by status literal, e.g. PENDING"),
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("size" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = OrderPageResponse),
        (status = 400, description = "Unknown status literal"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<OrderService>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, ApiError> {
    let params = query.into_inner();
    let status = match params.status.as_deref() {
        Some(s) => Some(
            OrderStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{s}'")))?,
        ),
        None => None,
    };
    let list_query = OrderListQuery {
        user_id: params.user_id,
        status,
        page: params.page,
        size: params.size,
    };

    let page = web::block(move || service.list_orders(list_query))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderPageResponse {
        items: page.items.into_iter().map(to_response).collect(),
        total_elements: page.total_elements,
        total_pages: page.total_pages,
        page: page.page,
        size: page.size,
    }))
}

/// POST /orders/{id}/status
///
/// Moves the order to a new lifecycle status. The transition is validated
/// against the status graph and appended to the order's history.
#[utoipa::path(
    post,
    path = "/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = OrderResponse),
        (status = 400, description = "Unknown status literal"),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Transition not allowed from the current status"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn change_status(
    service: web::Data<OrderService>,
    path: web::Path<Uuid>,
    body: web::Json<ChangeStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let order_id = path.into_inner();
    let new_status = OrderStatus::parse(&body.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", body.status)))?;

    let order = web::block(move || service.change_status(order_id, new_status))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(to_response(order)))
}
