//! The single chokepoint for stock counter mutations. Every reserve/release
//! locks the product's row with `SELECT ... FOR UPDATE` before touching the
//! counters, so concurrent read-modify-write cycles on the same product
//! serialize instead of losing updates. The lock lives until the caller's
//! transaction ends.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::inventory::StockLevels;
use crate::schema::inventory;

use super::models::InventoryRow;

fn lock_row(conn: &mut PgConnection, product_id: Uuid) -> Result<Option<InventoryRow>, DomainError> {
    Ok(inventory::table
        .find(product_id)
        .select(InventoryRow::as_select())
        .for_update()
        .first(conn)
        .optional()?)
}

fn store_counters(
    conn: &mut PgConnection,
    product_id: Uuid,
    available_qty: i32,
    reserved_qty: i32,
) -> Result<StockLevels, DomainError> {
    diesel::update(inventory::table.find(product_id))
        .set((
            inventory::available_qty.eq(available_qty),
            inventory::reserved_qty.eq(reserved_qty),
            inventory::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(StockLevels {
        product_id,
        available_qty,
        reserved_qty,
    })
}

/// Move `quantity` from available to reserved. Must run inside the enclosing
/// transaction whose outcome the reservation should share.
pub fn reserve(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<StockLevels, DomainError> {
    if quantity < 1 {
        return Err(DomainError::Validation(
            "reserve quantity must be at least 1".to_string(),
        ));
    }
    let row = lock_row(conn, product_id)?
        .ok_or_else(|| DomainError::not_found("inventory record", product_id))?;
    if row.available_qty < quantity {
        return Err(DomainError::InsufficientStock {
            product_id,
            requested: quantity,
            available: row.available_qty,
        });
    }
    store_counters(
        conn,
        product_id,
        row.available_qty - quantity,
        row.reserved_qty + quantity,
    )
}

/// Give `quantity` back from reserved to available.
pub fn release(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<StockLevels, DomainError> {
    if quantity < 1 {
        return Err(DomainError::Validation(
            "release quantity must be at least 1".to_string(),
        ));
    }
    let row = lock_row(conn, product_id)?
        .ok_or_else(|| DomainError::not_found("inventory record", product_id))?;
    if row.reserved_qty < quantity {
        return Err(DomainError::InsufficientStock {
            product_id,
            requested: quantity,
            available: row.reserved_qty,
        });
    }
    store_counters(
        conn,
        product_id,
        row.available_qty + quantity,
        row.reserved_qty - quantity,
    )
}

/// Unlocked read for display purposes; may trail in-flight reservations.
pub fn levels(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> Result<Option<StockLevels>, DomainError> {
    let row = inventory::table
        .find(product_id)
        .select(InventoryRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row.map(|r| StockLevels {
        product_id: r.product_id,
        available_qty: r.available_qty,
        reserved_qty: r.reserved_qty,
    }))
}
