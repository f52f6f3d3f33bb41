use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::inventory::StockLevels;
use crate::infrastructure::inventory_repo;

/// Transaction-per-call facade over the stock ledger, serving the inventory
/// endpoints. Order creation bypasses this and calls the repo directly so
/// its reservations join the order transaction.
#[derive(Clone)]
pub struct InventoryService {
    pool: DbPool,
}

impl InventoryService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn reserve(&self, product_id: Uuid, quantity: i32) -> Result<StockLevels, DomainError> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| inventory_repo::reserve(conn, product_id, quantity))
    }

    pub fn release(&self, product_id: Uuid, quantity: i32) -> Result<StockLevels, DomainError> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| inventory_repo::release(conn, product_id, quantity))
    }

    pub fn get(&self, product_id: Uuid) -> Result<StockLevels, DomainError> {
        let mut conn = self.pool.get()?;
        inventory_repo::levels(&mut conn, product_id)?
            .ok_or_else(|| DomainError::not_found("inventory record", product_id))
    }
}
