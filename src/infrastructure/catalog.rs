use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::{CatalogProduct, ProductCatalog};
use crate::schema::products;

use super::models::ProductRow;

/// Catalog backed by the local `products` table. Reads are unversioned and
/// outside any order transaction; the price snapshot taken at order time is
/// what later stages rely on.
pub struct DieselProductCatalog {
    pool: DbPool,
}

impl DieselProductCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProductCatalog for DieselProductCatalog {
    fn get(&self, product_id: Uuid) -> Result<Option<CatalogProduct>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(|p| CatalogProduct {
            id: p.id,
            name: p.name,
            price: p.price,
        }))
    }
}
