use uuid::Uuid;

/// Snapshot of a product's stock counters. Reserve/release only move
/// quantity between the two fields; their sum changes through restock alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
    pub product_id: Uuid,
    pub available_qty: i32,
    pub reserved_qty: i32,
}
