use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{OrderLineInput, OrderLineView, OrderListQuery, OrderStatus, OrderView};
use crate::schema::{order_lines, order_status_history, orders};

use super::models::{
    NewOrderLineRow, NewOrderRow, NewStatusHistoryRow, OrderLineRow, OrderRow,
};

/// Insert the order shell with the given status and computed total, returning
/// its freshly minted id. Timestamps come from the database defaults.
pub fn insert_order(
    conn: &mut PgConnection,
    user_id: Uuid,
    total_amount: &BigDecimal,
    status: OrderStatus,
) -> Result<Uuid, DomainError> {
    let order_id = Uuid::new_v4();
    diesel::insert_into(orders::table)
        .values(&NewOrderRow {
            id: order_id,
            user_id,
            total_amount: total_amount.clone(),
            status: status.as_str().to_string(),
        })
        .execute(conn)?;
    Ok(order_id)
}

pub fn insert_lines(
    conn: &mut PgConnection,
    order_id: Uuid,
    lines: &[OrderLineInput],
) -> Result<(), DomainError> {
    let rows: Vec<NewOrderLineRow> = lines
        .iter()
        .map(|l| NewOrderLineRow {
            id: Uuid::new_v4(),
            order_id,
            product_id: l.product_id,
            quantity: l.quantity,
            unit_price: l.unit_price.clone(),
        })
        .collect();
    diesel::insert_into(order_lines::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

/// Append one audit row per transition; `from = None` marks creation.
pub fn insert_history(
    conn: &mut PgConnection,
    order_id: Uuid,
    from: Option<OrderStatus>,
    to: OrderStatus,
) -> Result<(), DomainError> {
    diesel::insert_into(order_status_history::table)
        .values(&NewStatusHistoryRow {
            id: Uuid::new_v4(),
            order_id,
            from_status: from.map(|s| s.as_str().to_string()),
            to_status: to.as_str().to_string(),
        })
        .execute(conn)?;
    Ok(())
}

pub fn update_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    to: OrderStatus,
) -> Result<(), DomainError> {
    diesel::update(orders::table.find(order_id))
        .set((
            orders::status.eq(to.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Load the order row with an exclusive lock, serializing concurrent status
/// changes for the same order within their transactions.
pub fn lock_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<OrderRow>, DomainError> {
    Ok(orders::table
        .find(order_id)
        .select(OrderRow::as_select())
        .for_update()
        .first(conn)
        .optional()?)
}

/// Compose the order + lines view, or `None` if the order does not exist.
pub fn find_view(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<OrderView>, DomainError> {
    let order = orders::table
        .find(order_id)
        .select(OrderRow::as_select())
        .first(conn)
        .optional()?;

    let Some(order) = order else {
        return Ok(None);
    };

    let lines = order_lines::table
        .filter(order_lines::order_id.eq(order.id))
        .order(order_lines::created_at.asc())
        .select(OrderLineRow::as_select())
        .load(conn)?;

    Ok(Some(to_view(order, lines)?))
}

/// Filtered page of order rows plus the total count matching the filter.
/// Listings skip line loading; `find_view` serves the detailed read.
pub fn list(
    conn: &mut PgConnection,
    query: &OrderListQuery,
) -> Result<(Vec<OrderView>, i64), DomainError> {
    let mut count_q = orders::table.count().into_boxed();
    let mut page_q = orders::table
        .select(OrderRow::as_select())
        .order(orders::created_at.desc())
        .into_boxed();

    if let Some(user_id) = query.user_id {
        count_q = count_q.filter(orders::user_id.eq(user_id));
        page_q = page_q.filter(orders::user_id.eq(user_id));
    }
    if let Some(status) = query.status {
        count_q = count_q.filter(orders::status.eq(status.as_str()));
        page_q = page_q.filter(orders::status.eq(status.as_str()));
    }

    let total: i64 = count_q.get_result(conn)?;

    let offset = (query.page - 1) * query.size;
    let rows = page_q.limit(query.size).offset(offset).load::<OrderRow>(conn)?;

    let views = rows
        .into_iter()
        .map(|row| to_view(row, Vec::new()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((views, total))
}

fn to_view(row: OrderRow, lines: Vec<OrderLineRow>) -> Result<OrderView, DomainError> {
    let status = parse_status(&row.status)?;
    Ok(OrderView {
        id: row.id,
        user_id: row.user_id,
        total_amount: row.total_amount,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
        lines: lines
            .into_iter()
            .map(|l| OrderLineView {
                id: l.id,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect(),
    })
}

pub fn parse_status(stored: &str) -> Result<OrderStatus, DomainError> {
    OrderStatus::parse(stored)
        .ok_or_else(|| DomainError::Internal(format!("unknown order status in storage: {stored}")))
}
