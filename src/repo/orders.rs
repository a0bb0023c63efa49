//! Order aggregate queries. Every function returns fully materialized
//! `OrderDetail` values (order, items, resolved products) so callers never
//! depend on lazy relation loading.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderDetail, OrderLine},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem, Product},
};

/// All orders owned by one user, newest first.
pub async fn find_orders_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<OrderDetail>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(conn)
        .await?;
    materialize(conn, orders).await
}

/// Every order in the system, newest first. Admin scope.
pub async fn find_all_orders<C: ConnectionTrait>(conn: &C) -> AppResult<Vec<OrderDetail>> {
    let orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .all(conn)
        .await?;
    materialize(conn, orders).await
}

pub async fn find_order_by_id<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<OrderDetail> {
    let order = Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut details = materialize(conn, vec![order]).await?;
    details.pop().ok_or(AppError::NotFound)
}

/// Attach items and their products with one batched query each. A product
/// deleted after purchase leaves `product: None` on the line; the price
/// snapshot on the item still tells the order's history.
async fn materialize<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderDetail>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?;

    let mut product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    product_ids.sort();
    product_ids.dedup();

    let products: HashMap<Uuid, Product> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, Product::from(p)))
        .collect();

    let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for item in items {
        let product = products.get(&item.product_id).cloned();
        lines_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderLine {
                item: OrderItem::from(item),
                product,
            });
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = lines_by_order.remove(&order.id).unwrap_or_default();
            OrderDetail {
                order: Order::from(order),
                items,
            }
        })
        .collect())
}
