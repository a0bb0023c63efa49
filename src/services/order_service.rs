use std::collections::HashMap;

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::OrmConn,
    dto::orders::{CheckoutData, CheckoutItem, CheckoutRequest},
    entity::{
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// A checkout line resolved against the catalog: authoritative price and
/// stock, paired with the requested quantity. Client-submitted prices are
/// never read.
struct ResolvedLine {
    product: ProductModel,
    quantity: i32,
}

/// Create an order from an explicit item list. Resolution, validation,
/// pricing, persistence and the stock decrement run in one transaction; on
/// any failure nothing is persisted and no stock moves.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: &CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutData>> {
    let mut retried = false;
    let order = loop {
        match try_create_order(&state.orm, user, payload).await {
            Ok(order) => break order,
            Err(AppError::OrmError(err)) if is_unique_violation(&err) => {
                // Order-code collision. Statistically negligible, but the
                // code column is UNIQUE, so regenerate once before giving up.
                if retried {
                    return Err(AppError::DuplicateOrderCode);
                }
                retried = true;
                tracing::warn!("order code collision, retrying with a fresh code");
            }
            Err(err) => return Err(err),
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_code": order.order_code })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created successfully",
        CheckoutData {
            order_code: order.order_code,
            total: order.total_amount,
        },
        Some(Meta::empty()),
    ))
}

async fn try_create_order(
    conn: &OrmConn,
    user: &AuthUser,
    payload: &CheckoutRequest,
) -> AppResult<OrderModel> {
    let txn = conn.begin().await?;

    let lines = resolve_items(&txn, &payload.items).await?;

    // Server-side total from the catalog prices read under lock.
    let mut total_amount: i64 = 0;
    for line in &lines {
        total_amount += line.product.price * i64::from(line.quantity);
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        order_code: Set(generate_order_code()),
        total_amount: Set(total_amount),
        shipping_address: Set(payload.shipping_address.clone()),
        status: Set("pending".into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for line in &lines {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product.id),
            quantity: Set(line.quantity),
            price: Set(line.product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    // One decrement per product, in the same transaction as the locked read.
    let mut decrements: HashMap<Uuid, i32> = HashMap::new();
    for line in &lines {
        *decrements.entry(line.product.id).or_insert(0) += line.quantity;
    }
    for (product_id, quantity) in decrements {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
            .filter(ProdCol::Id.eq(product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(order)
}

/// Resolve every requested product in a single batched read, holding row
/// locks until the enclosing transaction commits. Rows are locked in id order
/// so overlapping checkouts cannot deadlock. Fails on the first unknown
/// product or short stock; a partial success is never returned.
async fn resolve_items(
    txn: &DatabaseTransaction,
    items: &[CheckoutItem],
) -> AppResult<Vec<ResolvedLine>> {
    let mut ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    ids.sort();
    ids.dedup();

    let products = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(txn)
        .await?;

    let by_id: HashMap<Uuid, ProductModel> =
        products.into_iter().map(|p| (p.id, p)).collect();

    // Quantities summed per product, so a product repeated across lines is
    // checked against its combined demand.
    let mut requested: HashMap<Uuid, i64> = HashMap::new();
    for item in items {
        if !by_id.contains_key(&item.product_id) {
            return Err(AppError::ProductNotFound);
        }
        *requested.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }

    for (product_id, total_quantity) in &requested {
        let product = &by_id[product_id];
        if i64::from(product.stock) < *total_quantity {
            return Err(AppError::InsufficientStock {
                name: product.name.clone(),
            });
        }
    }

    Ok(items
        .iter()
        .map(|item| ResolvedLine {
            product: by_id[&item.product_id].clone(),
            quantity: item.quantity,
        })
        .collect())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// `INV/<YYYYMMDD>/<6-char uppercase alphanumeric>`. Uniqueness is enforced
/// by the storage layer; the caller retries once on collision.
fn generate_order_code() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("INV/{date}/{suffix}")
}

#[cfg(test)]
mod tests {
    use super::generate_order_code;

    #[test]
    fn order_code_has_expected_shape() {
        let code = generate_order_code();
        let parts: Vec<&str> = code.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn order_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..100).map(|_| generate_order_code()).collect();
        assert!(codes.len() > 90, "suffixes should be random");
    }
}
