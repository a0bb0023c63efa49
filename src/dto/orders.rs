use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderItem, Product};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 1000))]
    pub shipping_address: String,
    #[validate(length(min = 1), nested)]
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutData {
    pub order_code: String,
    pub total: i64,
}

/// One order line with its product resolved from the catalog. The product is
/// absent when it was deleted after the order was placed.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLine {
    pub item: OrderItem,
    pub product: Option<Product>,
}

/// Fully materialized order aggregate: the order plus every line.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<OrderDetail>)]
    pub items: Vec<OrderDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_rejects_empty_items() {
        let req = CheckoutRequest {
            shipping_address: "Jl. Jenderal Sudirman No. 1".into(),
            items: vec![],
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn checkout_rejects_zero_quantity() {
        let req = CheckoutRequest {
            shipping_address: "Jl. Jenderal Sudirman No. 1".into(),
            items: vec![CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 0,
            }],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn checkout_rejects_overlong_address() {
        let req = CheckoutRequest {
            shipping_address: "x".repeat(1001),
            items: vec![CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("shipping_address"));
    }

    #[test]
    fn checkout_accepts_well_formed_request() {
        let req = CheckoutRequest {
            shipping_address: "Jl. Soekarno Hatta No. 123".into(),
            items: vec![CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 3,
            }],
        };
        assert!(req.validate().is_ok());
    }
}
