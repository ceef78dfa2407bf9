use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

/// Line submitted at checkout, copied verbatim into the order snapshot.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Debug)]
pub struct CheckoutRequest {
    pub address: String,
    pub phone_number: String,
    pub email: String,
    pub items: Vec<CheckoutItem>,
    pub total_price: i64,
}

/// Multipart body of `POST /api/checkout`; documentation only.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CheckoutForm {
    pub address: String,
    pub phone_number: String,
    pub email: String,
    /// JSON array of `CheckoutItem`.
    pub items: String,
    pub total_price: i64,
    #[schema(value_type = Option<String>, format = Binary)]
    pub receipt: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}
