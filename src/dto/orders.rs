use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    catalog::VariantKey,
    models::{Order, OrderItem, ShippingAddress},
    orders::OrderState,
    pricing::DiscountSelection,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub qty: i32,
    pub variant: Option<VariantKey>,
    /// Price the client displayed. Logged when it differs, never stored.
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    #[serde(flatten)]
    pub discount: DiscountSelection,
    /// Total the client displayed. Logged when it differs, never stored.
    pub total_price: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub state: OrderState,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderCount {
    pub total_orders: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesTotal {
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesByDate {
    pub items: Vec<DailySales>,
}
