use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Order, PaymentConfirmation},
};

/// What the payment provider is asked to charge. Always built from the
/// persisted order, never from client input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CaptureRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
}

impl CaptureRequest {
    pub fn for_order(order: &Order, currency: &str) -> AppResult<Self> {
        if !order.breakdown().reconciles() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "order {} total does not reconcile with its price fields",
                order.id
            )));
        }
        Ok(Self {
            order_id: order.id,
            amount: order.total_price,
            currency: currency.to_string(),
        })
    }
}

/// Captures a charge with an external provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn capture(&self, request: &CaptureRequest) -> AppResult<PaymentConfirmation>;
}
