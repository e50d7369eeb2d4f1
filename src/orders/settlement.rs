use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::OrderPolicy,
    error::{AppError, AppResult},
    models::PaymentConfirmation,
};

/// `Created -> Paid -> Delivered`; nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Created,
    Paid,
    Delivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fulfilment {
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Fulfilment {
    pub fn state(&self) -> OrderState {
        if self.is_delivered {
            OrderState::Delivered
        } else if self.is_paid {
            OrderState::Paid
        } else {
            OrderState::Created
        }
    }

    pub fn mark_paid(
        &self,
        total_price: Decimal,
        confirmation: &PaymentConfirmation,
        policy: &OrderPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Fulfilment> {
        if self.is_paid && policy.reject_repeat_payment {
            return Err(AppError::AlreadyPaid);
        }
        if confirmation.id.trim().is_empty() {
            return Err(AppError::Validation(
                "payment confirmation id is required".into(),
            ));
        }
        if let Some(charged) = confirmation.amount {
            if charged != total_price {
                return Err(AppError::Validation(format!(
                    "charged amount {charged} does not match order total {total_price}"
                )));
            }
        }

        Ok(Fulfilment {
            is_paid: true,
            paid_at: Some(now),
            ..*self
        })
    }

    pub fn mark_delivered(&self, policy: &OrderPolicy, now: DateTime<Utc>) -> AppResult<Fulfilment> {
        if policy.require_payment_before_delivery && !self.is_paid {
            return Err(AppError::NotPaid);
        }
        if self.is_delivered {
            return Ok(*self);
        }
        Ok(Fulfilment {
            is_delivered: true,
            delivered_at: Some(now),
            ..*self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn created() -> Fulfilment {
        Fulfilment {
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
        }
    }

    fn confirmation(amount: Option<Decimal>) -> PaymentConfirmation {
        PaymentConfirmation {
            id: "CAPTURE-1".into(),
            status: "COMPLETED".into(),
            update_time: None,
            email_address: Some("buyer@example.com".into()),
            amount,
        }
    }

    #[test]
    fn paying_sets_paid_at_and_leaves_delivery_alone() {
        let now = Utc::now();
        let paid = created()
            .mark_paid(dec!(2400), &confirmation(None), &OrderPolicy::default(), now)
            .unwrap();
        assert_eq!(paid.state(), OrderState::Paid);
        assert_eq!(paid.paid_at, Some(now));
        assert!(!paid.is_delivered);
    }

    #[test]
    fn charged_amount_must_match_total() {
        let err = created()
            .mark_paid(dec!(2400), &confirmation(Some(dec!(1))), &OrderPolicy::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = created()
            .mark_paid(dec!(2280), &confirmation(Some(dec!(2279.995))), &OrderPolicy::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(
            created()
                .mark_paid(dec!(2400), &confirmation(Some(dec!(2400.00))), &OrderPolicy::default(), Utc::now())
                .is_ok()
        );
    }

    #[test]
    fn repeat_payment_follows_policy() {
        let first = Utc::now();
        let paid = created()
            .mark_paid(dec!(10), &confirmation(None), &OrderPolicy::default(), first)
            .unwrap();
        let err = paid
            .mark_paid(dec!(10), &confirmation(None), &OrderPolicy::default(), first)
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyPaid));

        let lenient = OrderPolicy {
            reject_repeat_payment: false,
            ..OrderPolicy::default()
        };
        let later = first + Duration::minutes(5);
        let repaid = paid
            .mark_paid(dec!(10), &confirmation(None), &lenient, later)
            .unwrap();
        assert_eq!(repaid.paid_at, Some(later));
    }

    #[test]
    fn delivery_before_payment_follows_policy() {
        let open = OrderPolicy::default();
        let delivered = created().mark_delivered(&open, Utc::now()).unwrap();
        assert_eq!(delivered.state(), OrderState::Delivered);
        assert!(!delivered.is_paid);

        let strict = OrderPolicy {
            require_payment_before_delivery: true,
            ..open
        };
        let err = created().mark_delivered(&strict, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::NotPaid));
    }

    #[test]
    fn delivering_twice_keeps_first_timestamp() {
        let first = Utc::now();
        let delivered = created()
            .mark_delivered(&OrderPolicy::default(), first)
            .unwrap();
        let again = delivered
            .mark_delivered(&OrderPolicy::default(), first + Duration::hours(1))
            .unwrap();
        assert_eq!(again.delivered_at, Some(first));
    }
}
