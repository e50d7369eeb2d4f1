use std::{env, str::FromStr};

use anyhow::Context;
use rust_decimal::Decimal;

use crate::pricing::{DiscountPolicy, PricingRules};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub settings: Settings,
}

/// Business settings shared by every request through `AppState`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pricing: PricingRules,
    pub discounts: DiscountPolicy,
    pub orders: OrderPolicy,
    pub currency: String,
}

/// Toggles for order state transitions whose strictness is a deployment choice.
#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    pub require_payment_before_delivery: bool,
    pub reject_repeat_payment: bool,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            require_payment_before_delivery: false,
            reject_repeat_payment: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pricing: PricingRules::default(),
            discounts: DiscountPolicy::default(),
            orders: OrderPolicy::default(),
            currency: "BDT".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT", 3000u16)?;
        Ok(Self {
            port,
            database_url,
            host,
            settings: Settings::from_env()?,
        })
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Settings::default();

        let pricing = PricingRules {
            shipping_price: parse_var("SHIPPING_PRICE", defaults.pricing.shipping_price)?,
            tax_rate: parse_var("TAX_RATE", defaults.pricing.tax_rate)?,
        };
        if pricing.shipping_price.is_sign_negative() {
            anyhow::bail!("SHIPPING_PRICE must not be negative");
        }
        if pricing.tax_rate.is_sign_negative() || pricing.tax_rate > Decimal::ONE {
            anyhow::bail!("TAX_RATE must be between 0 and 1");
        }

        let discounts = DiscountPolicy {
            student_percent: parse_var(
                "STUDENT_DISCOUNT_PERCENT",
                defaults.discounts.student_percent,
            )?,
            enforce_coupon_expiry: parse_var(
                "ENFORCE_COUPON_EXPIRY",
                defaults.discounts.enforce_coupon_expiry,
            )?,
        };
        if discounts.student_percent.is_sign_negative()
            || discounts.student_percent > Decimal::ONE_HUNDRED
        {
            anyhow::bail!("STUDENT_DISCOUNT_PERCENT must be between 0 and 100");
        }

        let orders = OrderPolicy {
            require_payment_before_delivery: parse_var(
                "REQUIRE_PAYMENT_BEFORE_DELIVERY",
                defaults.orders.require_payment_before_delivery,
            )?,
            reject_repeat_payment: parse_var(
                "REJECT_REPEAT_PAYMENT",
                defaults.orders.reject_repeat_payment,
            )?,
        };

        let currency = env::var("CURRENCY").unwrap_or(defaults.currency);

        Ok(Self {
            pricing,
            discounts,
            orders,
            currency,
        })
    }
}

// Unset falls back to the default; set-but-malformed is a startup error.
fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_fail_instead_of_defaulting() {
        // Keys unique to this test.
        unsafe {
            env::set_var("STOREFRONT_TEST_PORT", "80a");
            env::set_var("STOREFRONT_TEST_RATE", " 0.2 ");
        }
        assert!(parse_var("STOREFRONT_TEST_PORT", 3000u16).is_err());
        assert_eq!(
            parse_var("STOREFRONT_TEST_RATE", Decimal::ZERO).unwrap(),
            Decimal::new(2, 1)
        );
        assert_eq!(parse_var("STOREFRONT_TEST_UNSET", 3000u16).unwrap(), 3000);
    }
}
