use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MONEY_DP: u32 = 2;

/// Largest amount a `NUMERIC(12, 2)` money column holds.
pub const MAX_STORED_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// The single shipping/tax pair every pricing path uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    /// Flat fee per order.
    pub shipping_price: Decimal,
    /// Fraction of the items price, e.g. `0.15`.
    pub tax_rate: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            shipping_price: Decimal::ONE_HUNDRED,
            tax_rate: Decimal::new(15, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLine {
    pub unit_price: Decimal,
    pub qty: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

impl PriceBreakdown {
    pub fn total_before_discount(&self) -> Decimal {
        self.items_price + self.shipping_price + self.tax_price
    }

    /// Every stored money field is bounded by the pre-discount total.
    pub fn fits_storage(&self) -> bool {
        self.total_before_discount() <= MAX_STORED_AMOUNT
    }

    /// True when `total_price` follows exactly from the four stored components.
    pub fn reconciles(&self) -> bool {
        round_money(self.total_before_discount() - self.discount_amount) == self.total_price
    }
}

/// Half-up to two decimal places.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Prices a set of lines. Each derived field is rounded once, from unrounded
/// inputs or already-rounded fields, so the stored fields always reconcile.
pub fn calculate_prices(
    lines: &[PriceLine],
    discount_percent: Decimal,
    rules: &PricingRules,
) -> PriceBreakdown {
    let items_price = round_money(
        lines
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.qty))
            .sum(),
    );
    let shipping_price = round_money(rules.shipping_price);
    let tax_price = round_money(items_price * rules.tax_rate);

    let total_before_discount = items_price + shipping_price + tax_price;
    let discount_percent = discount_percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let discount_amount =
        round_money(total_before_discount * discount_percent / Decimal::ONE_HUNDRED);
    let total_price = round_money(total_before_discount - discount_amount);

    PriceBreakdown {
        items_price,
        shipping_price,
        tax_price,
        discount_percent,
        discount_amount,
        total_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn two_of_a_thousand() -> Vec<PriceLine> {
        vec![PriceLine {
            unit_price: dec!(1000),
            qty: 2,
        }]
    }

    #[test]
    fn prices_without_discount() {
        let breakdown = calculate_prices(&two_of_a_thousand(), Decimal::ZERO, &PricingRules::default());
        assert_eq!(breakdown.items_price, dec!(2000));
        assert_eq!(breakdown.shipping_price, dec!(100));
        assert_eq!(breakdown.tax_price, dec!(300));
        assert_eq!(breakdown.discount_amount, dec!(0));
        assert_eq!(breakdown.total_price, dec!(2400));
    }

    #[test]
    fn five_percent_applies_to_total_before_discount() {
        let breakdown = calculate_prices(&two_of_a_thousand(), dec!(5), &PricingRules::default());
        assert_eq!(breakdown.total_before_discount(), dec!(2400));
        assert_eq!(breakdown.discount_amount, dec!(120));
        assert_eq!(breakdown.total_price, dec!(2280));
        assert!(breakdown.reconciles());
    }

    #[test]
    fn rounds_half_up_per_field() {
        let lines = [PriceLine {
            unit_price: dec!(0.35),
            qty: 1,
        }];
        let rules = PricingRules {
            shipping_price: dec!(0),
            tax_rate: dec!(0.10),
        };
        // 0.035 -> 0.04
        let breakdown = calculate_prices(&lines, dec!(0), &rules);
        assert_eq!(breakdown.tax_price, dec!(0.04));
        assert_eq!(breakdown.total_price, dec!(0.39));
    }

    #[test]
    fn storage_bound_is_the_largest_two_place_amount() {
        assert_eq!(MAX_STORED_AMOUNT, dec!(9999999999.99));

        let huge = [PriceLine {
            unit_price: dec!(1000),
            qty: i32::MAX,
        }];
        let breakdown = calculate_prices(&huge, Decimal::ZERO, &PricingRules::default());
        assert!(!breakdown.fits_storage());
        assert!(calculate_prices(&two_of_a_thousand(), Decimal::ZERO, &PricingRules::default()).fits_storage());
    }

    #[test]
    fn discount_percent_is_clamped() {
        let breakdown = calculate_prices(&two_of_a_thousand(), dec!(150), &PricingRules::default());
        assert_eq!(breakdown.discount_percent, dec!(100));
        assert_eq!(breakdown.total_price, dec!(0));
    }
}
