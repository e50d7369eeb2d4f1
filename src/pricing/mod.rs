pub mod calculator;
pub mod discount;

pub use calculator::{
    MAX_STORED_AMOUNT, PriceBreakdown, PriceLine, PricingRules, calculate_prices, round_money,
};
pub use discount::{
    CouponRecord, DiscountBook, DiscountCatalog, DiscountPolicy, DiscountRequest,
    DiscountSelection, DiscountSource, ResolvedDiscount, UniversityRecord, resolve_discount,
};
