use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    catalog::{Catalog, VariantKey, find_variant},
    config::Settings,
    dto::orders::CreateOrderRequest,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::ShippingAddress,
    pricing::{
        DiscountBook, MAX_STORED_AMOUNT, PriceBreakdown, PriceLine, ResolvedDiscount,
        calculate_prices, resolve_discount,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct LineSnapshot {
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub qty: i32,
    pub variant: Option<VariantKey>,
}

/// A fully priced order ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub user_id: Uuid,
    pub lines: Vec<LineSnapshot>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub breakdown: PriceBreakdown,
    pub discount: Option<ResolvedDiscount>,
}

/// Turns a submitted order into a draft priced only from catalog data and a
/// server-side discount resolution. Client-declared prices and totals are
/// compared for logging and otherwise ignored.
pub async fn assemble_order<C, B>(
    user: &AuthUser,
    request: CreateOrderRequest,
    catalog: &C,
    discounts: &B,
    settings: &Settings,
    now: DateTime<Utc>,
) -> AppResult<OrderDraft>
where
    C: Catalog + ?Sized,
    B: DiscountBook + ?Sized,
{
    if request.items.is_empty() {
        return Err(AppError::EmptyOrder);
    }
    if let Some(bad) = request.items.iter().find(|item| item.qty <= 0) {
        return Err(AppError::InvalidQuantity {
            product_id: bad.product_id,
        });
    }
    request.shipping_address.validate()?;
    let payment_method = request.payment_method.trim().to_string();
    if payment_method.is_empty() {
        return Err(AppError::Validation("payment method is required".into()));
    }

    let mut seen = HashSet::new();
    let ids: Vec<Uuid> = request
        .items
        .iter()
        .map(|item| item.product_id)
        .filter(|id| seen.insert(*id))
        .collect();
    let products = catalog.find_products_by_ids(&ids).await?;
    let missing: Vec<Uuid> = ids
        .iter()
        .copied()
        .filter(|id| !products.iter().any(|p| p.id == *id))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::ProductNotFound(missing));
    }

    let mut lines = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let Some(product) = products.iter().find(|p| p.id == item.product_id) else {
            return Err(AppError::ProductNotFound(vec![item.product_id]));
        };
        let price = product.unit_price(item.variant.as_ref())?;
        if let Some(declared) = item.price.filter(|declared| *declared != price) {
            tracing::warn!(
                user_id = %user.user_id,
                product_id = %product.id,
                %declared,
                catalog = %price,
                "client price differs from catalog; using catalog price"
            );
        }
        lines.push(LineSnapshot {
            product_id: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            price,
            qty: item.qty,
            variant: item
                .variant
                .as_ref()
                .and_then(|key| find_variant(&product.variants, key))
                .map(|v| VariantKey {
                    ram: v.ram.clone(),
                    rom: v.rom.clone(),
                }),
        });
    }

    let discount = match request.discount.into_request() {
        Some(discount_request) => Some(
            resolve_discount(discounts, &discount_request, &settings.discounts, now).await?,
        ),
        None => None,
    };
    let percent = discount
        .as_ref()
        .map(|d| d.percent)
        .unwrap_or(Decimal::ZERO);

    let price_lines: Vec<PriceLine> = lines
        .iter()
        .map(|line| PriceLine {
            unit_price: line.price,
            qty: line.qty,
        })
        .collect();
    let breakdown = calculate_prices(&price_lines, percent, &settings.pricing);
    if !breakdown.fits_storage() {
        return Err(AppError::Validation(format!(
            "order total {} exceeds the maximum of {MAX_STORED_AMOUNT}",
            breakdown.total_before_discount()
        )));
    }

    if let Some(declared) = request
        .total_price
        .filter(|declared| *declared != breakdown.total_price)
    {
        tracing::warn!(
            user_id = %user.user_id,
            %declared,
            computed = %breakdown.total_price,
            "client total differs from server total"
        );
    }

    Ok(OrderDraft {
        user_id: user.user_id,
        lines,
        shipping_address: request.shipping_address,
        payment_method,
        breakdown,
        discount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{CatalogProduct, Variant},
        dto::orders::OrderLineRequest,
        pricing::{CouponRecord, DiscountCatalog, DiscountSelection, DiscountSource, UniversityRecord},
    };
    use rust_decimal_macros::dec;

    fn user() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        }
    }

    fn widget() -> CatalogProduct {
        CatalogProduct {
            id: Uuid::new_v4(),
            name: "Widget".into(),
            image: "/img/widget.png".into(),
            price: dec!(1000),
            variants: Vec::new(),
        }
    }

    fn discounts() -> DiscountCatalog {
        DiscountCatalog {
            coupons: vec![CouponRecord {
                code: "SAVE5".into(),
                discount_percent: 5,
                expiry_date: None,
            }],
            universities: vec![UniversityRecord {
                name: "Example University".into(),
                email_domain: "example.edu".into(),
            }],
        }
    }

    fn request(items: Vec<OrderLineRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            shipping_address: ShippingAddress {
                address: "1 Main St".into(),
                city: "Dhaka".into(),
                postal_code: "1207".into(),
                country: "BD".into(),
            },
            payment_method: "PayPal".into(),
            discount: DiscountSelection::default(),
            total_price: None,
        }
    }

    fn line(product_id: Uuid, qty: i32) -> OrderLineRequest {
        OrderLineRequest {
            product_id,
            qty,
            variant: None,
            price: None,
        }
    }

    #[tokio::test]
    async fn prices_from_catalog_not_client() {
        let product = widget();
        let mut crafted = line(product.id, 2);
        crafted.price = Some(dec!(1));
        let mut req = request(vec![crafted]);
        req.total_price = Some(dec!(5));

        let catalog = vec![product];
        let draft = assemble_order(&user(), req, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap();

        assert_eq!(draft.lines[0].price, dec!(1000));
        assert_eq!(draft.breakdown.items_price, dec!(2000));
        assert_eq!(draft.breakdown.total_price, dec!(2400));
        assert!(draft.discount.is_none());
    }

    #[tokio::test]
    async fn coupon_is_resolved_server_side() {
        let product = widget();
        let mut req = request(vec![line(product.id, 2)]);
        req.discount.coupon_code = Some(" save5 ".into());

        let catalog = vec![product];
        let draft = assemble_order(&user(), req, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap();

        let discount = draft.discount.unwrap();
        assert_eq!(discount.source, DiscountSource::Coupon);
        assert_eq!(draft.breakdown.discount_amount, dec!(120));
        assert_eq!(draft.breakdown.total_price, dec!(2280));
    }

    #[tokio::test]
    async fn asserted_discount_that_fails_blocks_the_order() {
        let product = widget();
        let mut req = request(vec![line(product.id, 1)]);
        req.discount.university_name = Some("Example University".into());
        req.discount.university_email = Some("student@other.edu".into());

        let catalog = vec![product];
        let err = assemble_order(&user(), req, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DiscountNoMatch));
    }

    #[tokio::test]
    async fn rejects_empty_and_non_positive_quantities() {
        let catalog = vec![widget()];
        let err = assemble_order(&user(), request(vec![]), &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyOrder));

        let zero = request(vec![line(catalog[0].id, 0)]);
        let err = assemble_order(&user(), zero, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity { .. }));
    }

    #[tokio::test]
    async fn totals_beyond_storable_money_are_rejected() {
        let catalog = vec![widget()];
        let req = request(vec![line(catalog[0].id, i32::MAX)]);
        let err = assemble_order(&user(), req, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn variant_product_without_variant_is_rejected() {
        let mut product = widget();
        product.variants = vec![
            Variant {
                ram: "8GB".into(),
                rom: "128GB".into(),
                price: dec!(900),
                quantity: 1,
                count_in_stock: 5,
            },
            Variant {
                ram: "12GB".into(),
                rom: "256GB".into(),
                price: dec!(1100),
                quantity: 1,
                count_in_stock: 5,
            },
        ];
        let req = request(vec![line(product.id, 1)]);

        let catalog = vec![product];
        let err = assemble_order(&user(), req, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn one_missing_product_fails_the_whole_order() {
        let product = widget();
        let ghost = Uuid::new_v4();
        let req = request(vec![line(product.id, 1), line(ghost, 1)]);

        let catalog = vec![product];
        let err = assemble_order(&user(), req, &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap_err();
        match err {
            AppError::ProductNotFound(ids) => assert_eq!(ids, vec![ghost]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn variant_lines_use_variant_price() {
        let mut product = widget();
        product.variants = vec![Variant {
            ram: "8GB".into(),
            rom: "256GB".into(),
            price: dec!(1500),
            quantity: 3,
            count_in_stock: 3,
        }];
        let mut item = line(product.id, 1);
        item.variant = Some(VariantKey {
            ram: " 8gb".into(),
            rom: "256GB".into(),
        });

        let catalog = vec![product];
        let draft = assemble_order(&user(), request(vec![item]), &catalog, &discounts(), &Settings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(draft.lines[0].price, dec!(1500));
        assert_eq!(draft.lines[0].variant.as_ref().map(|v| v.ram.as_str()), Some("8GB"));
        assert_eq!(draft.breakdown.tax_price, dec!(225));
    }
}
