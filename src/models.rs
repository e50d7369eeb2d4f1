use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    catalog::{Specification, Variant, VariantKey, decode_specifications, decode_variants},
    entity::{
        cart_items, categories, coupons, favorites, order_items, orders, product_reviews,
        products, universities, users,
    },
    error::{AppError, AppResult},
    pricing::{CouponRecord, PriceBreakdown, UniversityRecord},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub image: String,
    pub category_id: Uuid,
    pub price: Decimal,
    pub quantity: i32,
    pub count_in_stock: i32,
    pub specifications: Vec<Specification>,
    pub variants: Vec<Variant>,
    pub rating: Decimal,
    pub num_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<products::Model> for Product {
    type Error = AppError;

    fn try_from(model: products::Model) -> AppResult<Self> {
        Ok(Self {
            specifications: decode_specifications(&model.specifications)?,
            variants: decode_variants(&model.variants)?,
            id: model.id,
            name: model.name,
            description: model.description,
            brand: model.brand,
            image: model.image,
            category_id: model.category_id,
            price: model.price,
            quantity: model.quantity,
            count_in_stock: model.count_in_stock,
            rating: model.rating,
            num_reviews: model.num_reviews,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

pub fn products_from_models(models: Vec<products::Model>) -> AppResult<Vec<Product>> {
    models.into_iter().map(Product::try_from).collect()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<product_reviews::Model> for Review {
    fn from(model: product_reviews::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            name: model.name,
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Favorite {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<favorites::Model> for Favorite {
    fn from(model: favorites::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub variant: Option<VariantKey>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        let variant = (!model.variant_ram.is_empty() || !model.variant_rom.is_empty()).then(|| {
            VariantKey {
                ram: model.variant_ram,
                rom: model.variant_rom,
            }
        });
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            variant,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: i32,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<coupons::Model> for Coupon {
    fn from(model: coupons::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            discount_percent: model.discount_percent,
            expiry_date: model.expiry_date.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<coupons::Model> for CouponRecord {
    fn from(model: coupons::Model) -> Self {
        Self {
            code: model.code,
            discount_percent: model.discount_percent,
            expiry_date: model.expiry_date.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct University {
    pub id: Uuid,
    pub name: String,
    pub email_domain: String,
    pub created_at: DateTime<Utc>,
}

impl From<universities::Model> for University {
    fn from(model: universities::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email_domain: model.email_domain,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<universities::Model> for UniversityRecord {
    fn from(model: universities::Model) -> Self {
        Self {
            name: model.name,
            email_domain: model.email_domain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("address", &self.address),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "shipping address {name} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Opaque capture record reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentConfirmation {
    pub id: String,
    pub status: String,
    pub update_time: Option<String>,
    pub email_address: Option<String>,
    /// Amount the provider reports as charged, when it reports one.
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub discount_source: Option<String>,
    pub coupon_code: Option<String>,
    pub university_name: Option<String>,
    pub university_email: Option<String>,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentConfirmation>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown {
            items_price: self.items_price,
            shipping_price: self.shipping_price,
            tax_price: self.tax_price,
            discount_percent: self.discount_percent,
            discount_amount: self.discount_amount,
            total_price: self.total_price,
        }
    }
}

impl TryFrom<orders::Model> for Order {
    type Error = AppError;

    fn try_from(model: orders::Model) -> AppResult<Self> {
        let shipping_address = serde_json::from_value(model.shipping_address).map_err(|err| {
            AppError::Internal(anyhow::anyhow!("stored shipping address is corrupt: {err}"))
        })?;
        let payment_result = model
            .payment_result
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| {
                AppError::Internal(anyhow::anyhow!("stored payment result is corrupt: {err}"))
            })?;
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            shipping_address,
            payment_method: model.payment_method,
            items_price: model.items_price,
            shipping_price: model.shipping_price,
            tax_price: model.tax_price,
            discount_source: model.discount_source,
            coupon_code: model.coupon_code,
            university_name: model.university_name,
            university_email: model.university_email,
            discount_percent: model.discount_percent,
            discount_amount: model.discount_amount,
            total_price: model.total_price,
            is_paid: model.is_paid,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            payment_result,
            is_delivered: model.is_delivered,
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

pub fn orders_from_models(models: Vec<orders::Model>) -> AppResult<Vec<Order>> {
    models.into_iter().map(Order::try_from).collect()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub qty: i32,
    pub variant: Option<VariantKey>,
    pub created_at: DateTime<Utc>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        let variant = match (model.variant_ram, model.variant_rom) {
            (Some(ram), Some(rom)) => Some(VariantKey { ram, rom }),
            _ => None,
        };
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            name: model.name,
            image: model.image,
            price: model.price,
            qty: model.qty,
            variant,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
