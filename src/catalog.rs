//! Product attribute parsing and catalog lookups.
//!
//! Specifications and variants arrive in several shapes (a JSON-encoded string,
//! a list, or for specifications a plain object). They are normalized once here
//! into ordered lists; anything else is rejected.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Specification {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub ram: String,
    pub rom: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(alias = "countInStock")]
    pub count_in_stock: i32,
}

/// RAM/ROM signature selecting one variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct VariantKey {
    pub ram: String,
    pub rom: String,
}

impl VariantKey {
    pub fn matches(&self, variant: &Variant) -> bool {
        self.ram.trim().eq_ignore_ascii_case(variant.ram.trim())
            && self.rom.trim().eq_ignore_ascii_case(variant.rom.trim())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SpecificationsInput {
    List(Vec<Specification>),
    Object(Map<String, Value>),
    Encoded(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariantsInput {
    List(Vec<Variant>),
    Encoded(String),
}

impl SpecificationsInput {
    pub fn into_canonical(self) -> AppResult<Vec<Specification>> {
        let specs = match self {
            SpecificationsInput::List(list) => list,
            SpecificationsInput::Object(map) => object_to_specs(map)?,
            SpecificationsInput::Encoded(raw) => {
                let Some(value) = decode_embedded(&raw, "specifications")? else {
                    return Ok(Vec::new());
                };
                match serde_json::from_value::<SpecificationsInput>(value) {
                    Ok(SpecificationsInput::Encoded(_)) | Err(_) => {
                        return Err(AppError::Validation(
                            "specifications must be a list of {key, value} or an object".into(),
                        ));
                    }
                    Ok(inner) => return inner.into_canonical(),
                }
            }
        };

        specs
            .into_iter()
            .map(|spec| {
                let key = spec.key.trim().to_string();
                let value = spec.value.trim().to_string();
                if key.is_empty() || value.is_empty() {
                    return Err(AppError::Validation(
                        "specification key and value are required".into(),
                    ));
                }
                Ok(Specification { key, value })
            })
            .collect()
    }
}

impl VariantsInput {
    pub fn into_canonical(self) -> AppResult<Vec<Variant>> {
        let variants = match self {
            VariantsInput::List(list) => list,
            VariantsInput::Encoded(raw) => {
                let Some(value) = decode_embedded(&raw, "variants")? else {
                    return Ok(Vec::new());
                };
                serde_json::from_value::<Vec<Variant>>(value).map_err(|err| {
                    AppError::Validation(format!("variants must be a list of variants: {err}"))
                })?
            }
        };

        let mut canonical: Vec<Variant> = Vec::with_capacity(variants.len());
        for variant in variants {
            let variant = Variant {
                ram: variant.ram.trim().to_string(),
                rom: variant.rom.trim().to_string(),
                ..variant
            };
            if variant.ram.is_empty() || variant.rom.is_empty() {
                return Err(AppError::Validation(
                    "all variant fields (ram, rom, price, quantity, count_in_stock) are required"
                        .into(),
                ));
            }
            if variant.price.is_sign_negative() || variant.quantity < 0 || variant.count_in_stock < 0
            {
                return Err(AppError::Validation(
                    "variant price and stock must not be negative".into(),
                ));
            }
            let key = VariantKey {
                ram: variant.ram.clone(),
                rom: variant.rom.clone(),
            };
            if canonical.iter().any(|existing| key.matches(existing)) {
                return Err(AppError::Validation(format!(
                    "duplicate variant {}/{}",
                    variant.ram, variant.rom
                )));
            }
            canonical.push(variant);
        }

        if canonical.first().is_some_and(|first| first.price.is_zero()) {
            return Err(AppError::Validation("first variant price is required".into()));
        }
        Ok(canonical)
    }
}

fn decode_embedded(raw: &str, field: &str) -> AppResult<Option<Value>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|err| AppError::Validation(format!("{field} is not valid JSON: {err}")))
}

fn object_to_specs(map: Map<String, Value>) -> AppResult<Vec<Specification>> {
    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok(Specification { key, value }),
            Value::Number(n) => Ok(Specification {
                key,
                value: n.to_string(),
            }),
            Value::Bool(b) => Ok(Specification {
                key,
                value: b.to_string(),
            }),
            _ => Err(AppError::Validation(format!(
                "specification {key} must have a scalar value"
            ))),
        })
        .collect()
}

/// Root price/stock fields of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockFields {
    pub price: Decimal,
    pub quantity: i32,
    pub count_in_stock: i32,
}

/// With variants the root fields come from `variants[0]` and root inputs are
/// ignored; without variants all three root fields are required.
pub fn resolve_stock(
    variants: &[Variant],
    price: Option<Decimal>,
    quantity: Option<i32>,
    count_in_stock: Option<i32>,
) -> AppResult<StockFields> {
    if let Some(first) = variants.first() {
        return Ok(StockFields {
            price: first.price,
            quantity: first.quantity,
            count_in_stock: first.count_in_stock,
        });
    }

    let price = price
        .filter(|p| p.is_sign_positive() && !p.is_zero())
        .ok_or_else(|| AppError::Validation("price is required".into()))?;
    let quantity = quantity
        .filter(|q| *q >= 0)
        .ok_or_else(|| AppError::Validation("quantity is required".into()))?;
    let count_in_stock = count_in_stock
        .filter(|c| *c >= 0)
        .ok_or_else(|| AppError::Validation("count_in_stock is required".into()))?;

    Ok(StockFields {
        price,
        quantity,
        count_in_stock,
    })
}

pub fn find_variant<'a>(variants: &'a [Variant], key: &VariantKey) -> Option<&'a Variant> {
    variants.iter().find(|variant| key.matches(variant))
}

/// Authoritative product data used to price an order line.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub variants: Vec<Variant>,
}

impl CatalogProduct {
    /// Unit price for the requested variant. Only products without variants
    /// may be ordered at the root price.
    pub fn unit_price(&self, variant: Option<&VariantKey>) -> AppResult<Decimal> {
        match variant {
            None if !self.variants.is_empty() => Err(AppError::Validation(format!(
                "product {} requires a variant",
                self.id
            ))),
            None => Ok(self.price),
            Some(key) => find_variant(&self.variants, key)
                .map(|v| v.price)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "product {} has no variant {}/{}",
                        self.id, key.ram, key.rom
                    ))
                }),
        }
    }
}

impl TryFrom<ProductModel> for CatalogProduct {
    type Error = AppError;

    fn try_from(model: ProductModel) -> AppResult<Self> {
        Ok(Self {
            variants: decode_variants(&model.variants)?,
            id: model.id,
            name: model.name,
            image: model.image,
            price: model.price,
        })
    }
}

pub fn decode_variants(value: &Value) -> AppResult<Vec<Variant>> {
    serde_json::from_value(value.clone())
        .map_err(|err| AppError::Internal(anyhow::anyhow!("stored variants are corrupt: {err}")))
}

pub fn decode_specifications(value: &Value) -> AppResult<Vec<Specification>> {
    serde_json::from_value(value.clone()).map_err(|err| {
        AppError::Internal(anyhow::anyhow!("stored specifications are corrupt: {err}"))
    })
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns only the ids that exist; callers detect missing ones.
    async fn find_products_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<CatalogProduct>>;
}

pub struct OrmCatalog<'a, C> {
    conn: &'a C,
}

impl<'a, C> OrmCatalog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> Catalog for OrmCatalog<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_products_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<CatalogProduct>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Products::find()
            .filter(ProdCol::Id.is_in(ids.iter().copied()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(CatalogProduct::try_from)
            .collect()
    }
}

/// Fixed product list; used by tests and offline previews.
#[async_trait]
impl Catalog for Vec<CatalogProduct> {
    async fn find_products_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<CatalogProduct>> {
        Ok(self
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn parse_specs(value: Value) -> AppResult<Vec<Specification>> {
        serde_json::from_value::<SpecificationsInput>(value)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .into_canonical()
    }

    #[test]
    fn specifications_accept_every_shape_in_order() {
        let expected = vec![
            Specification {
                key: "Display".into(),
                value: "6.1in".into(),
            },
            Specification {
                key: "Battery".into(),
                value: "4000".into(),
            },
        ];

        let list = json!([{"key": "Display", "value": "6.1in"}, {"key": "Battery", "value": "4000"}]);
        let object = json!({"Display": "6.1in", "Battery": 4000});
        let encoded = json!(r#"[{"key":"Display","value":"6.1in"},{"key":"Battery","value":"4000"}]"#);
        let encoded_object = json!(r#"{"Display":"6.1in","Battery":"4000"}"#);

        for shape in [list, object, encoded, encoded_object] {
            assert_eq!(parse_specs(shape).unwrap(), expected);
        }
    }

    #[test]
    fn specifications_reject_unparseable_input() {
        assert!(parse_specs(json!("not json")).is_err());
        assert!(parse_specs(json!(r#""nested""#)).is_err());
        assert!(parse_specs(json!({"Display": {"size": 6}})).is_err());
        assert!(parse_specs(json!([{"key": "", "value": "x"}])).is_err());
        assert!(parse_specs(json!(42)).is_err());
    }

    #[test]
    fn variants_parse_from_string_and_reject_duplicates() {
        let raw = r#"[{"ram":"8GB","rom":"128GB","price":"900","quantity":3,"countInStock":3}]"#;
        let variants = VariantsInput::Encoded(raw.into()).into_canonical().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].price, dec!(900));

        let dup = VariantsInput::List(vec![variants[0].clone(), variants[0].clone()]);
        assert!(matches!(dup.into_canonical(), Err(AppError::Validation(_))));
    }

    #[test]
    fn root_stock_derives_from_first_variant() {
        let variants = vec![Variant {
            ram: "8GB".into(),
            rom: "256GB".into(),
            price: dec!(1200),
            quantity: 4,
            count_in_stock: 2,
        }];
        let stock = resolve_stock(&variants, None, None, None).unwrap();
        assert_eq!(stock.price, dec!(1200));
        assert_eq!(stock.count_in_stock, 2);

        assert!(resolve_stock(&[], Some(dec!(10)), None, Some(1)).is_err());
        let plain = resolve_stock(&[], Some(dec!(10)), Some(5), Some(5)).unwrap();
        assert_eq!(plain.quantity, 5);
    }

    #[test]
    fn unit_price_uses_matching_variant() {
        let product = CatalogProduct {
            id: Uuid::new_v4(),
            name: "Phone".into(),
            image: String::new(),
            price: dec!(900),
            variants: vec![
                Variant {
                    ram: "8GB".into(),
                    rom: "128GB".into(),
                    price: dec!(900),
                    quantity: 1,
                    count_in_stock: 1,
                },
                Variant {
                    ram: "12GB".into(),
                    rom: "256GB".into(),
                    price: dec!(1100),
                    quantity: 1,
                    count_in_stock: 1,
                },
            ],
        };
        let key = VariantKey {
            ram: "12gb".into(),
            rom: "256GB ".into(),
        };
        assert_eq!(product.unit_price(Some(&key)).unwrap(), dec!(1100));
        assert!(matches!(
            product.unit_price(None),
            Err(AppError::Validation(_))
        ));

        let missing = VariantKey {
            ram: "4GB".into(),
            rom: "64GB".into(),
        };
        assert!(product.unit_price(Some(&missing)).is_err());
    }
}
