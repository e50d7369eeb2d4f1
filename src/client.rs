//! Client-side checkout state: cart, favorites, shipping address and payment
//! method, persisted through a [`CacheStore`].
//!
//! Prices here are display values only. [`ClientCache::preview`] runs the same
//! calculator the server uses, but the server reprices every order.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    catalog::VariantKey,
    dto::orders::{CreateOrderRequest, OrderLineRequest},
    models::ShippingAddress,
    pricing::{DiscountSelection, PriceBreakdown, PriceLine, PricingRules, calculate_prices},
};

pub const DEFAULT_PAYMENT_METHOD: &str = "PayPal";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is required before checkout")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub unit_price: Decimal,
    pub qty: i32,
    pub variant: Option<VariantKey>,
}

impl CartLine {
    fn same_line(&self, product_id: Uuid, variant: Option<&VariantKey>) -> bool {
        self.product_id == product_id && self.variant.as_ref() == variant
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCache {
    #[serde(default)]
    pub cart: Vec<CartLine>,
    #[serde(default)]
    pub favorites: Vec<FavoriteEntry>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_payment_method() -> String {
    DEFAULT_PAYMENT_METHOD.to_string()
}

impl Default for ClientCache {
    fn default() -> Self {
        Self {
            cart: Vec::new(),
            favorites: Vec::new(),
            shipping_address: None,
            payment_method: default_payment_method(),
        }
    }
}

impl ClientCache {
    /// Replaces the quantity of an existing (product, variant) line or appends
    /// a new one.
    pub fn upsert_cart_line(&mut self, line: CartLine) {
        match self
            .cart
            .iter_mut()
            .find(|x| x.same_line(line.product_id, line.variant.as_ref()))
        {
            Some(existing) => existing.qty = line.qty,
            None => self.cart.push(line),
        }
    }

    pub fn remove_cart_line(&mut self, product_id: Uuid, variant: Option<&VariantKey>) -> bool {
        let before = self.cart.len();
        self.cart.retain(|x| !x.same_line(product_id, variant));
        self.cart.len() != before
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    /// Adds the product if absent, removes it otherwise. Returns whether it is
    /// now a favorite.
    pub fn toggle_favorite(&mut self, entry: FavoriteEntry) -> bool {
        if let Some(pos) = self
            .favorites
            .iter()
            .position(|f| f.product_id == entry.product_id)
        {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(entry);
            true
        }
    }

    pub fn is_favorite(&self, product_id: Uuid) -> bool {
        self.favorites.iter().any(|f| f.product_id == product_id)
    }

    pub fn item_count(&self) -> i32 {
        self.cart.iter().map(|l| l.qty).sum()
    }

    pub fn preview(&self, rules: &PricingRules, discount_percent: Decimal) -> PriceBreakdown {
        let lines: Vec<PriceLine> = self
            .cart
            .iter()
            .map(|l| PriceLine {
                unit_price: l.unit_price,
                qty: l.qty,
            })
            .collect();
        calculate_prices(&lines, discount_percent, rules)
    }

    /// Builds the order submission. Displayed prices ride along for the
    /// server's mismatch logging only.
    pub fn checkout_request(
        &self,
        discount: DiscountSelection,
        rules: &PricingRules,
        discount_percent: Decimal,
    ) -> Result<CreateOrderRequest, CacheError> {
        if self.cart.is_empty() {
            return Err(CacheError::Missing("a cart item"));
        }
        let shipping_address = self
            .shipping_address
            .clone()
            .ok_or(CacheError::Missing("shipping address"))?;

        let items = self
            .cart
            .iter()
            .map(|l| OrderLineRequest {
                product_id: l.product_id,
                qty: l.qty,
                variant: l.variant.clone(),
                price: Some(l.unit_price),
            })
            .collect();

        Ok(CreateOrderRequest {
            items,
            shipping_address,
            payment_method: self.payment_method.clone(),
            discount,
            total_price: Some(self.preview(rules, discount_percent).total_price),
        })
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> Result<ClientCache, CacheError>;
    async fn save(&self, cache: &ClientCache) -> Result<(), CacheError>;
}

/// Pretty-printed JSON file; a missing file loads as an empty cache.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheStore for JsonFileStore {
    async fn load(&self) -> Result<ClientCache, CacheError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ClientCache::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, cache: &ClientCache) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(cache)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<ClientCache>>,
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self) -> Result<ClientCache, CacheError> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone().unwrap_or_default())
    }

    async fn save(&self, cache: &ClientCache) -> Result<(), CacheError> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(cache.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(product_id: Uuid, qty: i32, variant: Option<(&str, &str)>) -> CartLine {
        CartLine {
            product_id,
            name: "Phone".into(),
            image: String::new(),
            unit_price: dec!(1000),
            qty,
            variant: variant.map(|(ram, rom)| VariantKey {
                ram: ram.into(),
                rom: rom.into(),
            }),
        }
    }

    #[test]
    fn cart_upsert_is_keyed_by_product_and_variant() {
        let id = Uuid::new_v4();
        let mut cache = ClientCache::default();
        cache.upsert_cart_line(line(id, 1, Some(("8GB", "128GB"))));
        cache.upsert_cart_line(line(id, 1, Some(("12GB", "256GB"))));
        cache.upsert_cart_line(line(id, 3, Some(("8GB", "128GB"))));

        assert_eq!(cache.cart.len(), 2);
        assert_eq!(cache.cart[0].qty, 3);
        assert_eq!(cache.item_count(), 4);

        let small = VariantKey {
            ram: "8GB".into(),
            rom: "128GB".into(),
        };
        assert!(cache.remove_cart_line(id, Some(&small)));
        assert_eq!(cache.cart.len(), 1);
    }

    #[test]
    fn toggling_favorite_twice_removes_it() {
        let mut cache = ClientCache::default();
        let entry = FavoriteEntry {
            product_id: Uuid::new_v4(),
            name: "Phone".into(),
            image: String::new(),
            price: dec!(10),
        };
        assert!(cache.toggle_favorite(entry.clone()));
        assert!(cache.is_favorite(entry.product_id));
        assert!(!cache.toggle_favorite(entry.clone()));
        assert!(!cache.is_favorite(entry.product_id));
    }

    #[test]
    fn preview_matches_server_calculator() {
        let mut cache = ClientCache::default();
        cache.upsert_cart_line(line(Uuid::new_v4(), 2, None));
        let breakdown = cache.preview(&PricingRules::default(), dec!(5));
        assert_eq!(breakdown.items_price, dec!(2000.00));
        assert_eq!(breakdown.total_price, dec!(2280.00));
    }

    #[test]
    fn checkout_needs_items_and_address() {
        let mut cache = ClientCache::default();
        let rules = PricingRules::default();
        assert!(matches!(
            cache.checkout_request(DiscountSelection::default(), &rules, Decimal::ZERO),
            Err(CacheError::Missing(_))
        ));

        cache.upsert_cart_line(line(Uuid::new_v4(), 1, None));
        assert!(matches!(
            cache.checkout_request(DiscountSelection::default(), &rules, Decimal::ZERO),
            Err(CacheError::Missing("shipping address"))
        ));

        cache.shipping_address = Some(ShippingAddress {
            address: "1 Road".into(),
            city: "Dhaka".into(),
            postal_code: "1000".into(),
            country: "BD".into(),
        });
        let request = cache
            .checkout_request(DiscountSelection::default(), &rules, Decimal::ZERO)
            .unwrap();
        assert_eq!(request.payment_method, DEFAULT_PAYMENT_METHOD);
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.total_price, Some(dec!(1250.00)));
    }

    #[tokio::test]
    async fn json_file_store_round_trips_and_tolerates_missing_file() {
        let path = std::env::temp_dir()
            .join(format!("storefront-cache-{}", Uuid::new_v4()))
            .join("cache.json");
        let store = JsonFileStore::new(&path);

        assert_eq!(store.load().await.unwrap(), ClientCache::default());

        let mut cache = ClientCache::default();
        cache.upsert_cart_line(line(Uuid::new_v4(), 2, Some(("8GB", "128GB"))));
        cache.payment_method = "Cash".into();
        store.save(&cache).await.unwrap();
        assert_eq!(store.load().await.unwrap(), cache);

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn memory_store_starts_empty() {
        let store = MemoryStore::default();
        assert_eq!(store.load().await.unwrap(), ClientCache::default());
        let mut cache = ClientCache::default();
        cache.clear_cart();
        cache.payment_method = "Cash".into();
        store.save(&cache).await.unwrap();
        assert_eq!(store.load().await.unwrap().payment_method, "Cash");
    }
}
