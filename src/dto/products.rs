use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    catalog::{SpecificationsInput, VariantsInput},
    models::Product,
};

/// Full product payload for create and update.
///
/// Specifications may be a list of `{key, value}`, an object, or either of
/// those JSON-encoded in a string; variants a list or a JSON-encoded list.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub brand: String,
    pub category_id: Uuid,
    pub image: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub count_in_stock: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<SpecificationsInput>,
    #[schema(value_type = Option<Object>)]
    pub variants: Option<VariantsInput>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
}
