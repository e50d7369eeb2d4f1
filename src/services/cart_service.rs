use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use uuid::Uuid;

use crate::{
    audit,
    catalog::{decode_variants, find_variant},
    dto::cart::{AddToCartRequest, CartItemDto, CartList},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .find_also_related(Products)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        // FK is cascading, but a concurrent delete can still race the join.
        let Some(product) = product else { continue };
        items.push(CartItemDto {
            item: CartItem::from(item),
            product: Product::try_from(product)?,
        });
    }

    Ok(ApiResponse::success(
        "OK",
        CartList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Sets the quantity of the (product, variant) line, creating it if needed.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::InvalidQuantity {
            product_id: payload.product_id,
        });
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::ProductNotFound(vec![payload.product_id]))?;

    let variants = decode_variants(&product.variants)?;
    let (ram, rom) = match &payload.variant {
        Some(key) => {
            let variant = find_variant(&variants, key).ok_or_else(|| {
                AppError::Validation(format!("product has no variant {}/{}", key.ram, key.rom))
            })?;
            (variant.ram.clone(), variant.rom.clone())
        }
        None if !variants.is_empty() => {
            return Err(AppError::Validation(
                "variant is required for this product".into(),
            ));
        }
        None => (String::new(), String::new()),
    };

    // Upsert on the line's unique key; last write wins.
    let now = Utc::now();
    let line = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        variant_ram: Set(ram),
        variant_rom: Set(rom),
        quantity: Set(payload.quantity),
        created_at: NotSet,
        updated_at: Set(now.into()),
    };
    let item = CartItems::insert(line)
        .on_conflict(
            OnConflict::columns([
                CartCol::UserId,
                CartCol::ProductId,
                CartCol::VariantRam,
                CartCol::VariantRom,
            ])
            .update_columns([CartCol::Quantity, CartCol::UpdatedAt])
            .to_owned(),
        )
        .exec_with_returning(&state.orm)
        .await?;

    audit::record(
        state,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("OK", CartItem::from(item), None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let item = CartItems::find_by_id(item_id)
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let product_id = item.product_id;
    item.delete(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "item_id": item_id, "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
