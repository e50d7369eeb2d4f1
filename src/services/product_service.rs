use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::dto::products::{CreateCategoryRequest, CreateReviewRequest, ProductList, ProductRequest};
use crate::{
    audit,
    catalog::{Specification, StockFields, Variant, resolve_stock},
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
        product_reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        products::{ActiveModel, Column, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, Review, products_from_models},
    pricing::round_money,
    response::{ApiResponse, Meta},
    routes::params::{PRODUCT_PAGE_SIZE, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const TOP_PRODUCTS: u64 = 4;
const NEW_PRODUCTS: u64 = 5;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize_with(PRODUCT_PAGE_SIZE);
    let mut condition = Condition::all();

    if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Name).ilike(format!("%{}%", keyword)));
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Rating => Column::Rating,
    };
    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let data = ProductList {
        items: products_from_models(models)?,
    };
    Ok(ApiResponse::success(
        "Products",
        data,
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", Product::try_from(model)?, None))
}

pub async fn top_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let models = Products::find()
        .order_by_desc(Column::Rating)
        .order_by_desc(Column::NumReviews)
        .limit(TOP_PRODUCTS)
        .all(&state.orm)
        .await?;
    let data = ProductList {
        items: products_from_models(models)?,
    };
    Ok(ApiResponse::success("Top products", data, Some(Meta::empty())))
}

pub async fn new_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let models = Products::find()
        .order_by_desc(Column::CreatedAt)
        .limit(NEW_PRODUCTS)
        .all(&state.orm)
        .await?;
    let data = ProductList {
        items: products_from_models(models)?,
    };
    Ok(ApiResponse::success("New products", data, Some(Meta::empty())))
}

/// Validated, canonical product fields ready to be written.
struct ProductFields {
    name: String,
    description: String,
    brand: String,
    image: String,
    category_id: Uuid,
    stock: StockFields,
    specifications: Vec<Specification>,
    variants: Vec<Variant>,
}

impl ProductFields {
    async fn parse<C>(conn: &C, payload: ProductRequest) -> AppResult<Self>
    where
        C: ConnectionTrait,
    {
        let name = payload.name.trim().to_string();
        let brand = payload.brand.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        if brand.is_empty() {
            return Err(AppError::Validation("brand is required".into()));
        }

        let specifications = match payload.specifications {
            Some(input) => input.into_canonical()?,
            None => Vec::new(),
        };
        let variants = match payload.variants {
            Some(input) => input.into_canonical()?,
            None => Vec::new(),
        };
        let stock = resolve_stock(
            &variants,
            payload.price,
            payload.quantity,
            payload.count_in_stock,
        )?;

        Categories::find_by_id(payload.category_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::Validation("category does not exist".into()))?;

        Ok(Self {
            name,
            description: payload.description.trim().to_string(),
            brand,
            image: payload.image.unwrap_or_default(),
            category_id: payload.category_id,
            stock,
            specifications,
            variants,
        })
    }

    fn apply(self, active: &mut ActiveModel) -> AppResult<()> {
        let specifications = serde_json::to_value(&self.specifications)
            .map_err(|err| AppError::Internal(err.into()))?;
        let variants =
            serde_json::to_value(&self.variants).map_err(|err| AppError::Internal(err.into()))?;
        active.name = Set(self.name);
        active.description = Set(self.description);
        active.brand = Set(self.brand);
        active.image = Set(self.image);
        active.category_id = Set(self.category_id);
        active.price = Set(round_money(self.stock.price));
        active.quantity = Set(self.stock.quantity);
        active.count_in_stock = Set(self.stock.count_in_stock);
        active.specifications = Set(specifications);
        active.variants = Set(variants);
        Ok(())
    }
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: ProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let fields = ProductFields::parse(&state.orm, payload).await?;

    let mut active = ActiveModel {
        id: Set(Uuid::new_v4()),
        rating: Set(Decimal::ZERO),
        num_reviews: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
        ..Default::default()
    };
    fields.apply(&mut active)?;
    let product = active.insert(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::try_from(product)?,
        Some(Meta::empty()),
    ))
}

/// Full replacement; rating and reviews are kept.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let fields = ProductFields::parse(&state.orm, payload).await?;

    let mut active: ActiveModel = existing.into();
    fields.apply(&mut active)?;
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::try_from(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        state,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(product_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let already = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    if already.is_some() {
        return Err(AppError::Conflict("product already reviewed".into()));
    }

    let author = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        user_id: Set(user.user_id),
        name: Set(author.username),
        rating: Set(payload.rating),
        comment: Set(payload.comment.trim().to_string()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .filter(ReviewCol::ProductId.eq(product_id))
        .into_tuple()
        .all(&txn)
        .await?;
    let num_reviews = ratings.len() as i32;
    let rating = average_rating(&ratings);

    let mut active: ActiveModel = product.into();
    active.rating = Set(rating);
    active.num_reviews = Set(num_reviews);
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;
    txn.commit().await?;

    tracing::debug!(%product_id, %rating, num_reviews, "product rating updated");
    audit::record(
        state,
        user.user_id,
        "review_create",
        "product_reviews",
        serde_json::json!({ "product_id": product_id, "rating": payload.rating }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review added",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

fn average_rating(ratings: &[i32]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::ZERO;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    round_money(Decimal::from(sum) / Decimal::from(ratings.len() as i64))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<Vec<Category>>> {
    let categories = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(ApiResponse::success("Categories", categories, Some(Meta::empty())))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("category name is required".into()));
    }

    let exists = Categories::find()
        .filter(Expr::col(CategoryCol::Name).ilike(name.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict(format!("category {name} already exists")));
    }

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        user.user_id,
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn average_rating_rounds_to_two_places() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
        assert_eq!(average_rating(&[5, 4, 4]), dec!(4.33));
        assert_eq!(average_rating(&[5, 4]), dec!(4.50));
    }
}
