use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{
        discounts::{CouponList, CreateCouponRequest, CreateUniversityRequest, UniversityList},
        orders::{OrderCount, OrderList, OrderWithItems, SalesByDate, SalesTotal},
        products::CreateCategoryRequest,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Coupon, University},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{admin_service, discount_service, order_service, product_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/total", get(count_orders))
        .route("/orders/sales", get(total_sales))
        .route("/orders/sales-by-date", get(sales_by_date))
        .route("/orders/{id}", get(get_order_admin))
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/universities", get(list_universities).post(create_university))
        .route("/categories", axum::routing::post(create_category))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("is_paid" = Option<bool>, Query, description = "Filter by payment"),
        ("is_delivered" = Option<bool>, Query, description = "Filter by delivery"),
        ("sort_order" = Option<String>, Query, description = "asc | desc, default desc"),
    ),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    ensure_admin(&user)?;
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/total",
    responses(
        (status = 200, description = "Number of orders", body = ApiResponse<OrderCount>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn count_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderCount>>> {
    let resp = admin_service::count_orders(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/sales",
    responses(
        (status = 200, description = "Sum of all order totals", body = ApiResponse<SalesTotal>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn total_sales(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SalesTotal>>> {
    let resp = admin_service::total_sales(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/sales-by-date",
    responses(
        (status = 200, description = "Paid totals per day", body = ApiResponse<SalesByDate>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn sales_by_date(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SalesByDate>>> {
    let resp = admin_service::sales_by_date(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/coupons",
    responses(
        (status = 200, description = "All coupons", body = ApiResponse<CouponList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = discount_service::list_coupons(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon added", body = ApiResponse<Coupon>),
        (status = 409, description = "Code already exists"),
        (status = 422, description = "Invalid code or percent"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCouponRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Coupon>>)> {
    let resp = discount_service::create_coupon(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/admin/universities",
    responses(
        (status = 200, description = "All universities", body = ApiResponse<UniversityList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_universities(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UniversityList>>> {
    let resp = discount_service::list_universities(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/universities",
    request_body = CreateUniversityRequest,
    responses(
        (status = 201, description = "University added", body = ApiResponse<University>),
        (status = 409, description = "Email domain already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_university(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateUniversityRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<University>>)> {
    let resp = discount_service::create_university(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 409, description = "Category already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let resp = product_service::create_category(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
