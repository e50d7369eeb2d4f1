use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{Condition, EntityTrait, PaginatorTrait};
use sqlx::FromRow;

use crate::{
    dto::orders::{DailySales, OrderCount, OrderList, SalesByDate, SalesTotal},
    entity::orders::Entity as Orders,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_service::list_orders_where,
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_orders_where(state, Condition::all(), query).await
}

pub async fn count_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderCount>> {
    ensure_admin(user)?;
    let total_orders = Orders::find().count(&state.orm).await?;
    Ok(ApiResponse::success(
        "Order count",
        OrderCount { total_orders },
        Some(Meta::empty()),
    ))
}

/// Sum of `total_price` over every order, paid or not.
pub async fn total_sales(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<SalesTotal>> {
    ensure_admin(user)?;
    let (total_sales,): (Decimal,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_price), 0)::NUMERIC(14, 2) FROM orders",
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Total sales",
        SalesTotal { total_sales },
        Some(Meta::empty()),
    ))
}

#[derive(FromRow)]
struct DailySalesRow {
    date: NaiveDate,
    total_sales: Decimal,
}

/// Paid order totals grouped by the UTC day they were paid.
pub async fn sales_by_date(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SalesByDate>> {
    ensure_admin(user)?;
    let rows = sqlx::query_as::<_, DailySalesRow>(
        r#"
        SELECT (paid_at AT TIME ZONE 'UTC')::date AS date,
               SUM(total_price)::NUMERIC(14, 2) AS total_sales
        FROM orders
        WHERE is_paid AND paid_at IS NOT NULL
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| DailySales {
            date: row.date,
            total_sales: row.total_sales,
        })
        .collect();
    Ok(ApiResponse::success(
        "Sales by date",
        SalesByDate { items },
        Some(Meta::empty()),
    ))
}
