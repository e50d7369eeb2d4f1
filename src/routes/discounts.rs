use axum::{Json, Router, extract::State, routing::post};

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    pricing::{DiscountRequest, ResolvedDiscount},
    response::ApiResponse,
    services::discount_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate_discount))
}

#[utoipa::path(
    post,
    path = "/api/discounts/validate",
    request_body = DiscountRequest,
    responses(
        (status = 200, description = "Discount that would apply", body = ApiResponse<ResolvedDiscount>),
        (status = 400, description = "Expired, or name and email do not match"),
        (status = 404, description = "Unknown coupon or university"),
    ),
    security(("bearer_auth" = [])),
    tag = "Discounts"
)]
pub async fn validate_discount(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DiscountRequest>,
) -> AppResult<Json<ApiResponse<ResolvedDiscount>>> {
    let resp = discount_service::validate_discount(&state, &user, payload).await?;
    Ok(Json(resp))
}
