use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::discounts::{CouponList, CreateCouponRequest, CreateUniversityRequest, UniversityList},
    entity::{
        coupons::{ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons},
        universities::{
            ActiveModel as UniversityActive, Column as UniversityCol, Entity as Universities,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, University},
    pricing::{
        CouponRecord, DiscountBook, DiscountRequest, ResolvedDiscount, UniversityRecord,
        discount::{normalize_coupon_code, normalize_email_domain, normalize_university_name},
        resolve_discount,
    },
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Coupon and university lookups against the database.
pub struct OrmDiscountBook<'a, C> {
    conn: &'a C,
}

impl<'a, C> OrmDiscountBook<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> DiscountBook for OrmDiscountBook<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_coupon_by_code(&self, code: &str) -> AppResult<Option<CouponRecord>> {
        let coupon = Coupons::find()
            .filter(CouponCol::Code.eq(code))
            .one(self.conn)
            .await?;
        Ok(coupon.map(CouponRecord::from))
    }

    async fn find_university(
        &self,
        name: &str,
        email_domain: &str,
    ) -> AppResult<Option<UniversityRecord>> {
        // email_domain is unique, so at most one candidate needs the name check.
        let university = Universities::find()
            .filter(UniversityCol::EmailDomain.eq(email_domain))
            .one(self.conn)
            .await?
            .filter(|u| normalize_university_name(&u.name) == name);
        Ok(university.map(UniversityRecord::from))
    }
}

/// Best-effort check for checkout feedback; order creation resolves again.
pub async fn validate_discount(
    state: &AppState,
    user: &AuthUser,
    request: DiscountRequest,
) -> AppResult<ApiResponse<ResolvedDiscount>> {
    let book = OrmDiscountBook::new(&state.orm);
    let resolved = resolve_discount(&book, &request, &state.settings.discounts, Utc::now()).await?;
    tracing::debug!(
        user_id = %user.user_id,
        discount_source = resolved.source.as_str(),
        percent = %resolved.percent,
        "discount preview resolved"
    );
    Ok(ApiResponse::success("Discount applied", resolved, Some(Meta::empty())))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let code = normalize_coupon_code(&payload.code);
    if code.is_empty() {
        return Err(AppError::Validation("coupon code is required".into()));
    }
    if !(1..=100).contains(&payload.discount_percent) {
        return Err(AppError::Validation(
            "discount_percent must be between 1 and 100".into(),
        ));
    }

    let existing = Coupons::find()
        .filter(CouponCol::Code.eq(code.as_str()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("coupon code already exists".into()));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        discount_percent: Set(payload.discount_percent),
        expiry_date: Set(payload.expiry_date.map(Into::into)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        user.user_id,
        "coupon_create",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon added",
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let items = Coupons::find()
        .order_by_asc(CouponCol::Code)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Coupon::from)
        .collect();
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(Meta::empty())))
}

pub async fn create_university(
    state: &AppState,
    user: &AuthUser,
    payload: CreateUniversityRequest,
) -> AppResult<ApiResponse<University>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    let email_domain = normalize_email_domain(payload.email_domain.trim_start_matches('@'));
    if name.is_empty() || email_domain.is_empty() {
        return Err(AppError::Validation(
            "university name and email domain are required".into(),
        ));
    }
    if email_domain.contains('@')
        || !email_domain.contains('.')
        || email_domain.chars().any(char::is_whitespace)
    {
        return Err(AppError::Validation(format!(
            "{email_domain} is not a valid email domain"
        )));
    }

    let existing = Universities::find()
        .filter(UniversityCol::EmailDomain.eq(email_domain.as_str()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "university email domain already exists".into(),
        ));
    }

    let university = UniversityActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email_domain: Set(email_domain),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        user.user_id,
        "university_create",
        "universities",
        serde_json::json!({ "university_id": university.id, "email_domain": university.email_domain }),
    )
    .await;

    Ok(ApiResponse::success(
        "University added",
        University::from(university),
        Some(Meta::empty()),
    ))
}

pub async fn list_universities(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UniversityList>> {
    ensure_admin(user)?;
    let items = Universities::find()
        .order_by_asc(UniversityCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(University::from)
        .collect();
    Ok(ApiResponse::success(
        "Universities",
        UniversityList { items },
        Some(Meta::empty()),
    ))
}
