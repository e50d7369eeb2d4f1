//! Coupon and student-offer resolution.
//!
//! The same resolver backs the preview endpoint, the client cache and order
//! assembly; only the order path is authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountPolicy {
    pub student_percent: Decimal,
    pub enforce_coupon_expiry: bool,
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            student_percent: Decimal::from(5),
            enforce_coupon_expiry: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountRequest {
    Coupon {
        code: String,
    },
    Student {
        university_name: String,
        university_email: String,
    },
}

/// Loose discount fields as a checkout form submits them.
///
/// When both a coupon and student details are present the student offer wins;
/// the two sources never stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiscountSelection {
    pub coupon_code: Option<String>,
    pub university_name: Option<String>,
    pub university_email: Option<String>,
}

impl DiscountSelection {
    pub fn into_request(self) -> Option<DiscountRequest> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let name = present(self.university_name);
        let email = present(self.university_email);
        if name.is_some() || email.is_some() {
            return Some(DiscountRequest::Student {
                university_name: name.unwrap_or_default(),
                university_email: email.unwrap_or_default(),
            });
        }
        present(self.coupon_code).map(|code| DiscountRequest::Coupon { code })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSource {
    Coupon,
    Student,
}

impl DiscountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountSource::Coupon => "coupon",
            DiscountSource::Student => "student",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResolvedDiscount {
    pub source: DiscountSource,
    pub percent: Decimal,
    /// Normalized coupon code, or the submitted university name.
    pub reference: String,
    pub university_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CouponRecord {
    pub code: String,
    pub discount_percent: i32,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UniversityRecord {
    pub name: String,
    pub email_domain: String,
}

/// Read access to registered coupons and universities.
#[async_trait]
pub trait DiscountBook: Send + Sync {
    /// `code` is already normalized.
    async fn find_coupon_by_code(&self, code: &str) -> AppResult<Option<CouponRecord>>;

    /// Both arguments are already normalized; a record is returned only when
    /// its name and domain both match.
    async fn find_university(
        &self,
        name: &str,
        email_domain: &str,
    ) -> AppResult<Option<UniversityRecord>>;
}

pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn normalize_university_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn normalize_email_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Splits `local@domain`, requiring exactly one `@` with both sides non-empty.
/// Returns the lowercased domain.
pub fn email_domain(email: &str) -> Option<String> {
    let email = email.trim();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    if domain.chars().any(char::is_whitespace) || local.chars().any(char::is_whitespace) {
        return None;
    }
    Some(normalize_email_domain(domain))
}

/// All-or-nothing: an error never carries a partial percentage.
pub async fn resolve_discount<B>(
    book: &B,
    request: &DiscountRequest,
    policy: &DiscountPolicy,
    now: DateTime<Utc>,
) -> AppResult<ResolvedDiscount>
where
    B: DiscountBook + ?Sized,
{
    match request {
        DiscountRequest::Coupon { code } => {
            let code = normalize_coupon_code(code);
            if code.is_empty() {
                return Err(AppError::DiscountNotFound);
            }
            let coupon = book
                .find_coupon_by_code(&code)
                .await?
                .ok_or(AppError::DiscountNotFound)?;

            if policy.enforce_coupon_expiry
                && coupon.expiry_date.is_some_and(|expiry| expiry < now)
            {
                return Err(AppError::DiscountExpired);
            }

            Ok(ResolvedDiscount {
                source: DiscountSource::Coupon,
                percent: Decimal::from(coupon.discount_percent),
                reference: coupon.code,
                university_email: None,
            })
        }
        DiscountRequest::Student {
            university_name,
            university_email,
        } => {
            let name = normalize_university_name(university_name);
            if name.is_empty() {
                return Err(AppError::Validation(
                    "university name is required".into(),
                ));
            }
            let domain = email_domain(university_email).ok_or_else(|| {
                AppError::Validation("university email is not a valid address".into())
            })?;

            book.find_university(&name, &domain)
                .await?
                .ok_or(AppError::DiscountNoMatch)?;

            Ok(ResolvedDiscount {
                source: DiscountSource::Student,
                percent: policy.student_percent,
                reference: university_name.trim().to_string(),
                university_email: Some(university_email.trim().to_string()),
            })
        }
    }
}

/// In-memory discount lists for best-effort checks away from the database.
#[derive(Debug, Clone, Default)]
pub struct DiscountCatalog {
    pub coupons: Vec<CouponRecord>,
    pub universities: Vec<UniversityRecord>,
}

#[async_trait]
impl DiscountBook for DiscountCatalog {
    async fn find_coupon_by_code(&self, code: &str) -> AppResult<Option<CouponRecord>> {
        Ok(self
            .coupons
            .iter()
            .find(|c| normalize_coupon_code(&c.code) == code)
            .cloned())
    }

    async fn find_university(
        &self,
        name: &str,
        email_domain: &str,
    ) -> AppResult<Option<UniversityRecord>> {
        Ok(self
            .universities
            .iter()
            .find(|u| {
                normalize_university_name(&u.name) == name
                    && normalize_email_domain(&u.email_domain) == email_domain
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn book() -> DiscountCatalog {
        DiscountCatalog {
            coupons: vec![
                CouponRecord {
                    code: "SAVE5".into(),
                    discount_percent: 5,
                    expiry_date: None,
                },
                CouponRecord {
                    code: "OLD10".into(),
                    discount_percent: 10,
                    expiry_date: Some(Utc::now() - Duration::days(1)),
                },
            ],
            universities: vec![
                UniversityRecord {
                    name: "Example University".into(),
                    email_domain: "example.edu".into(),
                },
                UniversityRecord {
                    name: "Other College".into(),
                    email_domain: "other.edu".into(),
                },
            ],
        }
    }

    fn coupon(code: &str) -> DiscountRequest {
        DiscountRequest::Coupon { code: code.into() }
    }

    fn student(name: &str, email: &str) -> DiscountRequest {
        DiscountRequest::Student {
            university_name: name.into(),
            university_email: email.into(),
        }
    }

    #[tokio::test]
    async fn coupon_code_is_trimmed_and_uppercased() {
        let policy = DiscountPolicy::default();
        let padded = resolve_discount(&book(), &coupon(" save5 "), &policy, Utc::now())
            .await
            .unwrap();
        let exact = resolve_discount(&book(), &coupon("SAVE5"), &policy, Utc::now())
            .await
            .unwrap();
        assert_eq!(padded, exact);
        assert_eq!(padded.percent, Decimal::from(5));
        assert_eq!(padded.source, DiscountSource::Coupon);
    }

    #[tokio::test]
    async fn unknown_coupon_is_not_found() {
        let err = resolve_discount(&book(), &coupon("NOPE"), &DiscountPolicy::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DiscountNotFound));
    }

    #[tokio::test]
    async fn expired_coupon_follows_policy() {
        let strict = DiscountPolicy::default();
        let err = resolve_discount(&book(), &coupon("old10"), &strict, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DiscountExpired));

        let lenient = DiscountPolicy {
            enforce_coupon_expiry: false,
            ..strict
        };
        let resolved = resolve_discount(&book(), &coupon("old10"), &lenient, Utc::now())
            .await
            .unwrap();
        assert_eq!(resolved.percent, Decimal::from(10));
    }

    #[tokio::test]
    async fn student_offer_requires_name_and_domain_on_same_record() {
        let policy = DiscountPolicy::default();
        let ok = resolve_discount(
            &book(),
            &student("Example University", "student@EXAMPLE.edu"),
            &policy,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(ok.source, DiscountSource::Student);
        assert_eq!(ok.percent, policy.student_percent);

        let crossed = resolve_discount(
            &book(),
            &student("Example University", "student@other.edu"),
            &policy,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(crossed, AppError::DiscountNoMatch));
    }

    #[tokio::test]
    async fn malformed_student_email_is_a_validation_error() {
        for email in ["student", "@example.edu", "student@", "a@b@example.edu"] {
            let err = resolve_discount(
                &book(),
                &student("Example University", email),
                &DiscountPolicy::default(),
                Utc::now(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{email}");
        }
    }

    #[test]
    fn student_details_take_precedence_over_coupon() {
        let selection = DiscountSelection {
            coupon_code: Some("SAVE5".into()),
            university_name: Some("Example University".into()),
            university_email: Some("student@example.edu".into()),
        };
        assert!(matches!(
            selection.into_request(),
            Some(DiscountRequest::Student { .. })
        ));

        let coupon_only = DiscountSelection {
            coupon_code: Some("SAVE5".into()),
            university_name: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(coupon_only.into_request(), Some(coupon("SAVE5")));
        assert_eq!(DiscountSelection::default().into_request(), None);
    }
}
