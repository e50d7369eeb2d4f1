use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    catalog::{Specification, Variant, VariantKey},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        discounts::{CouponList, CreateCouponRequest, CreateUniversityRequest, UniversityList},
        favorites::{AddFavoriteRequest, FavoriteProductList},
        orders::{
            CreateOrderRequest, DailySales, OrderCount, OrderLineRequest, OrderList,
            OrderWithItems, SalesByDate, SalesTotal,
        },
        products::{CreateCategoryRequest, CreateReviewRequest, ProductList, ProductRequest},
    },
    models::{
        CartItem, Category, Coupon, Favorite, Order, OrderItem, PaymentConfirmation, Product,
        Review, ShippingAddress, University, User,
    },
    orders::{CaptureRequest, OrderState},
    pricing::{DiscountRequest, DiscountSource, ResolvedDiscount},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, discounts, favorites, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::top_products,
        products::new_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::add_review,
        products::list_categories,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        discounts::validate_discount,
        orders::create_order,
        orders::list_my_orders,
        orders::get_order,
        orders::payment_instructions,
        orders::pay_order,
        orders::deliver_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::count_orders,
        admin::total_sales,
        admin::sales_by_date,
        admin::list_coupons,
        admin::create_coupon,
        admin::list_universities,
        admin::create_university,
        admin::create_category
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Review,
            Specification,
            Variant,
            VariantKey,
            Favorite,
            CartItem,
            Coupon,
            University,
            ShippingAddress,
            PaymentConfirmation,
            Order,
            OrderItem,
            OrderState,
            CaptureRequest,
            DiscountRequest,
            DiscountSource,
            ResolvedDiscount,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            CartItemDto,
            CartList,
            AddFavoriteRequest,
            FavoriteProductList,
            CreateCouponRequest,
            CreateUniversityRequest,
            CouponList,
            UniversityList,
            OrderLineRequest,
            CreateOrderRequest,
            OrderWithItems,
            OrderList,
            OrderCount,
            SalesTotal,
            DailySales,
            SalesByDate,
            ProductRequest,
            ProductList,
            CreateReviewRequest,
            CreateCategoryRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ResolvedDiscount>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog, reviews and categories"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Discounts", description = "Coupon and student discount checks"),
        (name = "Orders", description = "Order pricing, payment and delivery"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_order_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/orders",
            "/api/orders/{id}/pay",
            "/api/orders/{id}/deliver",
            "/api/discounts/validate",
            "/api/admin/orders/sales-by-date",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
