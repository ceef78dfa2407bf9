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
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartPayload, UpdateCartItemRequest},
        feedback::{FeedbackDetail, FeedbackList, OrderSummary, SubmitFeedbackRequest, UpdateFeedbackRequest},
        orders::{CheckoutForm, CheckoutItem, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{ProductForm, ProductList, UpdateProductRequest, UpdateProductStatusRequest},
    },
    models::{Cart, CartItem, Feedback, Order, OrderItem, OrderStatus, Product, ProductStatus, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, checkout, feedback, health, params, products},
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
        auth::register,
        auth::login,
        products::list_products,
        products::list_active_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::update_product_status,
        products::update_product_image,
        products::delete_product,
        cart::add_to_cart,
        cart::get_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::delete_cart,
        checkout::create_checkout,
        checkout::list_checkouts,
        checkout::list_user_checkouts,
        checkout::get_checkout,
        checkout::update_checkout_status,
        checkout::delete_checkout,
        feedback::submit_feedback,
        feedback::feedback_by_order,
        feedback::feedback_by_user,
        feedback::feedback_by_product,
        feedback::update_feedback,
        feedback::delete_feedback,
        feedback::list_feedback,
        feedback::delete_feedback_by_id
    ),
    components(
        schemas(
            User,
            Product,
            ProductStatus,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Feedback,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartPayload,
            CheckoutForm,
            CheckoutItem,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            SubmitFeedbackRequest,
            UpdateFeedbackRequest,
            OrderSummary,
            FeedbackDetail,
            FeedbackList,
            ProductForm,
            ProductList,
            UpdateProductRequest,
            UpdateProductStatusRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<CartPayload>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Feedback>,
            ApiResponse<FeedbackList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Order placement and lifecycle endpoints"),
        (name = "Feedback", description = "Post-delivery feedback endpoints"),
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
    fn openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/cart/{user_id}/{product_id}",
            "/api/checkout/details/{id}",
            "/api/checkout/{id}/status",
            "/api/feedback/add/{order_id}",
            "/api/products/{id}/image",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("bearer_auth"));
    }
}
