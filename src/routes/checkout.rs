use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutForm, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
    upload,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_checkout).get(list_checkouts))
        .route("/details/{id}", get(get_checkout))
        .route("/{id}/status", patch(update_checkout_status))
        .route("/{id}", get(list_user_checkouts).delete(delete_checkout))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body(content = CheckoutForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Order placed and cart cleared", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Missing fields, bad items or bad receipt"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithItems>>)> {
    let form = upload::read_form(&mut multipart, "receipt").await?;
    let resp = order_service::create_order(&state, &user, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/checkout",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Pending, Processing, Shipped, Delivered or Cancelled"),
        ("sort_order" = Option<String>, Query, description = "asc or desc by created_at")
    ),
    responses(
        (status = 200, description = "All orders (employee)", body = ApiResponse<OrderList>),
        (status = 403, description = "Not an employee"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn list_checkouts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Orders placed by the user", body = ApiResponse<OrderList>),
        (status = 404, description = "No checkouts found for this user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn list_user_checkouts(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders_for_user(&state, &user, user_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/details/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its line snapshot", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Checkout not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn get_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/checkout/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status overwritten", body = ApiResponse<Order>),
        (status = 400, description = "Invalid status"),
        (status = 404, description = "Checkout not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn update_checkout_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/checkout/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted; its feedback is kept", body = ApiResponse<Order>),
        (status = 404, description = "Checkout not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn delete_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::delete_order(&state, &user, id).await?;
    Ok(Json(resp))
}
