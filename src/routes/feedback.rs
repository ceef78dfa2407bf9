use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::feedback::{FeedbackList, SubmitFeedbackRequest, UpdateFeedbackRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Feedback,
    response::ApiResponse,
    routes::params::Pagination,
    services::feedback_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feedback))
        .route("/add/{order_id}", post(submit_feedback))
        .route("/order/{order_id}", get(feedback_by_order))
        .route("/user/{user_id}", get(feedback_by_user))
        .route("/product/{product_id}", get(feedback_by_product))
        .route("/update/{order_id}", patch(update_feedback))
        .route("/delete/{order_id}", delete(delete_feedback))
        .route("/{feedback_id}", delete(delete_feedback_by_id))
}

#[utoipa::path(
    post,
    path = "/api/feedback/add/{order_id}",
    params(("order_id" = Uuid, Path, description = "Delivered order owned by the caller")),
    request_body = SubmitFeedbackRequest,
    responses(
        (status = 201, description = "Feedback stored", body = ApiResponse<Feedback>),
        (status = 400, description = "Order not delivered or invalid rating"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Feedback already submitted for this order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn submit_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Feedback>>)> {
    let resp = feedback_service::submit_feedback(&state, &user, order_id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/feedback/order/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Feedback for the order", body = ApiResponse<Feedback>),
        (status = 404, description = "Feedback not found for this order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn feedback_by_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let resp = feedback_service::get_feedback_by_order(&state, &user, order_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/feedback/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Author")),
    responses(
        (status = 200, description = "Feedback written by the user", body = ApiResponse<FeedbackList>),
        (status = 404, description = "No feedback found for this user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn feedback_by_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FeedbackList>>> {
    let resp = feedback_service::get_feedback_by_user(&state, &user, user_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/feedback/product/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Feedback on orders containing the product", body = ApiResponse<FeedbackList>),
        (status = 404, description = "No orders found for this product"),
    ),
    tag = "Feedback"
)]
pub async fn feedback_by_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FeedbackList>>> {
    let resp = feedback_service::get_feedback_by_product(&state, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/feedback/update/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateFeedbackRequest,
    responses(
        (status = 200, description = "Feedback updated", body = ApiResponse<Feedback>),
        (status = 400, description = "Feedback and rating are required"),
        (status = 404, description = "Feedback not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn update_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateFeedbackRequest>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let resp = feedback_service::update_feedback(&state, &user, order_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/feedback/delete/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Feedback deleted", body = ApiResponse<Feedback>),
        (status = 404, description = "Feedback not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn delete_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let resp = feedback_service::delete_feedback(&state, &user, order_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/feedback",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "All feedback (employee)", body = ApiResponse<FeedbackList>),
        (status = 403, description = "Not an employee"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn list_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<FeedbackList>>> {
    let resp = feedback_service::list_all_feedback(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/feedback/{feedback_id}",
    params(("feedback_id" = Uuid, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Feedback deleted (employee)", body = ApiResponse<Feedback>),
        (status = 404, description = "Feedback not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn delete_feedback_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(feedback_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let resp = feedback_service::delete_feedback_by_id(&state, &user, feedback_id).await?;
    Ok(Json(resp))
}
