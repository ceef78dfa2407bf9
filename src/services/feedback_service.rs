use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::feedback::{FeedbackDetail, FeedbackList, OrderSummary, SubmitFeedbackRequest, UpdateFeedbackRequest},
    entity::{
        feedback::{ActiveModel as FeedbackActive, Column as FeedbackCol, Entity as Feedbacks, Model as FeedbackModel},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_employee, ensure_self_or_employee},
    models::{Feedback, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub const DEFAULT_RATING: i16 = 5;

pub fn ensure_feedback_allowed(status: OrderStatus) -> AppResult<()> {
    if !status.accepts_feedback() {
        return Err(AppError::bad_request(
            "Feedback can only be submitted for delivered orders",
        ));
    }
    Ok(())
}

fn validate_rating(rating: i16) -> AppResult<i16> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::bad_request("rating must be between 1 and 5"));
    }
    Ok(rating)
}

fn required_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub async fn submit_feedback(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: SubmitFeedbackRequest,
) -> AppResult<ApiResponse<Feedback>> {
    let text = required_text(Some(&payload.feedback))
        .ok_or_else(|| AppError::bad_request("Feedback is required"))?;
    let rating = validate_rating(payload.rating.unwrap_or(DEFAULT_RATING))?;

    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;
    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    ensure_feedback_allowed(order.status)?;

    let existing = Feedbacks::find()
        .filter(FeedbackCol::OrderId.eq(order_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(duplicate());
    }

    let inserted = FeedbackActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        user_id: Set(user.user_id),
        feedback: Set(text),
        rating: Set(rating),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match err.sql_err() {
        // Lost a race with a concurrent submission for the same order.
        Some(SqlErr::UniqueConstraintViolation(_)) => duplicate(),
        _ => AppError::from(err),
    })?;

    audit::record(
        &state.pool,
        user,
        "feedback_submit",
        "feedback",
        serde_json::json!({ "order_id": order_id, "rating": rating }),
    )
    .await;

    Ok(ApiResponse::success(
        "Feedback submitted successfully",
        feedback_from_entity(inserted),
        Some(Meta::empty()),
    ))
}

fn duplicate() -> AppError {
    AppError::Conflict("Feedback already submitted for this order".into())
}

pub async fn get_feedback_by_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Feedback>> {
    let feedback = find_by_order(state, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Feedback not found for this order"))?;
    ensure_self_or_employee(user, feedback.user_id)?;

    Ok(ApiResponse::ok(feedback_from_entity(feedback)))
}

pub async fn get_feedback_by_user(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<FeedbackList>> {
    ensure_self_or_employee(user, user_id)?;

    let rows = Feedbacks::find()
        .filter(FeedbackCol::UserId.eq(user_id))
        .order_by_desc(FeedbackCol::CreatedAt)
        .all(&state.orm)
        .await?;
    if rows.is_empty() {
        return Err(AppError::not_found("No feedback found for this user"));
    }

    let items = with_orders(state, rows).await?;
    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("OK", FeedbackList { items }, Some(meta)))
}

/// Feedback left on any order whose snapshot contains the product.
pub async fn get_feedback_by_product(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<FeedbackList>> {
    let order_ids: Vec<Uuid> = OrderItems::find()
        .select_only()
        .column(OrderItemCol::OrderId)
        .distinct()
        .filter(OrderItemCol::ProductId.eq(product_id))
        .into_tuple()
        .all(&state.orm)
        .await?;
    if order_ids.is_empty() {
        return Err(AppError::not_found("No orders found for this product"));
    }

    let rows = Feedbacks::find()
        .filter(FeedbackCol::OrderId.is_in(order_ids))
        .order_by_desc(FeedbackCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let items = with_orders(state, rows).await?;
    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("OK", FeedbackList { items }, Some(meta)))
}

pub async fn update_feedback(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateFeedbackRequest,
) -> AppResult<ApiResponse<Feedback>> {
    let (text, rating) = match (required_text(payload.feedback.as_deref()), payload.rating) {
        (Some(text), Some(rating)) => (text, validate_rating(rating)?),
        _ => return Err(AppError::bad_request("Feedback and rating are required")),
    };

    let existing = find_by_order(state, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Feedback not found"))?;
    ensure_self_or_employee(user, existing.user_id)?;

    let mut active: FeedbackActive = existing.into();
    active.feedback = Set(text);
    active.rating = Set(rating);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user,
        "feedback_update",
        "feedback",
        serde_json::json!({ "order_id": order_id, "rating": rating }),
    )
    .await;

    Ok(ApiResponse::success(
        "Feedback updated successfully",
        feedback_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn delete_feedback(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Feedback>> {
    let existing = find_by_order(state, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Feedback not found"))?;
    ensure_self_or_employee(user, existing.user_id)?;

    delete_model(state, user, existing).await
}

pub async fn delete_feedback_by_id(
    state: &AppState,
    user: &AuthUser,
    feedback_id: Uuid,
) -> AppResult<ApiResponse<Feedback>> {
    ensure_employee(user)?;
    let existing = Feedbacks::find_by_id(feedback_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Feedback not found"))?;

    delete_model(state, user, existing).await
}

pub async fn list_all_feedback(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FeedbackList>> {
    ensure_employee(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Feedbacks::find().order_by_desc(FeedbackCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = with_orders(state, rows).await?;
    Ok(ApiResponse::success(
        "OK",
        FeedbackList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

async fn delete_model(
    state: &AppState,
    user: &AuthUser,
    model: FeedbackModel,
) -> AppResult<ApiResponse<Feedback>> {
    let result = Feedbacks::delete_by_id(model.id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Feedback not found"));
    }

    audit::record(
        &state.pool,
        user,
        "feedback_delete",
        "feedback",
        serde_json::json!({ "feedback_id": model.id, "order_id": model.order_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Feedback deleted successfully",
        feedback_from_entity(model),
        Some(Meta::empty()),
    ))
}

async fn find_by_order(state: &AppState, order_id: Uuid) -> Result<Option<FeedbackModel>, DbErr> {
    Feedbacks::find()
        .filter(FeedbackCol::OrderId.eq(order_id))
        .one(&state.orm)
        .await
}

/// Attach order status and total; orders deleted since leave `order: None`.
async fn with_orders(state: &AppState, rows: Vec<FeedbackModel>) -> AppResult<Vec<FeedbackDetail>> {
    let order_ids: Vec<Uuid> = rows.iter().map(|f| f.order_id).collect();
    let orders: HashMap<Uuid, OrderSummary> = Orders::find()
        .filter(OrderCol::Id.is_in(order_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|o| {
            (
                o.id,
                OrderSummary {
                    status: o.status,
                    total_price: o.total_price,
                },
            )
        })
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let order = orders.get(&row.order_id).cloned();
            FeedbackDetail {
                feedback: feedback_from_entity(row),
                order,
            }
        })
        .collect())
}

fn feedback_from_entity(model: FeedbackModel) -> Feedback {
    Feedback {
        id: model.id,
        order_id: model.order_id,
        user_id: model.user_id,
        feedback: model.feedback,
        rating: model.rating,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
