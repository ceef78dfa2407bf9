use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutItem, CheckoutRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_employee, ensure_self_or_employee},
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service,
    state::AppState,
    upload::{self, FormData},
};

impl CheckoutRequest {
    /// Read and validate the text fields of the checkout form.
    pub fn from_form(form: &FormData) -> AppResult<Self> {
        let items: Vec<CheckoutItem> = serde_json::from_str(form.required("items")?)
            .map_err(|_| AppError::bad_request("items must be a JSON array of order lines"))?;

        let request = Self {
            address: form.required("address")?.to_string(),
            phone_number: form.required("phone_number")?.to_string(),
            email: form.required("email")?.to_string(),
            items,
            total_price: form.parse("total_price")?,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.items.is_empty() {
            return Err(AppError::bad_request("Order must contain at least one item"));
        }
        if self.items.iter().any(|item| item.quantity < 1) {
            return Err(AppError::bad_request("Item quantity must be at least 1"));
        }
        if self.items.iter().any(|item| item.price < 0) {
            return Err(AppError::bad_request("Item price must not be negative"));
        }
        let expected = self
            .items
            .iter()
            .try_fold(0i64, |acc, item| {
                item.price
                    .checked_mul(i64::from(item.quantity))
                    .and_then(|subtotal| acc.checked_add(subtotal))
            })
            .ok_or_else(|| AppError::bad_request("items total is out of range"))?;
        if expected != self.total_price {
            return Err(AppError::bad_request(format!(
                "total_price {} does not match items total {}",
                self.total_price, expected
            )));
        }
        Ok(())
    }
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    form: FormData,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let payload = CheckoutRequest::from_form(&form)?;

    let dir = &state.config.upload_dir;
    let receipt = match &form.file {
        Some(file) => Some(upload::store_image(dir, file, state.config.upload_max_bytes).await?),
        None => None,
    };

    match place_order(state, user, payload, receipt.clone()).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            if let Some(name) = &receipt {
                upload::discard(dir, name).await;
            }
            Err(err)
        }
    }
}

/// Persist the order snapshot and clear the caller's cart in one transaction.
async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
    receipt: Option<String>,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        address: Set(payload.address),
        phone_number: Set(payload.phone_number),
        email: Set(payload.email),
        receipt: Set(receipt),
        total_price: Set(payload.total_price),
        status: Set(OrderStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    let cleared = cart_service::clear_cart(&txn, user.user_id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, cart_cleared = cleared > 0, "checkout created");
    audit::record(
        &state.pool,
        user,
        "checkout_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout created successfully",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders_for_user(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_self_or_employee(user, user_id)?;

    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;
    if orders.is_empty() {
        return Err(AppError::not_found("No checkouts found for this user"));
    }

    let items = with_items(&state.orm, orders).await?;
    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_employee(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse()?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_items(&state.orm, orders).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_order(state, id).await?;
    ensure_self_or_employee(user, order.user_id)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::ok(OrderWithItems {
        order: order_from_entity(order),
        items,
    }))
}

/// Overwrite the status. Every status may follow every other.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_employee(user)?;
    let status: OrderStatus = payload.status.parse()?;

    let existing = find_order(state, id).await?;
    let previous = existing.status;

    let mut active: OrderActive = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    tracing::info!(order_id = %order.id, from = %previous, to = %status, "order status changed");
    audit::record(
        &state.pool,
        user,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "status": status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout status updated successfully",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Hard delete. Feedback for the order is left untouched.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_employee(user)?;
    let existing = find_order(state, id).await?;

    Orders::delete_by_id(existing.id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        user,
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": existing.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout deleted successfully",
        order_from_entity(existing),
        Some(Meta::empty()),
    ))
}

async fn find_order(state: &AppState, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Checkout not found"))
}

async fn with_items<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderWithItems>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
    {
        by_order
            .entry(item.order_id)
            .or_default()
            .push(order_item_from_entity(item));
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: by_order.remove(&order.id).unwrap_or_default(),
            order: order_from_entity(order),
        })
        .collect())
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        address: model.address,
        phone_number: model.phone_number,
        email: model.email,
        receipt: model.receipt,
        total_price: model.total_price,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout_form(items: &str, total: &str) -> FormData {
        let mut form = FormData::default();
        for (k, v) in [
            ("address", "12 Harbour Road"),
            ("phone_number", "0771234567"),
            ("email", "buyer@example.com"),
            ("items", items),
            ("total_price", total),
        ] {
            form.fields.insert(k.to_string(), v.to_string());
        }
        form
    }

    fn items_json(lines: &[(Uuid, i32, i64)]) -> String {
        let lines: Vec<CheckoutItem> = lines
            .iter()
            .map(|(product_id, quantity, price)| CheckoutItem {
                product_id: *product_id,
                quantity: *quantity,
                price: *price,
            })
            .collect();
        serde_json::to_string(&lines).unwrap()
    }

    #[test]
    fn parses_a_consistent_checkout() {
        let p = Uuid::new_v4();
        let req = CheckoutRequest::from_form(&checkout_form(&items_json(&[(p, 3, 10)]), "30")).unwrap();
        assert_eq!(req.total_price, 30);
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.items[0].product_id, p);
    }

    #[test]
    fn rejects_a_total_that_does_not_match_the_items() {
        let json = items_json(&[(Uuid::new_v4(), 3, 10)]);
        let err = CheckoutRequest::from_form(&checkout_form(&json, "25")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_items_whose_total_overflows() {
        let json = items_json(&[(Uuid::new_v4(), 2, i64::MAX)]);
        let err = CheckoutRequest::from_form(&checkout_form(&json, "0")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "items total is out of range"));

        let json = items_json(&[(Uuid::new_v4(), 1, i64::MAX), (Uuid::new_v4(), 1, 2)]);
        let err = CheckoutRequest::from_form(&checkout_form(&json, "1")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "items total is out of range"));
    }

    #[test]
    fn rejects_empty_or_malformed_items() {
        assert!(CheckoutRequest::from_form(&checkout_form("[]", "0")).is_err());
        assert!(CheckoutRequest::from_form(&checkout_form("not json", "0")).is_err());
        let zero_qty = items_json(&[(Uuid::new_v4(), 0, 10)]);
        assert!(CheckoutRequest::from_form(&checkout_form(&zero_qty, "0")).is_err());
    }

    #[test]
    fn requires_contact_fields() {
        let mut form = checkout_form(&items_json(&[(Uuid::new_v4(), 1, 5)]), "5");
        form.fields.remove("phone_number");
        let err = CheckoutRequest::from_form(&form).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("phone_number")));
    }
}
