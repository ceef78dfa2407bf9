use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{LockType, OnConflict};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartPayload, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_self_or_employee},
    models::{Cart, CartItem, CartLine, ProductStatus},
    response::{ApiResponse, Meta},
    services::product_service::product_from_entity,
    state::AppState,
};

/// Add `quantity` of a product, merging into an existing line. A new line takes `price`.
pub fn add_line(
    lines: &mut Vec<CartLine>,
    product_id: Uuid,
    quantity: i32,
    price: i64,
) -> AppResult<()> {
    match lines.iter_mut().find(|line| line.product_id == product_id) {
        Some(line) => {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| AppError::bad_request("quantity is out of range"))?;
        }
        None => lines.push(CartLine {
            product_id,
            quantity,
            price,
        }),
    }
    Ok(())
}

pub fn set_line_quantity(lines: &mut [CartLine], product_id: Uuid, quantity: i32) -> AppResult<()> {
    let line = lines
        .iter_mut()
        .find(|line| line.product_id == product_id)
        .ok_or_else(|| AppError::not_found("Product not found in cart"))?;
    line.quantity = quantity;
    Ok(())
}

pub fn remove_line(lines: &mut Vec<CartLine>, product_id: Uuid) -> AppResult<()> {
    let before = lines.len();
    lines.retain(|line| line.product_id != product_id);
    if lines.len() == before {
        return Err(AppError::not_found("Product not found in cart"));
    }
    Ok(())
}

pub fn total_price(lines: &[CartLine]) -> AppResult<i64> {
    lines
        .iter()
        .try_fold(0i64, |acc, line| {
            line.price
                .checked_mul(i64::from(line.quantity))
                .and_then(|subtotal| acc.checked_add(subtotal))
        })
        .ok_or_else(|| AppError::bad_request("cart total is out of range"))
}

fn ensure_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::bad_request("quantity must be greater than 0"));
    }
    Ok(())
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartPayload>> {
    ensure_self_or_employee(user, payload.user_id)?;
    ensure_quantity(payload.quantity)?;

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    if product.status != ProductStatus::Active {
        return Err(AppError::bad_request("Product is not available"));
    }

    let txn = state.orm.begin().await?;
    let cart = lock_or_create_cart(&txn, payload.user_id).await?;
    let mut lines = load_lines(&txn, cart.id).await?;
    add_line(&mut lines, product.id, payload.quantity, product.price)?;
    let cart = save_cart(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user,
        "cart_add",
        "carts",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::success(
        "Product added to cart successfully",
        CartPayload { cart: Some(cart) },
        Some(Meta::empty()),
    ))
}

pub async fn get_cart(state: &AppState, user: &AuthUser, user_id: Uuid) -> AppResult<ApiResponse<Cart>> {
    ensure_self_or_employee(user, user_id)?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;
    let lines = load_lines(&state.orm, cart.id).await?;
    let cart = cart_view(&state.orm, cart, lines).await?;

    Ok(ApiResponse::ok(cart))
}

pub async fn update_item_quantity(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartPayload>> {
    ensure_self_or_employee(user, user_id)?;
    ensure_quantity(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;
    let mut lines = load_lines(&txn, cart.id).await?;
    set_line_quantity(&mut lines, product_id, payload.quantity)?;
    let cart = save_cart(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user,
        "cart_update",
        "carts",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::success(
        "Cart updated successfully",
        CartPayload { cart: Some(cart) },
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartPayload>> {
    ensure_self_or_employee(user, user_id)?;

    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;
    let mut lines = load_lines(&txn, cart.id).await?;
    remove_line(&mut lines, product_id)?;

    if lines.is_empty() {
        // Lines go with the cart through ON DELETE CASCADE.
        Carts::delete_by_id(cart.id).exec(&txn).await?;
        txn.commit().await?;

        audit::record(
            &state.pool,
            user,
            "cart_remove",
            "carts",
            serde_json::json!({ "product_id": product_id, "cart_deleted": true }),
        )
        .await;

        return Ok(ApiResponse::success(
            "Cart is empty and deleted",
            CartPayload { cart: None },
            Some(Meta::empty()),
        ));
    }

    let cart = save_cart(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user,
        "cart_remove",
        "carts",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    let cart = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::success(
        "Product removed from cart",
        CartPayload { cart: Some(cart) },
        Some(Meta::empty()),
    ))
}

pub async fn delete_cart(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_self_or_employee(user, user_id)?;

    if clear_cart(&state.orm, user_id).await? > 0 {
        audit::record(
            &state.pool,
            user,
            "cart_delete",
            "carts",
            serde_json::json!({ "user_id": user_id }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Cart deleted successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Delete the user's cart on `conn`, which may be an open transaction.
pub async fn clear_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<u64> {
    let result = Carts::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn lock_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Option<CartModel>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(conn)
        .await?;
    Ok(cart)
}

async fn lock_or_create_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartModel> {
    let fresh = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    // A concurrent first add may have created the cart already; keep theirs.
    Carts::insert(fresh)
        .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

    lock_cart(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart vanished after upsert")))
}

async fn load_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(|item| CartLine {
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();
    Ok(lines)
}

/// Rewrite the cart's lines and total. Caller holds the row lock.
async fn save_cart<C: ConnectionTrait>(
    conn: &C,
    cart: CartModel,
    lines: &[CartLine],
) -> AppResult<CartModel> {
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(conn)
        .await?;

    if !lines.is_empty() {
        let rows = lines.iter().map(|line| CartItemActive {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        });
        CartItems::insert_many(rows).exec_without_returning(conn).await?;
    }

    let mut active: CartActive = cart.into();
    active.total_price = Set(total_price(lines)?);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

/// Resolve each line's product. Lines whose product was deleted keep `product: None`.
async fn cart_view<C: ConnectionTrait>(
    conn: &C,
    cart: CartModel,
    lines: Vec<CartLine>,
) -> AppResult<Cart> {
    let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let mut products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, product_from_entity(p)))
        .collect();

    let items = lines
        .into_iter()
        .map(|line| CartItem {
            product_id: line.product_id,
            product: products.remove(&line.product_id),
            quantity: line.quantity,
            price: line.price,
        })
        .collect();

    Ok(Cart {
        id: cart.id,
        user_id: cart.user_id,
        items,
        total_price: cart.total_price,
        created_at: cart.created_at.with_timezone(&Utc),
        updated_at: cart.updated_at.with_timezone(&Utc),
    })
}
