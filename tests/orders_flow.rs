use axum::body::Bytes;
use sea_orm::ActiveModelTrait;
use sea_orm::ActiveValue::{NotSet, Set};
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::{
        cart::{AddToCartRequest, UpdateCartItemRequest},
        feedback::SubmitFeedbackRequest,
        orders::UpdateOrderStatusRequest,
        products::UpdateProductRequest,
    },
    entity::products::ActiveModel as ProductActive,
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, ProductStatus, ROLE_EMPLOYEE, ROLE_USER},
    services::{auth_service::hash_password, cart_service, feedback_service, order_service, product_service},
    state::AppState,
    upload::{FormData, UploadedFile},
};
use uuid::Uuid;

// Cart -> checkout -> delivery -> feedback, against a real database.
#[tokio::test]
async fn cart_checkout_delivery_and_feedback_flow() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = create_account(&state, ROLE_USER).await?;
    let employee = create_account(&state, ROLE_EMPLOYEE).await?;
    let product_id = create_product(&state, 10).await?;

    // Add twice the product, then overwrite to three.
    let added = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            user_id: customer.user_id,
            product_id,
            quantity: 2,
        },
    )
    .await?;
    let cart = added.data.and_then(|p| p.cart).expect("cart");
    assert_eq!(cart.total_price, 20);

    let updated = cart_service::update_item_quantity(
        &state,
        &customer,
        customer.user_id,
        product_id,
        UpdateCartItemRequest { quantity: 3 },
    )
    .await?;
    let cart = updated.data.and_then(|p| p.cart).expect("cart");
    assert_eq!(cart.total_price, 30);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);

    // Checkout snapshots the lines and removes the cart.
    let placed = order_service::create_order(&state, &customer, checkout_form(product_id, 3, 10, 30)).await?;
    let placed = placed.data.expect("order");
    let order_id = placed.order.id;
    assert_eq!(placed.order.total_price, 30);
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.items.len(), 1);

    let gone = cart_service::get_cart(&state, &customer, customer.user_id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    // Feedback waits for delivery.
    let early = feedback_service::submit_feedback(&state, &customer, order_id, feedback("Fast", Some(4))).await;
    assert!(matches!(early, Err(AppError::BadRequest(_))));

    order_service::update_order_status(
        &state,
        &employee,
        order_id,
        UpdateOrderStatusRequest {
            status: "Delivered".into(),
        },
    )
    .await?;

    let submitted = feedback_service::submit_feedback(&state, &customer, order_id, feedback("Fast", Some(4))).await?;
    assert_eq!(submitted.data.expect("feedback").rating, 4);

    let duplicate = feedback_service::submit_feedback(&state, &customer, order_id, feedback("Again", None)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    // Catalog changes do not reach the order snapshot.
    product_service::update_product(
        &state,
        &employee,
        product_id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(99),
            quantity: None,
            category: None,
        },
    )
    .await?;
    let details = order_service::get_order(&state, &customer, order_id).await?;
    let details = details.data.expect("order");
    assert_eq!(details.order.total_price, 30);
    assert_eq!(details.items[0].price, 10);

    let by_product = feedback_service::get_feedback_by_product(&state, product_id).await?;
    assert_eq!(by_product.data.expect("list").items.len(), 1);

    // Deleting the order leaves its feedback behind.
    order_service::delete_order(&state, &employee, order_id).await?;
    let missing = order_service::get_order(&state, &customer, order_id).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let kept = feedback_service::get_feedback_by_order(&state, &customer, order_id).await?;
    assert_eq!(kept.data.expect("feedback").order_id, order_id);

    let by_user = feedback_service::get_feedback_by_user(&state, &customer, customer.user_id).await?;
    let items = by_user.data.expect("list").items;
    assert_eq!(items.len(), 1);
    assert!(items[0].order.is_none());

    Ok(())
}

#[tokio::test]
async fn removing_the_last_line_deletes_the_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = create_account(&state, ROLE_USER).await?;
    let product_id = create_product(&state, 250).await?;

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            user_id: customer.user_id,
            product_id,
            quantity: 1,
        },
    )
    .await?;

    let removed = cart_service::remove_item(&state, &customer, customer.user_id, product_id).await?;
    assert_eq!(removed.message, "Cart is empty and deleted");
    assert!(removed.data.expect("payload").cart.is_none());

    let gone = cart_service::get_cart(&state, &customer, customer.user_id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    let again = cart_service::remove_item(&state, &customer, customer.user_id, product_id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn checkout_keeps_the_receipt_and_drops_it_when_the_order_fails() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = create_account(&state, ROLE_USER).await?;
    let product_id = create_product(&state, 40).await?;

    let mut form = checkout_form(product_id, 2, 40, 80);
    form.file = Some(receipt());
    let placed = order_service::create_order(&state, &customer, form).await?;
    let receipt_name = placed.data.expect("order").order.receipt.expect("receipt");
    assert!(receipt_name.ends_with(".png"));
    assert!(state.config.upload_dir.join(&receipt_name).exists());

    // No users row for this caller, so the order insert fails inside the transaction.
    let ghost = AuthUser {
        user_id: Uuid::new_v4(),
        role: ROLE_USER.into(),
    };
    let mut form = checkout_form(product_id, 1, 40, 40);
    form.file = Some(receipt());
    let failed = order_service::create_order(&state, &ghost, form).await;
    assert!(failed.is_err());

    let mut stored = Vec::new();
    let mut entries = tokio::fs::read_dir(&state.config.upload_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        stored.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert_eq!(stored, vec![receipt_name]);

    tokio::fs::remove_dir_all(&state.config.upload_dir).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_product_names_are_a_conflict() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let employee = create_account(&state, ROLE_EMPLOYEE).await?;
    let name = format!("Ferris Mug {}", Uuid::new_v4());

    product_service::create_product(&state, &employee, product_form(&name)).await?;
    let again = product_service::create_product(&state, &employee, product_form(&name)).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let other = product_service::create_product(
        &state,
        &employee,
        product_form(&format!("Ferris Plate {}", Uuid::new_v4())),
    )
    .await?;
    let other_id = other.data.expect("product").id;
    let renamed = product_service::update_product(
        &state,
        &employee,
        other_id,
        UpdateProductRequest {
            name: Some(name),
            description: None,
            price: None,
            quantity: None,
            category: None,
        },
    )
    .await;
    assert!(matches!(renamed, Err(AppError::Conflict(_))));

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 5).await?;
    let upload_dir = std::env::temp_dir().join(format!("storefront-flow-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&upload_dir).await?;
    run_migrations(&pool).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "flow-secret".into(),
        db_max_connections: 5,
        upload_dir,
        upload_max_bytes: 1_000_000,
    };
    Ok(Some(AppState::new(pool, config)))
}

async fn create_account(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("{role}-{id}@example.com"))
        .bind(hash_password("secret123")?)
        .bind(role)
        .execute(&state.pool)
        .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.into(),
    })
}

async fn create_product(state: &AppState, price: i64) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test Widget {}", Uuid::new_v4())),
        description: Set("A product for testing".into()),
        image: Set(None),
        price: Set(price),
        quantity: Set(100),
        category: Set("testing".into()),
        status: Set(ProductStatus::Active),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

fn checkout_form(product_id: Uuid, quantity: i32, price: i64, total: i64) -> FormData {
    let items = serde_json::json!([
        { "product_id": product_id, "quantity": quantity, "price": price }
    ]);
    let mut form = FormData::default();
    for (key, value) in [
        ("address", "12 Harbour Road".to_string()),
        ("phone_number", "0771234567".to_string()),
        ("email", "buyer@example.com".to_string()),
        ("items", items.to_string()),
        ("total_price", total.to_string()),
    ] {
        form.fields.insert(key.to_string(), value);
    }
    form
}

fn feedback(text: &str, rating: Option<i16>) -> SubmitFeedbackRequest {
    SubmitFeedbackRequest {
        feedback: text.into(),
        rating,
    }
}

fn product_form(name: &str) -> FormData {
    let mut form = FormData::default();
    for (key, value) in [
        ("name", name),
        ("description", "Coffee tastes better"),
        ("price", "1200"),
        ("quantity", "4"),
        ("category", "kitchen"),
    ] {
        form.fields.insert(key.to_string(), value.to_string());
    }
    form
}

fn receipt() -> UploadedFile {
    UploadedFile {
        file_name: "receipt.png".into(),
        content_type: Some("image/png".into()),
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\nreceipt"),
    }
}
