use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    models::{ROLE_EMPLOYEE, ROLE_USER},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    let employee_id = ensure_account(&pool, "staff@example.com", "staff123", ROLE_EMPLOYEE).await?;
    let user_id = ensure_account(&pool, "user@example.com", "user123", ROLE_USER).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Employee ID: {employee_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_account(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured account {email} (role={role})");
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 5500, 50, "apparel", "active"),
        ("Ferris Mug", "Coffee tastes better with Ferris", 1200, 100, "kitchen", "active"),
        ("Rust Sticker Pack", "Decorate your laptop", 500, 200, "accessories", "active"),
        ("Async Rust Poster", "Retired print run", 2500, 0, "decor", "inactive"),
    ];

    for (name, description, price, quantity, category, status) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, quantity, category, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(price as i64)
        .bind(quantity as i32)
        .bind(category)
        .bind(status)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
