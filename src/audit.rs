use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, middleware::auth::AuthUser};

async fn insert(
    pool: &DbPool,
    user_id: Uuid,
    action: &str,
    resource: &str,
    metadata: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;
    Ok(())
}

/// Audit a state change made by an authenticated caller.
pub async fn record(pool: &DbPool, user: &AuthUser, action: &str, resource: &str, metadata: Value) {
    record_for(pool, user.user_id, action, resource, metadata).await
}

/// Audit entries never fail the request; errors are only logged.
pub async fn record_for(pool: &DbPool, user_id: Uuid, action: &str, resource: &str, metadata: Value) {
    if let Err(err) = insert(pool, user_id, action, resource, metadata).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
