use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    error::AppError,
    models::ROLE_EMPLOYEE,
    state::AppState,
};

/// Caller identity resolved from the bearer token of the current request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_employee(&self) -> bool {
        self.role == ROLE_EMPLOYEE
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_employee(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_EMPLOYEE)
}

/// Customers may only act on their own records; employees may act on anyone's.
pub fn ensure_self_or_employee(user: &AuthUser, owner_id: Uuid) -> Result<(), AppError> {
    if user.user_id == owner_id || user.is_employee() {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: decoded.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROLE_USER;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role: role.into(),
        }
    }

    #[test]
    fn customers_cannot_act_for_other_users() {
        let customer = user(ROLE_USER);
        assert!(ensure_self_or_employee(&customer, customer.user_id).is_ok());
        assert!(matches!(
            ensure_self_or_employee(&customer, Uuid::new_v4()),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn employees_can_act_for_anyone() {
        let employee = user(ROLE_EMPLOYEE);
        assert!(ensure_self_or_employee(&employee, Uuid::new_v4()).is_ok());
        assert!(ensure_employee(&employee).is_ok());
        assert!(ensure_employee(&user(ROLE_USER)).is_err());
    }
}
