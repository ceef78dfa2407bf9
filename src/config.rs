use std::{env, path::PathBuf};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 10);
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let upload_max_bytes = parse_or("UPLOAD_MAX_BYTES", 1_000_000);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            db_max_connections,
            upload_dir,
            upload_max_bytes,
        })
    }

    /// Body limit for the whole request: one upload plus room for the text fields.
    pub fn request_body_limit(&self) -> usize {
        self.upload_max_bytes + 64 * 1024
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_leaves_room_for_form_fields() {
        let config = AppConfig {
            database_url: "postgres://localhost/test".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "secret".into(),
            db_max_connections: 5,
            upload_dir: PathBuf::from("uploads"),
            upload_max_bytes: 1_000_000,
        };
        assert!(config.request_body_limit() > config.upload_max_bytes);
    }

    #[test]
    fn parse_or_falls_back_on_missing_key() {
        let port: u16 = parse_or("STOREFRONT_TEST_UNSET_KEY", 4242);
        assert_eq!(port, 4242);
    }
}
