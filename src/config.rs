// src/config.rs

use std::env;
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// JWT lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    /// Seed credentials for the initial admin account.
    pub admin_login_code: Option<String>,
    pub admin_pin: Option<String>,
    /// Tolerance subtracted from the server-side exam deadline before an
    /// auto-submit request is accepted, to absorb client clock skew.
    pub auto_submit_grace_secs: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let admin_login_code = env::var("ADMIN_LOGIN_CODE").ok();
        let admin_pin = env::var("ADMIN_PIN").ok();

        let auto_submit_grace_secs = env::var("AUTO_SUBMIT_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_login_code,
            admin_pin,
            auto_submit_grace_secs,
        }
    }
}
