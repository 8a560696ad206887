use anyhow::{anyhow, Context};
use std::collections::HashMap;

const DEFAULT_VNPAY_PAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

/// VNPay merchant settings used to sign outbound URLs and verify IPNs.
#[derive(Debug, Clone)]
pub struct VnPayConfig {
    /// Merchant terminal code (`vnp_TmnCode`)
    pub tmn_code: String,

    /// Shared secret for HMAC-SHA512 signatures
    pub hash_secret: String,

    /// Gateway payment page
    pub pay_url: String,

    /// Where the gateway sends the buyer back after paying
    pub return_url: String,
}

/// Server configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    /// Postgres connection string; `None` runs against the in-memory store
    pub database_url: Option<String>,
    pub max_connections: u32,

    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    pub cors_allowed_origins: Vec<String>,
    pub vnpay: VnPayConfig,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        let port = get("SERVER_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("Invalid SERVER_PORT")?;

        let max_connections = get("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .context("Invalid DATABASE_MAX_CONNECTIONS")?;

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(AppConfig {
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: get("DATABASE_URL"),
            max_connections,
            jwt_secret: require("JWT_SECRET")?,
            cors_allowed_origins,
            vnpay: VnPayConfig {
                tmn_code: get("VNPAY_TMN_CODE").unwrap_or_default(),
                hash_secret: require("VNPAY_HASH_SECRET")?,
                pay_url: get("VNPAY_PAY_URL").unwrap_or_else(|| DEFAULT_VNPAY_PAY_URL.to_string()),
                return_url: get("VNPAY_RETURN_URL")
                    .unwrap_or_else(|| "http://localhost:3000/payment-success".to_string()),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
