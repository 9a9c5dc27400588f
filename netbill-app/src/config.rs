//! Configuration loading from environment.

use std::env;
use std::time::Duration;

/// Which gateway adapter the process runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    SwiftPay,
    Fake,
}

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub gateway_mode: GatewayMode,
    pub swiftpay_base_url: String,
    pub swiftpay_api_key: String,
    pub swiftpay_callback_secret: String,
    pub webhook_max_attempts: i64,
    pub webhook_retry_base: Duration,
    pub webhook_failure_ceiling: i64,
    pub webhook_timeout: Duration,
}

fn env_or<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {name}: {e}"))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env_or("PORT", "3000")?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let gateway_mode = match env::var("GATEWAY_MODE")
            .unwrap_or_else(|_| "swiftpay".to_string())
            .to_lowercase()
            .as_str()
        {
            "swiftpay" => GatewayMode::SwiftPay,
            "fake" => GatewayMode::Fake,
            other => anyhow::bail!("invalid GATEWAY_MODE: {other} (expected swiftpay or fake)"),
        };

        let swiftpay_base_url =
            env::var("SWIFTPAY_BASE_URL").unwrap_or_else(|_| "https://api.swiftpay.test".into());
        let swiftpay_api_key = env::var("SWIFTPAY_API_KEY").unwrap_or_default();
        let swiftpay_callback_secret = env::var("SWIFTPAY_CALLBACK_SECRET").unwrap_or_default();

        // The real provider needs credentials; the fake one does not.
        if gateway_mode == GatewayMode::SwiftPay
            && (swiftpay_api_key.is_empty() || swiftpay_callback_secret.is_empty())
        {
            anyhow::bail!(
                "SWIFTPAY_API_KEY and SWIFTPAY_CALLBACK_SECRET are required when GATEWAY_MODE=swiftpay"
            );
        }

        Ok(Self {
            port,
            database_url,
            gateway_mode,
            swiftpay_base_url,
            swiftpay_api_key,
            swiftpay_callback_secret,
            webhook_max_attempts: env_or("WEBHOOK_MAX_ATTEMPTS", "3")?,
            webhook_retry_base: Duration::from_secs(env_or("WEBHOOK_RETRY_BASE_SECS", "30")?),
            webhook_failure_ceiling: env_or("WEBHOOK_FAILURE_CEILING", "10")?,
            webhook_timeout: Duration::from_secs(env_or("WEBHOOK_TIMEOUT_SECS", "10")?),
        })
    }
}
