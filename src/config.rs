use crate::application::issuer::DEFAULT_EXPIRY_DAYS;
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_FRONTEND_URL: &str = "http://127.0.0.1:3000";

/// Runtime settings shared by every command. Each one can also come from
/// the environment.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the customer-facing frontend used to build payment links.
    #[arg(long, env = "FRONTEND_URL", default_value = DEFAULT_FRONTEND_URL, global = true)]
    pub frontend_url: String,

    /// Days a newly issued link stays valid.
    #[arg(long, env = "PAYLINK_LINK_EXPIRY_DAYS", default_value_t = DEFAULT_EXPIRY_DAYS, global = true)]
    pub link_expiry_days: i64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "PAYLINK_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYLINK_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Secret key for the Stripe API.
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true, global = true)]
    pub stripe_secret_key: Option<String>,

    /// Override for the Stripe API base URL.
    #[arg(long, env = "STRIPE_API_BASE", global = true)]
    pub stripe_api_base: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            link_expiry_days: DEFAULT_EXPIRY_DAYS,
            log_level: "info".to_string(),
            db_path: None,
            stripe_secret_key: None,
            stripe_api_base: None,
        }
    }
}
