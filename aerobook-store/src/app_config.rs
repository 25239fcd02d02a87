use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub gateways: GatewaysConfig,
    #[serde(default)]
    pub bank: BankConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// No url means the in-memory store.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_seconds: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            gateway_timeout_seconds: default_gateway_timeout(),
        }
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_gateway_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewaysConfig {
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub paypal: PaypalConfig,
    #[serde(default)]
    pub razorpay: RazorpayConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: Option<String>,
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        present(&self.secret_key)
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaypalConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// `sandbox` or `live`.
    pub environment: Option<String>,
}

impl PaypalConfig {
    pub fn is_configured(&self) -> bool {
        present(&self.client_id) && present(&self.client_secret)
    }

    pub fn api_base(&self) -> &'static str {
        match self.environment.as_deref() {
            Some("live") | Some("production") => "https://api-m.paypal.com",
            _ => "https://api-m.sandbox.paypal.com",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RazorpayConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
}

impl RazorpayConfig {
    pub fn is_configured(&self) -> bool {
        present(&self.key_id) && present(&self.key_secret)
    }
}

/// Static account details shown to bank transfer customers.
#[derive(Debug, Deserialize, Clone)]
pub struct BankConfig {
    #[serde(default = "default_bank_name")]
    pub bank_name: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub ifsc_code: String,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            bank_name: default_bank_name(),
            account_number: String::new(),
            ifsc_code: String::new(),
        }
    }
}

fn default_bank_name() -> String {
    "Example Bank".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && !self.from.trim().is_empty()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. AEROBOOK__GATEWAYS__STRIPE__SECRET_KEY=sk_test_...
            .add_source(config::Environment::with_prefix("AEROBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
