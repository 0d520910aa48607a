use serde::Deserialize;
use std::env;

use rotor_core::availability::DEFAULT_LOW_AVAILABILITY_PERCENT;
use rotor_core::booking::DEFAULT_REFERENCE_PREFIX;
use rotor_core::holds::{HoldPolicy, DEFAULT_HOLD_TTL_SECONDS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub hold_sweep_interval_seconds: u64,
    #[serde(default = "default_reference_prefix")]
    pub booking_reference_prefix: String,
    #[serde(default = "default_low_percent")]
    pub low_availability_percent: u32,
    #[serde(default = "default_flight_list_limit")]
    pub flight_list_limit: u32,
}

fn default_hold_ttl() -> u64 { DEFAULT_HOLD_TTL_SECONDS }
fn default_sweep_interval() -> u64 { 60 }
fn default_reference_prefix() -> String { DEFAULT_REFERENCE_PREFIX.to_string() }
fn default_low_percent() -> u32 { DEFAULT_LOW_AVAILABILITY_PERCENT }
fn default_flight_list_limit() -> u32 { 20 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: default_hold_ttl(),
            hold_sweep_interval_seconds: default_sweep_interval(),
            booking_reference_prefix: default_reference_prefix(),
            low_availability_percent: default_low_percent(),
            flight_list_limit: default_flight_list_limit(),
        }
    }
}

impl BusinessRules {
    pub fn hold_policy(&self) -> HoldPolicy {
        HoldPolicy {
            ttl_seconds: self.hold_ttl_seconds,
            low_availability_percent: self.low_availability_percent,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_window: 100, window_seconds: 60 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, untracked overrides
            .add_source(config::File::with_name("config/local").required(false))
            // ROTOR__DATABASE__URL=... sets database.url
            .add_source(config::Environment::with_prefix("ROTOR").separator("__"));

        Self::build(builder)
    }

    pub fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }
}
