use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("KIDSWEAR_ENV", "development"));

    let bind_addr: SocketAddr = parse_var(&or_default, "KIDSWEAR_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("KIDSWEAR_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default("KIDSWEAR_CATALOG_PATH", "./config/catalog.yaml"));

    let db_max_connections: u32 = parse_var(&or_default, "KIDSWEAR_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections: u32 = parse_var(&or_default, "KIDSWEAR_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs: u64 =
        parse_var(&or_default, "KIDSWEAR_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let free_shipping_threshold =
        parse_non_negative(&or_default, "KIDSWEAR_FREE_SHIPPING_THRESHOLD", "300")?;
    let shipping_flat_fee = parse_non_negative(&or_default, "KIDSWEAR_SHIPPING_FLAT_FEE", "30")?;
    let tax_rate = parse_non_negative(&or_default, "KIDSWEAR_TAX_RATE", "0.17")?;
    if tax_rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar {
            var: "KIDSWEAR_TAX_RATE".to_string(),
            reason: format!("tax rate must be a fraction below 1, got {tax_rate}"),
        });
    }

    let low_stock_default: i32 = parse_var(&or_default, "KIDSWEAR_LOW_STOCK_DEFAULT", "5")?;
    if low_stock_default < 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "KIDSWEAR_LOW_STOCK_DEFAULT".to_string(),
            reason: "threshold must be non-negative".to_string(),
        });
    }
    let new_arrival_days: i64 = parse_var(&or_default, "KIDSWEAR_NEW_ARRIVAL_DAYS", "30")?;
    let deals_min_discount_percent =
        parse_non_negative(&or_default, "KIDSWEAR_DEALS_MIN_DISCOUNT_PERCENT", "30")?;

    let store_max_retries: u32 = parse_var(&or_default, "KIDSWEAR_STORE_MAX_RETRIES", "3")?;
    let alert_scan_cron = or_default("KIDSWEAR_ALERT_SCAN_CRON", "0 */15 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        catalog_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        free_shipping_threshold,
        shipping_flat_fee,
        tax_rate,
        low_stock_default,
        new_arrival_days,
        deals_min_discount_percent,
        store_max_retries,
        alert_scan_cron,
    })
}

fn parse_var<T, D>(or_default: &D, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    D: Fn(&str, &str) -> String,
{
    let raw = or_default(var, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_non_negative<D>(or_default: &D, var: &str, default: &str) -> Result<Decimal, ConfigError>
where
    D: Fn(&str, &str) -> String,
{
    let value: Decimal = parse_var(or_default, var, default)?;
    if value.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("must be non-negative, got {value}"),
        });
    }
    Ok(value)
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
