use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::services::billing::INACTIVE_AFTER_DAYS;

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub smtp: SmtpConfig,
    pub billing: BillingConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub session_ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Days past the later of last-payment date and due date after which a
    /// client is listed as inactive.
    pub inactive_after_days: u32,
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// When set, the reminder endpoint requires a matching
    /// `x-sweep-secret` header.
    pub secret: Option<Secret<String>>,
}

impl MembershipConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(MembershipConfig {
            common,
            mongodb: MongoConfig {
                uri: Secret::new(get_env(
                    "MEMBERSHIP_MONGODB_URI",
                    Some("mongodb://localhost:27017"),
                    is_prod,
                )?),
                database: get_env("MEMBERSHIP_DATABASE_NAME", Some("membership_db"), is_prod)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(get_env(
                    "MEMBERSHIP_JWT_SECRET",
                    Some("dev-session-secret"),
                    is_prod,
                )?),
                session_ttl_seconds: get_env(
                    "MEMBERSHIP_SESSION_TTL_SECONDS",
                    Some("604800"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(604_800),
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@example.com"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Membership Service"), is_prod)?,
                enabled: env::var("SMTP_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            billing: BillingConfig {
                inactive_after_days: env::var("MEMBERSHIP_INACTIVE_AFTER_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(INACTIVE_AFTER_DAYS),
            },
            sweep: SweepConfig {
                secret: env::var("MEMBERSHIP_SWEEP_SECRET").ok().map(Secret::new),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
