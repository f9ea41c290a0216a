use bastion_core::config::{FetchConfig, parse_var};
use bastion_core::error::AppError;

/// Server settings: the shared [`FetchConfig`] plus listener and outbound
/// policy.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub fetch: FetchConfig,
    pub port: u16,
    /// Allow webhook and redirect targets on private/reserved addresses.
    pub allow_private_urls: bool,
    /// Attempt budget for `/v1/resolve`. 1 disables retry.
    pub resolve_max_attempts: u32,
}

impl ServerConfig {
    /// Reads everything [`FetchConfig::from_env`] reads, plus
    /// `BASTION_PORT` (3000), `BASTION_ALLOW_PRIVATE_URLS` (false) and
    /// `BASTION_RESOLVE_MAX_ATTEMPTS` (1).
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = FetchConfig::from_lookup(&lookup)?;
        let port: u16 = parse_var(&lookup, "BASTION_PORT", 3000)?;
        let resolve_max_attempts: u32 = parse_var(&lookup, "BASTION_RESOLVE_MAX_ATTEMPTS", 1)?;

        let allow_private_urls = match lookup("BASTION_ALLOW_PRIVATE_URLS") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Invalid BASTION_ALLOW_PRIVATE_URLS '{raw}': expected true or false"
                ))
            })?,
        };

        Ok(Self {
            fetch,
            port,
            allow_private_urls,
            resolve_max_attempts,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
