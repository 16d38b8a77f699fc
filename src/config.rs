use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Lowest bcrypt work factor accepted by `PASSWORD_HASH_COST`
pub const MIN_HASH_COST: u32 = 4;
/// Highest bcrypt work factor accepted by `PASSWORD_HASH_COST`
pub const MAX_HASH_COST: u32 = 31;
/// Upper bound for either token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub accounts: AccountConfig,
    pub node: NodeConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub refresh_secret: String,
    pub refresh_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// bcrypt work factor
    pub password_hash_cost: u32,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            password_hash_cost: 10,
        }
    }
}

impl TokenConfig {
    /// Token settings with the default lifetimes and the given secrets
    pub fn with_secrets(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            access_ttl_seconds: 1800,              // 30 minutes
            cleanup_interval_seconds: 3600,
            refresh_secret: refresh_secret.into(),
            refresh_ttl_seconds: 365 * 24 * 3600, // 1 year
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let access_secret = std::env::var("ACCESS_TOKEN_SECRET").map_err(|_| {
            ConfigError::ValidationError("ACCESS_TOKEN_SECRET is required".to_string())
        })?;
        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET").map_err(|_| {
            ConfigError::ValidationError("REFRESH_TOKEN_SECRET is required".to_string())
        })?;

        let mut tokens = TokenConfig::with_secrets(access_secret, refresh_secret);
        if let Some(ttl) = env_number("ACCESS_TOKEN_TTL_SECONDS")? {
            tokens.access_ttl_seconds = ttl;
        }
        if let Some(ttl) = env_number("REFRESH_TOKEN_TTL_SECONDS")? {
            tokens.refresh_ttl_seconds = ttl;
        }
        if let Some(interval) = env_number("CLEANUP_INTERVAL_SECONDS")? {
            tokens.cleanup_interval_seconds = interval;
        }

        let accounts = AccountConfig {
            password_hash_cost: env_number("PASSWORD_HASH_COST")?
                .map(|c| u32::try_from(c).unwrap_or(u32::MAX))
                .unwrap_or(AccountConfig::default().password_hash_cost),
        };

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            accounts,
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            test_mode,
            tokens,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tokens = &self.tokens;
        if tokens.access_secret.is_empty() || tokens.refresh_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "token secrets cannot be empty".to_string(),
            ));
        }
        if tokens.access_secret == tokens.refresh_secret {
            return Err(ConfigError::ValidationError(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }
        if tokens.access_ttl_seconds == 0 || tokens.refresh_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be greater than 0".to_string(),
            ));
        }
        if tokens.access_ttl_seconds > MAX_TOKEN_TTL_SECONDS
            || tokens.refresh_ttl_seconds > MAX_TOKEN_TTL_SECONDS
        {
            return Err(ConfigError::ValidationError(format!(
                "token lifetimes must be at most {MAX_TOKEN_TTL_SECONDS} seconds"
            )));
        }
        if tokens.cleanup_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "CLEANUP_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.accounts.password_hash_cost) {
            return Err(ConfigError::ValidationError(format!(
                "PASSWORD_HASH_COST must be between {MIN_HASH_COST} and {MAX_HASH_COST}"
            )));
        }

        if tokens.access_ttl_seconds >= tokens.refresh_ttl_seconds {
            tracing::warn!(
                access_ttl = tokens.access_ttl_seconds,
                refresh_ttl = tokens.refresh_ttl_seconds,
                "Access token lifetime is not shorter than refresh token lifetime"
            );
        }

        Ok(())
    }
}

fn env_number(name: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!("{name} must be a non-negative integer"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;

    #[test]
    fn test_default_lifetimes() {
        let tokens = TokenConfig::with_secrets("a", "r");
        assert_eq!(tokens.access_ttl_seconds, 30 * 60);
        assert_eq!(tokens.refresh_ttl_seconds, 31_536_000);
    }

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_shared_secret() {
        let mut config = test_config();
        config.tokens.refresh_secret = config.tokens.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = test_config();
        config.tokens.access_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = test_config();
        config.tokens.access_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_ttl() {
        let mut config = test_config();
        config.tokens.refresh_ttl_seconds = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.tokens.access_ttl_seconds = 10_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.tokens.refresh_ttl_seconds = MAX_TOKEN_TTL_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_hash_cost() {
        let mut config = test_config();
        config.accounts.password_hash_cost = 99;
        assert!(config.validate().is_err());
        config.accounts.password_hash_cost = MIN_HASH_COST - 1;
        assert!(config.validate().is_err());
        config.accounts.password_hash_cost = MAX_HASH_COST;
        assert!(config.validate().is_ok());
    }
}
