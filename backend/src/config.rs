use std::env;

const MIN_SECRET_LEN: usize = 16;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} environment variable is required", key),
            ConfigError::Invalid(key, reason) => write!(f, "{} is invalid: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub token_ttl_minutes: i64,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(
                "JWT_SECRET",
                format!("must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let token_ttl_minutes = match lookup("TOKEN_TTL_MINUTES") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::Invalid(
                        "TOKEN_TTL_MINUTES",
                        format!("expected a positive number of minutes, got {:?}", raw),
                    ))
                }
            },
            None => 60,
        };

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::Invalid(
                        "DB_MAX_CONNECTIONS",
                        format!("expected a positive integer, got {:?}", raw),
                    ))
                }
            },
            None => 10,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            token_ttl_minutes,
            db_max_connections,
        })
    }
}
