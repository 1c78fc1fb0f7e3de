//! Process configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first when present, so
//! local development does not need exported variables.

use std::net::SocketAddr;

use time::Duration;

pub const DEFAULT_DATABASE_NAME: &str = "roadside";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
pub const DEFAULT_PRESENCE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for environment variable {key}")]
    Invalid { key: &'static str, value: String },
}

/// Key material used to sign bearer tokens.
#[derive(Clone)]
pub enum JwtKeys {
    /// HS256 shared secret.
    Secret(String),
    /// RS256 key pair, each a base64 encoded PEM document.
    Rsa {
        private_pem_base64: String,
        public_pem_base64: String,
    },
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secret(_) => f.write_str("JwtKeys::Secret(..)"),
            Self::Rsa { .. } => f.write_str("JwtKeys::Rsa(..)"),
        }
    }
}

/// Runtime knobs shared with the handlers through the application state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub access_token_ttl: Duration,
    pub presence_ttl: Duration,
    pub expose_reset_token: bool,
    pub bootstrap_admin_email: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            presence_ttl: Duration::seconds(DEFAULT_PRESENCE_TTL_SECS),
            expose_reset_token: false,
            bootstrap_admin_email: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub database_name: String,
    pub listen_addr: SocketAddr,
    pub jwt_keys: JwtKeys,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!("failed to load .env file: {err}");
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let mongodb_uri = required("MONGODB_URI")?;
        let database_name =
            lookup("DATABASE_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                value: listen_addr.clone(),
            })?;

        let jwt_keys = match (lookup("JWT_SECRET_KEY"), lookup("JWT_PUBLIC_KEY")) {
            (Some(private_pem_base64), Some(public_pem_base64)) => JwtKeys::Rsa {
                private_pem_base64,
                public_pem_base64,
            },
            _ => JwtKeys::Secret(required("JWT_SECRET")?),
        };

        let access_token_ttl = parse_number(
            &lookup,
            "ACCESS_TOKEN_TTL_MINUTES",
            DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
        )?;
        let presence_ttl = parse_number(&lookup, "PRESENCE_TTL_SECS", DEFAULT_PRESENCE_TTL_SECS)?;

        let expose_reset_token = match lookup("EXPOSE_RESET_TOKEN").as_deref() {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EXPOSE_RESET_TOKEN",
                    value: other.to_string(),
                })
            }
        };

        let bootstrap_admin_email = lookup("BOOTSTRAP_ADMIN_EMAIL").filter(|it| !it.is_empty());

        Ok(Self {
            mongodb_uri,
            database_name,
            listen_addr,
            jwt_keys,
            settings: Settings {
                access_token_ttl: Duration::minutes(access_token_ttl),
                presence_ttl: Duration::seconds(presence_ttl),
                expose_reset_token,
                bootstrap_admin_email,
            },
        })
    }
}

fn parse_number<F>(lookup: &F, key: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.parse::<i64>() {
            Ok(it) if it > 0 => Ok(it),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}
