use std::env;
use std::path::PathBuf;

use crate::utils::AppError;

pub const DEFAULT_YELP_API_BASE: &str = "https://api.yelp.com/v3";
pub const DEFAULT_RESTAURANT_LOCATION: &str = "Vancouver, BC";

/// Which persistence backend the server runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo { uri: String },
    Memory,
}

/// How bearer tokens are verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// RS256 tokens checked against the provider's published JWK set.
    Jwks { domain: String, audience: String },
    /// HS256 tokens signed with a shared secret (local development).
    SharedSecret { secret: String, audience: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub auth: AuthMode,
    pub yelp_api_key: Option<String>,
    pub yelp_api_base: String,
    pub default_restaurant_location: String,
    pub upload_dir: PathBuf,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Configuration(format!("PORT is not a valid port: {}", raw)))?,
            None => 5001,
        };

        let store = match get("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("mongo") | None => StoreBackend::Mongo {
                uri: get("DATABASE_URL")
                    .ok_or_else(|| AppError::Configuration("DATABASE_URL must be set".to_string()))?,
            },
            Some(other) => {
                return Err(AppError::Configuration(format!(
                    "Unknown STORE_BACKEND: {}. Supported: mongo, memory",
                    other
                )))
            }
        };

        let auth = match (get("AUTH0_DOMAIN"), get("JWT_SECRET")) {
            (Some(domain), _) => AuthMode::Jwks {
                audience: get("AUTH0_AUDIENCE").ok_or_else(|| {
                    AppError::Configuration("AUTH0_AUDIENCE must be set with AUTH0_DOMAIN".to_string())
                })?,
                domain,
            },
            (None, Some(secret)) => AuthMode::SharedSecret {
                secret,
                audience: get("AUTH0_AUDIENCE"),
            },
            (None, None) => {
                return Err(AppError::Configuration(
                    "Either AUTH0_DOMAIN or JWT_SECRET must be set".to_string(),
                ))
            }
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:3000".to_string(),
                ]
            });

        Ok(Config {
            host,
            port,
            store,
            auth,
            yelp_api_key: get("YELP_API_KEY"),
            yelp_api_base: get("YELP_API_BASE").unwrap_or_else(|| DEFAULT_YELP_API_BASE.to_string()),
            default_restaurant_location: get("DEFAULT_RESTAURANT_LOCATION")
                .unwrap_or_else(|| DEFAULT_RESTAURANT_LOCATION.to_string()),
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            cors_origins,
        })
    }
}
