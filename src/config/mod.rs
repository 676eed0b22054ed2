use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid URL in {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Only optional so `--memory` runs can start without a database
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Identity provider settings for verifying bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub audience: String,
    pub issuer: Url,
    pub jwks_url: Url,
    pub jwks_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Empty means any origin
    pub cors_origins: Vec<String>,
}

impl AuthConfig {
    /// Issuer `https://<domain>/` and its well-known JWKS document
    pub fn for_domain(domain: &str, audience: impl Into<String>) -> Result<Self, ConfigError> {
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };
        let issuer = Url::parse(&base)
            .and_then(|url| url.join("/"))
            .map_err(|source| ConfigError::InvalidUrl { name: "AUTH0_DOMAIN", source })?;
        let jwks_url = issuer
            .join(".well-known/jwks.json")
            .map_err(|source| ConfigError::InvalidUrl { name: "AUTH0_DOMAIN", source })?;

        Ok(Self {
            audience: audience.into(),
            issuer,
            jwks_url,
            jwks_cache_ttl_secs: 600,
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let domain = lookup("AUTH0_DOMAIN").ok_or(ConfigError::Missing("AUTH0_DOMAIN"))?;
        let audience = lookup("API_AUDIENCE").ok_or(ConfigError::Missing("API_AUDIENCE"))?;
        let mut auth = AuthConfig::for_domain(&domain, audience)?;
        auth.jwks_cache_ttl_secs = environment.default_jwks_ttl();

        let config = Self {
            environment,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: environment.default_database(),
            auth,
            security: SecurityConfig {
                cors_origins: environment.default_cors_origins(),
            },
        };

        config.with_overrides(&lookup)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        self.database.url = lookup("DATABASE_URL").or(self.database.url);
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Auth overrides
        if let Some(v) = lookup("AUTH0_ISSUER") {
            self.auth.issuer = Url::parse(&v)
                .map_err(|source| ConfigError::InvalidUrl { name: "AUTH0_ISSUER", source })?;
        }
        if let Some(v) = lookup("AUTH0_JWKS_URL") {
            self.auth.jwks_url = Url::parse(&v)
                .map_err(|source| ConfigError::InvalidUrl { name: "AUTH0_JWKS_URL", source })?;
        }
        if let Some(v) = lookup("JWKS_CACHE_TTL_SECS") {
            self.auth.jwks_cache_ttl_secs = v.parse().unwrap_or(self.auth.jwks_cache_ttl_secs);
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(self)
    }
}

impl Environment {
    fn default_database(self) -> DatabaseConfig {
        let (max_connections, connection_timeout) = match self {
            Environment::Development => (5, 30),
            Environment::Staging => (10, 10),
            Environment::Production => (20, 5),
        };
        DatabaseConfig {
            url: None,
            max_connections,
            connection_timeout,
        }
    }

    fn default_jwks_ttl(self) -> u64 {
        match self {
            Environment::Development => 60,
            Environment::Staging | Environment::Production => 600,
        }
    }

    fn default_cors_origins(self) -> Vec<String> {
        match self {
            Environment::Development => Vec::new(),
            Environment::Staging => vec!["https://staging.example.com".to_string()],
            Environment::Production => vec!["https://app.example.com".to_string()],
        }
    }
}
