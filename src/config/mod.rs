use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub master_db: DbCredentials,
    pub trust_db: DbCredentials,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub api: ApiConfig,
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
    pub port: u16,
    pub backend_url: String,
}

/// Host and login for one MySQL server. `database` is only meaningful for the master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    pub trust_cache_ttl_secs: u64,
    pub dev_trust_slug: String,
    pub wizard_timeout_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub auth_rate_limit_requests: u32,
    /// Peers whose `X-Forwarded-For` header is believed. Empty means the
    /// socket address alone identifies the client.
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("NODE_ENV").or_else(|_| env::var("APP_ENV")).as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("BACKEND_URL") {
            self.server.backend_url = v;
        }

        // Master database
        if let Ok(v) = env::var("MASTER_DB_HOST") {
            self.master_db.host = v;
        }
        if let Ok(v) = env::var("MASTER_DB_PORT") {
            self.master_db.port = v.parse().unwrap_or(self.master_db.port);
        }
        if let Ok(v) = env::var("MASTER_DB_USER") {
            self.master_db.user = v;
        }
        if let Ok(v) = env::var("MASTER_DB_PASS") {
            self.master_db.password = v;
        }
        if let Ok(v) = env::var("MASTER_DB_NAME") {
            self.master_db.database = v;
        }

        // Trust databases fall back to the master server when unset
        self.trust_db = DbCredentials {
            host: env::var("TRUST_DB_HOST").unwrap_or_else(|_| self.master_db.host.clone()),
            port: env::var("TRUST_DB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.master_db.port),
            user: env::var("TRUST_DB_USER").unwrap_or_else(|_| self.master_db.user.clone()),
            password: env::var("TRUST_DB_PASS").unwrap_or_else(|_| self.master_db.password.clone()),
            database: String::new(),
        };

        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TRUST_CACHE_TTL_SECS") {
            self.tenancy.trust_cache_ttl_secs = v.parse().unwrap_or(self.tenancy.trust_cache_ttl_secs);
        }
        if let Ok(v) = env::var("DEV_TRUST_SLUG") {
            self.tenancy.dev_trust_slug = v;
        }
        if let Ok(v) = env::var("WIZARD_TIMEOUT_MINUTES") {
            self.tenancy.wizard_timeout_minutes = v.parse().unwrap_or(self.tenancy.wizard_timeout_minutes);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_AUTH_RATE_LIMIT_REQUESTS") {
            self.api.auth_rate_limit_requests = v.parse().unwrap_or(self.api.auth_rate_limit_requests);
        }
        if let Ok(v) = env::var("API_TRUSTED_PROXIES") {
            self.api.trusted_proxies = v.split(',').filter_map(|s| s.trim().parse().ok()).collect();
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        self
    }

    fn local_master_db() -> DbCredentials {
        DbCredentials {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "school_erp_master".to_string(),
        }
    }

    pub(crate) fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                backend_url: "http://localhost:3000".to_string(),
            },
            master_db: Self::local_master_db(),
            trust_db: Self::local_master_db(),
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            tenancy: TenancyConfig {
                trust_cache_ttl_secs: 15 * 60,
                dev_trust_slug: "dev-trust".to_string(),
                wizard_timeout_minutes: 60,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 15 * 60,
                auth_rate_limit_requests: 100,
                trusted_proxies: Vec::new(),
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 4,
            },
        }
    }

    pub(crate) fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                backend_url: "https://staging.example.com".to_string(),
            },
            master_db: Self::local_master_db(),
            trust_db: Self::local_master_db(),
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            tenancy: TenancyConfig {
                trust_cache_ttl_secs: 15 * 60,
                dev_trust_slug: "dev-trust".to_string(),
                wizard_timeout_minutes: 30,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 500,
                rate_limit_window_secs: 15 * 60,
                auth_rate_limit_requests: 20,
                trusted_proxies: Vec::new(),
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                bcrypt_cost: 10,
            },
        }
    }

    pub(crate) fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                backend_url: "https://app.example.com".to_string(),
            },
            master_db: Self::local_master_db(),
            trust_db: Self::local_master_db(),
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            tenancy: TenancyConfig {
                trust_cache_ttl_secs: 15 * 60,
                dev_trust_slug: "dev-trust".to_string(),
                wizard_timeout_minutes: 30,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 15 * 60,
                auth_rate_limit_requests: 10,
                trusted_proxies: Vec::new(),
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                bcrypt_cost: 12,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults_allow_dev_tenant() {
        let config = AppConfig::development();
        assert!(config.is_development());
        assert_eq!(config.tenancy.dev_trust_slug, "dev-trust");
        assert_eq!(config.tenancy.trust_cache_ttl_secs, 900);
        assert!(!config.api.enable_rate_limiting);
    }

    #[test]
    fn production_requires_explicit_secret() {
        let config = AppConfig::production();
        assert!(config.is_production());
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.api.enable_rate_limiting);
    }

    #[test]
    fn secrets_are_not_serialized() {
        let config = AppConfig::development();
        let value = serde_json::to_value(&config).unwrap();
        assert!(value["security"].get("jwt_secret").is_none());
        assert!(value["master_db"].get("password").is_none());
    }
}
