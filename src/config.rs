use std::time::Duration;

use anyhow::Context;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "pg" => Ok(Self::Postgres),
            other => anyhow::bail!("unknown STORE_BACKEND {other:?} (expected memory or postgres)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Upper bound on a single store call, pool checkout included.
    pub query_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub sample_listings: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let backend = match std::env::var("STORE_BACKEND") {
            Ok(v) => v.parse::<StoreBackend>()?,
            Err(_) if database_url.is_some() => StoreBackend::Postgres,
            Err(_) => StoreBackend::Memory,
        };
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("STORE_BACKEND=postgres requires DATABASE_URL");
        }

        let store = StoreConfig {
            backend,
            database_url,
            max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            acquire_timeout: Duration::from_secs(env_parse("DB_ACQUIRE_TIMEOUT_SECS").unwrap_or(5)),
            query_timeout: Duration::from_secs(env_parse("DB_QUERY_TIMEOUT_SECS").unwrap_or(10)),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dapp-showcase".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "dapp-showcase-admin".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24),
        };

        let seed = SeedConfig {
            admin_username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".into()),
            admin_password: std::env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            sample_listings: std::env::var("SEED_SAMPLE_LISTINGS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        Ok(Self { store, jwt, seed })
    }

    /// In-memory configuration used by tests.
    pub fn for_tests() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 1,
                acquire_timeout: Duration::from_secs(1),
                query_timeout: Duration::from_secs(1),
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24,
            },
            seed: SeedConfig {
                admin_username: "admin".into(),
                admin_password: None,
                sample_listings: false,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_backend_names() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!(" pg ".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        let err = "sqlite".parse::<StoreBackend>().unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn test_config_defaults_to_memory_and_day_long_tokens() {
        let cfg = AppConfig::for_tests();
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.jwt.ttl_minutes, 1440);
    }
}
