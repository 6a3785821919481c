use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Upper bound on BANTER_TOKEN_TTL_DAYS (ten years).
const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_days: i64,
}

impl ServerConfig {
    /// Read `BANTER_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("BANTER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BANTER_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let db_path: PathBuf = get("BANTER_DB_PATH").unwrap_or_else(|| "banter.db".into()).into();
        let host = get("BANTER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("BANTER_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("BANTER_PORT must be a port number")?;
        let token_ttl_days: i64 = match get("BANTER_TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse()
                .context("BANTER_TOKEN_TTL_DAYS must be a whole number of days")?,
            None => 30,
        };
        if token_ttl_days <= 0 || token_ttl_days > MAX_TOKEN_TTL_DAYS {
            bail!("BANTER_TOKEN_TTL_DAYS must be between 1 and {}", MAX_TOKEN_TTL_DAYS);
        }

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            token_ttl_days,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("BANTER_JWT_SECRET", "a-long-random-value")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("banter.db"));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.token_ttl_days, 30);
        assert_eq!(cfg.listen_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("BANTER_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let secret = ("BANTER_JWT_SECRET", "a-long-random-value");
        assert!(config(&[secret, ("BANTER_PORT", "http")]).is_err());
        assert!(config(&[secret, ("BANTER_TOKEN_TTL_DAYS", "0")]).is_err());

    }

    #[test]
    fn token_lifetime_is_capped() {
        let secret = ("BANTER_JWT_SECRET", "a-long-random-value");
        assert!(config(&[secret, ("BANTER_TOKEN_TTL_DAYS", "200000000")]).is_err());
        assert!(config(&[secret, ("BANTER_TOKEN_TTL_DAYS", "3651")]).is_err());
        let cfg = config(&[secret, ("BANTER_TOKEN_TTL_DAYS", "3650")]).unwrap();
        assert_eq!(cfg.token_ttl_days, 3650);
    }

    #[test]
    fn listen_address_from_host_and_port() {
        let secret = ("BANTER_JWT_SECRET", "a-long-random-value");
        let cfg = config(&[secret, ("BANTER_PORT", "8080"), ("BANTER_HOST", "127.0.0.1")]).unwrap();
        assert_eq!(cfg.listen_addr().unwrap().to_string(), "127.0.0.1:8080");
    }
}
