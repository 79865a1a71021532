use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use rolodex_cache::DEFAULT_USER_TTL;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub user_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("ROLODEX_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ROLODEX_JWT_SECRET is unset or still a placeholder; set it in .env");
        }

        let host = get("ROLODEX_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("ROLODEX_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("ROLODEX_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("ROLODEX_HOST must be an IP address")?;

        let db_path: PathBuf = get("ROLODEX_DB_PATH")
            .unwrap_or_else(|| "rolodex.db".into())
            .into();

        let redis_url = get("ROLODEX_REDIS_URL").filter(|url| !url.is_empty());

        let user_cache_ttl = match get("ROLODEX_USER_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .context("ROLODEX_USER_CACHE_TTL_SECS must be a number of seconds")?,
            ),
            None => DEFAULT_USER_TTL,
        };

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            redis_url,
            user_cache_ttl,
        })
    }
}
