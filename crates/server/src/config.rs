use std::env;

use anyhow::{bail, Context};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/taskboard.db?mode=rwc";

/// Hard-coded credentials that sign in without a credential store lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoAccount {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Default for DemoAccount {
    fn default() -> Self {
        Self {
            id: "65f3f3f3f3f3f3f3f3f3f3f3".to_string(),
            email: "demo@example.com".to_string(),
            password: "demo123".to_string(),
            name: "Demo User".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub session_secret: String,
    pub demo_account: Option<DemoAccount>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .with_context(|| format!("PORT must be a port number, got {p:?}"))?,
            None => DEFAULT_PORT,
        };

        let session_secret = match lookup("SESSION_SECRET") {
            Some(s) if !s.trim().is_empty() => s,
            _ => bail!("SESSION_SECRET must be set to sign session tokens"),
        };

        let demo_account = match lookup("DEMO_ACCOUNT").as_deref() {
            Some("off") | Some("false") | Some("0") => None,
            _ => Some(DemoAccount::default()),
        };

        Ok(Self {
            port,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            session_secret,
            demo_account,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_fails_fast() {
        let err = Config::from_vars(vars(&[])).err().unwrap();
        assert!(err.to_string().contains("SESSION_SECRET"));

        assert!(Config::from_vars(vars(&[("SESSION_SECRET", "  ")])).is_err());
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_vars(vars(&[("SESSION_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.session_secret, "s3cret");
        assert_eq!(config.demo_account, Some(DemoAccount::default()));
    }

    #[test]
    fn overrides_and_demo_toggle() {
        let config = Config::from_vars(vars(&[
            ("SESSION_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("DEMO_ACCOUNT", "off"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.demo_account.is_none());
    }

    #[test]
    fn bad_port_is_rejected() {
        let result = Config::from_vars(vars(&[("SESSION_SECRET", "x"), ("PORT", "http")]));
        assert!(result.is_err());
    }
}
