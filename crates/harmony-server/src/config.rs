use std::path::PathBuf;

use anyhow::Context;

/// Runtime settings, read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Create the welcome community when a session finds the store empty.
    pub seed_defaults: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let port = var("HARMONY_PORT", "3000");
        let port = port
            .parse()
            .with_context(|| format!("HARMONY_PORT must be a port number, got '{}'", port))?;

        let seed = var("HARMONY_SEED_DEFAULTS", "true");
        let seed_defaults = match seed.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => anyhow::bail!("HARMONY_SEED_DEFAULTS must be true or false, got '{}'", seed),
        };

        Ok(Self {
            jwt_secret: var("HARMONY_JWT_SECRET", "dev-secret-change-me"),
            db_path: PathBuf::from(var("HARMONY_DB_PATH", "harmony.db")),
            host: var("HARMONY_HOST", "0.0.0.0"),
            port,
            seed_defaults,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.jwt_secret, "dev-secret-change-me");
        assert_eq!(config.db_path, PathBuf::from("harmony.db"));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.seed_defaults);
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("HARMONY_PORT", "8080"),
            ("HARMONY_DB_PATH", "/tmp/h.db"),
            ("HARMONY_SEED_DEFAULTS", "false"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/h.db"));
        assert!(!config.seed_defaults);
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(config(&[("HARMONY_PORT", "http")]).is_err());
        assert!(config(&[("HARMONY_SEED_DEFAULTS", "maybe")]).is_err());
    }
}
