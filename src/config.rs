use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

use crate::storage::codec::TimestampPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Csv,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "file" => Ok(Self::Csv),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?} (expected csv or memory)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub strict_timestamps: bool,
}

impl StorageConfig {
    pub fn timestamp_policy(&self) -> TimestampPolicy {
        if self.strict_timestamps {
            TimestampPolicy::Strict
        } else {
            TimestampPolicy::Lenient
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub actor: String, // recorded in createdBy/updatedBy for API mutations
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("resolve working directory")?;
        Self::from_lookup(cwd, |key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`; relative data dirs resolve against `cwd`.
    pub fn from_lookup(
        cwd: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let backend = match lookup("STORAGE_BACKEND") {
            Some(v) => v.parse()?,
            None => StorageBackend::Csv,
        };
        let data_dir = cwd.join(lookup("DATA_DIR").unwrap_or_else(|| "data".into()));
        let strict_timestamps = lookup("STRICT_TIMESTAMPS")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        let port = match lookup("APP_PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("invalid APP_PORT {v:?}"))?,
            None => 8080,
        };

        Ok(Self {
            storage: StorageConfig {
                backend,
                data_dir,
                strict_timestamps,
            },
            actor: lookup("USERS_ACTOR").unwrap_or_else(|| "webapp".into()),
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(PathBuf::from("/srv/app"), move |k| env.get(k).cloned())
    }

    #[test]
    fn defaults_match_the_api_deployment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Csv);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/srv/app/data"));
        assert_eq!(cfg.storage.timestamp_policy(), TimestampPolicy::Lenient);
        assert_eq!(cfg.actor, "webapp");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("STORAGE_BACKEND", "Memory"),
            ("DATA_DIR", "/var/lib/users"),
            ("STRICT_TIMESTAMPS", "true"),
            ("USERS_ACTOR", "cli"),
            ("APP_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/var/lib/users"));
        assert_eq!(cfg.storage.timestamp_policy(), TimestampPolicy::Strict);
        assert_eq!(cfg.actor, "cli");
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn rejects_unknown_backend_and_bad_port() {
        assert!(config(&[("STORAGE_BACKEND", "postgres")]).is_err());
        assert!(config(&[("APP_PORT", "eighty")]).is_err());
    }
}
