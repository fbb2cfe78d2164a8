//! Backend configuration, read from TOML. Every key is optional.
//!
//! ```toml
//! [store]
//! path = "data/records"
//! flush_on_write = true
//!
//! [search]
//! default_page_size = 20
//! max_page_size = 100
//! upcoming_window_days = 7
//! ```
use anyhow::Context;
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub store: StoreConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Throw the store away on drop; used by tests and demos.
    pub temporary: bool,
    /// Flush to disk after every write instead of relying on sled's background flush.
    pub flush_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/records"),
            temporary: false,
            flush_on_write: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub upcoming_window_days: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            upcoming_window_days: 7,
        }
    }
}

impl SearchConfig {
    /// Window used by the "upcoming" listings; negative values collapse to zero.
    pub fn upcoming_window(&self) -> TimeDelta {
        TimeDelta::try_days(self.upcoming_window_days.max(0)).unwrap_or(TimeDelta::MAX)
    }
}

impl BackendConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("invalid backend configuration")?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    fn check(&self) -> anyhow::Result<()> {
        let search = &self.search;
        if search.default_page_size == 0 || search.max_page_size == 0 {
            anyhow::bail!("page sizes must be at least 1");
        }
        if search.default_page_size > search.max_page_size {
            anyhow::bail!(
                "default_page_size {} exceeds max_page_size {}",
                search.default_page_size,
                search.max_page_size
            );
        }
        Ok(())
    }

    pub fn open_store(&self) -> anyhow::Result<sled::Db> {
        let mut store = sled::Config::new().temporary(self.store.temporary);
        if !self.store.temporary {
            store = store.path(&self.store.path);
        }
        store
            .open()
            .with_context(|| format!("failed to open store at {}", self.store.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = BackendConfig::from_toml_str("[search]\nmax_page_size = 50\n").unwrap();

        assert_eq!(config.search.max_page_size, 50);
        assert_eq!(config.search.default_page_size, 20);
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.search.upcoming_window(), TimeDelta::days(7));
    }

    #[test]
    fn inconsistent_page_sizes_are_rejected() {
        let err = BackendConfig::from_toml_str("[search]\ndefault_page_size = 200\n").unwrap_err();

        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BackendConfig::from_toml_str("[store]\npaht = \"x\"\n").is_err());
    }
}
