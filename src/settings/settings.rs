use crate::application_impl::{CoordinatorConfig, ResolverConfig};
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub edge_store: EdgeStore,
    #[serde(default)]
    pub coordinator: Coordinator,
    #[serde(default)]
    pub resolver: Resolver,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct EdgeStore {
    pub backend: String, // "memory" or "mysql"
    pub dsn: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Coordinator {
    #[serde(default)]
    pub notify_on_unchanged: bool,
}

#[derive(Debug, Deserialize)]
pub struct Resolver {
    #[serde(default = "enabled")]
    pub remote_fallback: bool,
    #[serde(default = "enabled")]
    pub self_heal: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            remote_fallback: true,
            self_heal: true,
        }
    }
}

impl From<&Coordinator> for CoordinatorConfig {
    fn from(settings: &Coordinator) -> Self {
        CoordinatorConfig {
            notify_on_unchanged: settings.notify_on_unchanged,
        }
    }
}

impl From<&Resolver> for ResolverConfig {
    fn from(settings: &Resolver) -> Self {
        ResolverConfig {
            remote_fallback: settings.remote_fallback,
            self_heal: settings.self_heal,
        }
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Settings> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| anyhow!(e))?
            .try_deserialize()
            .map_err(|e| anyhow!(e))
    }

    #[test]
    fn test_minimal_settings_use_defaults() {
        let settings = from_toml(
            r#"
[log]
filter = "info"

[edge_store]
backend = "memory"
"#,
        )
        .unwrap();

        assert_eq!(settings.edge_store.backend, "memory");
        assert!(settings.edge_store.dsn.is_none());
        assert!(!settings.coordinator.notify_on_unchanged);
        assert!(settings.resolver.remote_fallback);
        assert!(settings.resolver.self_heal);
    }

    #[test]
    fn test_full_settings() {
        let settings = from_toml(
            r#"
[log]
filter = "friendgraph=debug"

[edge_store]
backend = "mysql"
dsn = "mysql://app:pw@localhost:3306/friendgraph"

[coordinator]
notify_on_unchanged = true

[resolver]
self_heal = false
"#,
        )
        .unwrap();

        let coordinator = CoordinatorConfig::from(&settings.coordinator);
        let resolver = ResolverConfig::from(&settings.resolver);
        assert!(coordinator.notify_on_unchanged);
        assert!(resolver.remote_fallback);
        assert!(!resolver.self_heal);
        assert_eq!(
            settings.edge_store.dsn.as_deref(),
            Some("mysql://app:pw@localhost:3306/friendgraph")
        );
    }

    #[test]
    fn test_missing_edge_store_is_an_error() {
        assert!(from_toml("[log]\nfilter = \"info\"\n").is_err());
        assert!(parse_settings(Some("settings/does-not-exist")).is_err());
    }
}
