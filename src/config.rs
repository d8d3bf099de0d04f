//! Settings file and on-disk locations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::MenuTreeBuilder;
use crate::catalog::{self, CatalogMode};
use crate::error::CatalogError;
use crate::model::BuildReport;
use crate::resolver::{ActionResolver, HostCommands};
use crate::store::{KeyValueStore, MenuStore};

pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub theme_file: PathBuf,
    pub store_dir: PathBuf,
    pub log_file: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("Unable to determine home directory")?;
        Self::at(home.join(".local/menu-catalog"))
    }

    pub fn at(config_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("creating {}", config_dir.display()))?;
        Ok(Self {
            settings_file: config_dir.join("settings.json"),
            theme_file: config_dir.join("theme.json"),
            store_dir: config_dir.join("store"),
            log_file: config_dir.join("menu-catalog.log"),
            config_dir,
        })
    }
}

/// One place menus are built from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Directory {
        path: PathBuf,
        #[serde(default)]
        name: Option<String>,
    },
    Csv {
        path: PathBuf,
        #[serde(default)]
        mode: CatalogMode,
        #[serde(default)]
        name: Option<String>,
    },
    Store {
        namespace: String,
    },
}

impl SourceConfig {
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Directory { path, .. } => format!("directory {}", path.display()),
            SourceConfig::Csv { path, .. } => format!("csv {}", path.display()),
            SourceConfig::Store { namespace } => format!("store {namespace}"),
        }
    }

    pub fn build<S: KeyValueStore>(
        &self,
        resolver: ActionResolver<'_>,
        store: &MenuStore<S>,
    ) -> Result<BuildReport, CatalogError> {
        match self {
            SourceConfig::Directory { path, name } => {
                MenuTreeBuilder::new(resolver).build(path, name.as_deref())
            }
            SourceConfig::Csv { path, mode, name } => {
                catalog::build_from_csv(path, *mode, name.as_deref())
            }
            SourceConfig::Store { namespace } => store.import(namespace),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub host: HostCommands,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default = "default_export_namespace")]
    pub export_namespace: String,
}

fn default_export_namespace() -> String {
    "menu-catalog/exported".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: Some("Menu Catalog".into()),
            host: HostCommands::default(),
            sources: Vec::new(),
            export_namespace: default_export_namespace(),
        }
    }
}

impl Settings {
    /// Reads `path`, writing the defaults there first when it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let data = fs::read_to_string(path)?;
            let parsed: Settings = serde_json::from_str(&data)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(parsed)
        } else {
            let default = Self::default_data();
            default.save(path)?;
            Ok(default)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn default_data() -> Self {
        let mut settings = Self::default();
        if let Some(home) = dirs::home_dir() {
            settings.sources.push(SourceConfig::Directory {
                path: home.join(".local/menu-catalog/menus"),
                name: Some("Menus".into()),
            });
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_settings_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.export_namespace, "menu-catalog/exported");
    }

    #[test]
    fn sources_parse_from_tagged_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "sources": [
                    {"type": "directory", "path": "/menus"},
                    {"type": "csv", "path": "/apps.csv", "mode": "lookup"},
                    {"type": "store", "namespace": "Software/Tools"}
                ],
                "host": {"url_handler": "firefox"}
            }"#,
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.sources.len(), 3);
        assert_eq!(
            settings.sources[1],
            SourceConfig::Csv {
                path: PathBuf::from("/apps.csv"),
                mode: CatalogMode::Lookup,
                name: None,
            }
        );
        assert_eq!(settings.host.url_handler, "firefox");
        assert!(!settings.host.script_editor.is_empty());
    }
}
