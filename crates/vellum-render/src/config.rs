//! Render configuration.
//!
//! A [`RenderConfig`] names the compiled catalog to load and tunes the
//! dispatcher. It can be built in code or loaded from YAML or JSON:
//!
//! ```yaml
//! catalog: build/templates.json   # relative to the config file
//! capture_output: true            # buffer output into the response
//! max_depth: 32                   # sub-template nesting limit
//! parameters:                     # global values for value lookup
//!   site: example.org
//! ```
//!
//! Every key is optional. Unknown keys are rejected.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::CatalogStore;
use crate::error::ConfigError;
use crate::lookup::TemplateLookup;
use crate::render::{capture_output, Render, RenderHooks};

/// Default limit for nested sub-template renders.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Settings of a [`Render`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Path of the compiled catalog.
    pub catalog: Option<PathBuf>,
    /// Whether output is captured into the response body.
    pub capture_output: bool,
    /// Maximum sub-template nesting.
    pub max_depth: usize,
    /// Global parameters, overridden per render by the info's parameters.
    pub parameters: IndexMap<String, Value>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            capture_output: true,
            max_depth: DEFAULT_MAX_DEPTH,
            parameters: IndexMap::new(),
            base_dir: None,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Loads a config file. `.json` files are read as JSON, anything else as
    /// YAML. A relative catalog path is resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut config = if is_json {
            Self::from_json(&source)?
        } else {
            Self::from_yaml(&source)?
        };
        config.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(path = %path.display(), "loaded render config");
        Ok(config)
    }

    pub fn with_catalog(mut self, catalog: impl Into<PathBuf>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// The catalog path, resolved against the config file's directory.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        let catalog = self.catalog.as_ref()?;
        match &self.base_dir {
            Some(base) if catalog.is_relative() => Some(base.join(catalog)),
            _ => Some(catalog.clone()),
        }
    }

    /// Loads the configured catalog.
    pub fn load_catalog(&self) -> Result<CatalogStore, ConfigError> {
        let path = self.catalog_path().ok_or(ConfigError::MissingCatalog)?;
        Ok(CatalogStore::from_path(path)?)
    }
}

impl Render {
    /// Builds a render from a config: loads its catalog and installs output
    /// capture when enabled.
    pub fn from_config(config: &RenderConfig) -> Result<Render, ConfigError> {
        let store = config.load_catalog()?;
        Ok(Render::from_store(store, config.clone()))
    }

    /// Builds a render over an already loaded catalog.
    pub fn from_store(store: CatalogStore, config: RenderConfig) -> Render {
        let hooks = if config.capture_output {
            capture_output(RenderHooks::new())
        } else {
            RenderHooks::new()
        };
        Render::from_shared(Arc::new(TemplateLookup::new(store)))
            .with_hooks(hooks)
            .with_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert!(config.capture_output);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_yaml_values() {
        let config = RenderConfig::from_yaml(
            "catalog: out/catalog.json\ncapture_output: false\nparameters:\n  site: example.org\n",
        )
        .unwrap();
        assert_eq!(config.catalog, Some(PathBuf::from("out/catalog.json")));
        assert!(!config.capture_output);
        assert_eq!(config.parameters.get("site"), Some(&json!("example.org")));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            RenderConfig::from_yaml("captur_output: true"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_missing_catalog() {
        assert!(matches!(
            RenderConfig::new().load_catalog(),
            Err(ConfigError::MissingCatalog)
        ));
    }

    #[test]
    fn test_catalog_resolved_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("catalog.json"),
            r#"{"files": ["a.tmp"], "names": {"A": [0]}}"#,
        )
        .unwrap();
        let config_path = dir.path().join("render.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(file, r#"{{"catalog": "catalog.json", "max_depth": 4}}"#).unwrap();

        let config = RenderConfig::from_path(&config_path).unwrap();
        assert_eq!(config.catalog_path(), Some(dir.path().join("catalog.json")));
        assert_eq!(config.max_depth, 4);

        let render = Render::from_config(&config).unwrap();
        assert_eq!(render.lookup().store().len(), 1);
        assert!(!render.hooks().is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RenderConfig::from_path("/nonexistent/render.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
