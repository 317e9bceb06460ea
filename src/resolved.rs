//! The loaded configuration as an immutable view, and the process-wide
//! handle to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::LayerfigError;
use crate::format::FileFormat;
use crate::parse::ParsedValue;
use crate::tree;
use crate::types::{ConfigSource, SourceKind};

/// A fully loaded configuration. Read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    parsed: ParsedValue,
    source: SourceKind,
    format: FileFormat,
    file_source: Option<PathBuf>,
    environment: Option<String>,
}

impl ResolvedConfig {
    pub(crate) fn new(
        parsed: ParsedValue,
        source: SourceKind,
        format: FileFormat,
        file_source: Option<PathBuf>,
        environment: Option<String>,
    ) -> Self {
        Self {
            parsed,
            source,
            format,
            file_source,
            environment,
        }
    }

    /// Value at a dotted path; numeric segments index sequences.
    pub fn get(&self, key: &str) -> Option<&Value> {
        tree::get_dotted(self.parsed.value(), key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Top-level keys, in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parsed
            .value()
            .as_object()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    pub fn as_value(&self) -> &Value {
        self.parsed.value()
    }

    /// Every leaf as a dotted path, in document order.
    pub fn entries(&self) -> Vec<(String, &Value)> {
        tree::leaves(self.parsed.value())
    }

    /// Deserialize the whole configuration into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, LayerfigError> {
        T::deserialize(self.parsed.value()).map_err(|e| LayerfigError::InvalidValue {
            key: "<config>".into(),
            reason: e.to_string(),
        })
    }

    /// Deserialize the value at a dotted path into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, LayerfigError> {
        let value = self
            .get(key)
            .ok_or_else(|| LayerfigError::KeyNotFound(key.into()))?;
        T::deserialize(value).map_err(|e| LayerfigError::InvalidValue {
            key: key.into(),
            reason: e.to_string(),
        })
    }

    /// Where the value at a dotted path came from.
    pub fn source_of(&self, key: &str) -> &ConfigSource {
        self.parsed.source_of(key)
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn file_source(&self) -> Option<&Path> {
        self.file_source.as_deref()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }
}

impl Serialize for ResolvedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parsed.value().serialize(serializer)
    }
}

/// The process-wide configuration.
///
/// Loaded once at startup with [`load`](global::load), then read anywhere
/// with [`config`](global::config). Readers get an `Arc` snapshot, so a later
/// load never changes a config someone is already holding.
pub mod global {
    use std::sync::LazyLock;

    use arc_swap::ArcSwapOption;
    use tracing::{info, warn};

    use super::*;
    use crate::builder::LayerfigBuilder;

    static LOADED: LazyLock<ArcSwapOption<ResolvedConfig>> =
        LazyLock::new(|| ArcSwapOption::from(None));

    /// Load with `builder` and publish the result.
    pub async fn load(builder: LayerfigBuilder) -> Result<Arc<ResolvedConfig>, LayerfigError> {
        if LOADED.load().is_some() {
            warn!("configuration was already loaded; replacing it");
        }
        let config = Arc::new(builder.load().await?);
        LOADED.store(Some(Arc::clone(&config)));
        info!(
            environment = config.environment().unwrap_or("<none>"),
            "configuration loaded"
        );
        Ok(config)
    }

    /// The loaded configuration, or [`LayerfigError::NotLoaded`].
    pub fn config() -> Result<Arc<ResolvedConfig>, LayerfigError> {
        LOADED.load_full().ok_or(LayerfigError::NotLoaded)
    }

    pub fn is_loaded() -> bool {
        LOADED.load().is_some()
    }

    /// Forget the loaded configuration.
    #[cfg(any(test, feature = "test-support"))]
    pub fn reset() {
        LOADED.store(None);
    }
}
