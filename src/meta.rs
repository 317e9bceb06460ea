//! Loader settings read from an optional meta file next to the config.
//!
//! The meta file (`.app-config.meta.yml`, `app-config.meta.toml`, ...) tunes
//! how the loader itself behaves: which variables name the deployment
//! environment and which environment names are synonyms. Unknown keys are
//! rejected.
//!
//! Settings can also live in the package manifest, under
//! `[package.metadata.app-config]` of the nearest `Cargo.toml` at or above the
//! working directory. The meta file wins field by field; with neither present
//! every field has its default.

use std::path::{Path, PathBuf};

use confique::Config;
use futures::future;
use serde_json::Value;
use tracing::debug;

use crate::env::EnvironmentAliases;
use crate::error::LayerfigError;
use crate::file;
use crate::format::FileFormat;
use crate::validate;

/// Meta file base names, hidden variant first.
pub const META_FILE_NAMES: [&str; 2] = [".app-config.meta", "app-config.meta"];

/// Manifest searched upward for package-level meta settings.
pub const PACKAGE_MANIFEST: &str = "Cargo.toml";

#[derive(Config, Debug, Clone, PartialEq)]
#[config(layer_attr(derive(Debug)))]
pub struct MetaConfig {
    /// Canonical environment name → accepted synonyms.
    #[config(default = { "development": ["dev"], "production": ["prod"] })]
    pub environment_aliases: EnvironmentAliases,

    /// Variables checked, in order, for the active deployment environment.
    #[config(default = ["APP_CONFIG_ENV", "ENV"])]
    pub environment_source_names: Vec<String>,
}

impl MetaConfig {
    /// Meta settings with every field at its default.
    pub fn defaults() -> Result<Self, LayerfigError> {
        MetaConfig::builder().load().map_err(LayerfigError::from)
    }
}

/// Load meta settings for `dir`: meta file over package manifest over
/// defaults.
pub async fn load_meta(dir: &Path) -> Result<MetaConfig, LayerfigError> {
    let candidates: Vec<PathBuf> = META_FILE_NAMES.iter().map(|name| dir.join(name)).collect();

    let (found, package) =
        future::join(file::find_parseable_file(&candidates), package_settings(dir)).await;

    let mut builder = MetaConfig::builder();
    if let Some(found) = found? {
        debug!(path = %found.path.display(), "loaded meta file");
        builder = builder.preloaded(validate::validate_unknown_keys::<MetaConfig>(
            &found.value,
            &found.path,
        )?);
    }
    if let Some((manifest, section)) = package {
        debug!(path = %manifest.display(), "loaded package meta settings");
        builder = builder.preloaded(validate::validate_unknown_keys::<MetaConfig>(
            &section, &manifest,
        )?);
    }
    builder.load().map_err(LayerfigError::from)
}

/// The `[package.metadata.app-config]` table of the nearest manifest at or
/// above `dir`. An unreadable or malformed manifest counts as absent.
async fn package_settings(dir: &Path) -> Option<(PathBuf, Value)> {
    let start = tokio::fs::canonicalize(dir)
        .await
        .unwrap_or_else(|_| dir.to_path_buf());

    for ancestor in start.ancestors() {
        let manifest = ancestor.join(PACKAGE_MANIFEST);
        let content = match file::read_if_exists(&manifest).await {
            Ok(Some(content)) => content,
            Ok(None) => continue,
            Err(e) => {
                debug!(path = %manifest.display(), error = %e, "skipping package manifest");
                return None;
            }
        };
        let manifest_value = match FileFormat::Toml.parse(&content, &manifest.display().to_string())
        {
            Ok(value) => value,
            Err(e) => {
                debug!(path = %manifest.display(), error = %e, "skipping package manifest");
                return None;
            }
        };
        let section = manifest_value
            .get("package")
            .and_then(|package| package.get("metadata"))
            .and_then(|metadata| metadata.get("app-config"))
            .cloned()?;
        return Some((manifest, section));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::default_aliases;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_builtin_tables() {
        let meta = MetaConfig::defaults().unwrap();
        assert_eq!(meta.environment_aliases, default_aliases());
        assert_eq!(meta.environment_source_names, ["APP_CONFIG_ENV", "ENV"]);
    }

    #[tokio::test]
    async fn missing_meta_file_is_defaults() {
        let dir = TempDir::new().unwrap();
        let meta = load_meta(dir.path()).await.unwrap();
        assert_eq!(meta, MetaConfig::defaults().unwrap());
    }

    #[tokio::test]
    async fn meta_file_overrides_one_field() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".app-config.meta.yml"),
            "environment_source_names: [DEPLOY_ENV]\n",
        )
        .unwrap();
        let meta = load_meta(dir.path()).await.unwrap();
        assert_eq!(meta.environment_source_names, ["DEPLOY_ENV"]);
        assert_eq!(meta.environment_aliases, default_aliases());
    }

    #[tokio::test]
    async fn meta_file_replaces_aliases() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app-config.meta.toml"),
            "[environment_aliases]\nstaging = [\"stage\", \"stg\"]\n",
        )
        .unwrap();
        let meta = load_meta(dir.path()).await.unwrap();
        assert_eq!(meta.environment_aliases["staging"], ["stage", "stg"]);
        assert!(!meta.environment_aliases.contains_key("production"));
    }

    #[tokio::test]
    async fn package_manifest_settings_apply_from_subdirectory() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("Cargo.toml"),
            "[package]\nname = \"svc\"\n\n[package.metadata.app-config]\n\
             environment_source_names = [\"PKG_ENV\"]\n",
        )
        .unwrap();
        let dir = root.path().join("config");
        fs::create_dir(&dir).unwrap();

        let meta = load_meta(&dir).await.unwrap();
        assert_eq!(meta.environment_source_names, ["PKG_ENV"]);
        assert_eq!(meta.environment_aliases, default_aliases());
    }

    #[tokio::test]
    async fn meta_file_wins_over_package_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"svc\"\n\n[package.metadata.app-config]\n\
             environment_source_names = [\"PKG_ENV\"]\n\n\
             [package.metadata.app-config.environment_aliases]\nqa = [\"test\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("app-config.meta.yml"),
            "environment_source_names: [FILE_ENV]\n",
        )
        .unwrap();

        let meta = load_meta(dir.path()).await.unwrap();
        assert_eq!(meta.environment_source_names, ["FILE_ENV"]);
        assert_eq!(meta.environment_aliases["qa"], ["test"]);
    }

    #[tokio::test]
    async fn manifest_without_section_is_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"svc\"\n").unwrap();
        let meta = load_meta(dir.path()).await.unwrap();
        assert_eq!(meta, MetaConfig::defaults().unwrap());
    }

    #[tokio::test]
    async fn unknown_package_meta_key_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"svc\"\n\n[package.metadata.app-config]\ngenerate = []\n",
        )
        .unwrap();
        let err = load_meta(dir.path()).await.unwrap_err();
        assert!(matches!(err, LayerfigError::UnknownKeys(_)));
    }

    #[tokio::test]
    async fn unknown_meta_key_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app-config.meta.json"), r#"{"generate": []}"#).unwrap();
        let err = load_meta(dir.path()).await.unwrap_err();
        assert!(matches!(err, LayerfigError::UnknownKeys(_)));
    }
}
