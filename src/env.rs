//! Environment variable snapshot and deployment-environment detection.
//!
//! Everything downstream reads variables through [`EnvVars`] instead of
//! `std::env`, so tests pass synthetic data and never touch the process
//! environment.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;

use serde_json::Value;

use crate::error::LayerfigError;
use crate::format::{self, FileFormat};

/// Variables checked, in order, for the active deployment environment.
pub const DEFAULT_ENVIRONMENT_SOURCE_NAMES: [&str; 2] = ["APP_CONFIG_ENV", "ENV"];

/// Environment names probed when no config file matches the active one.
pub const WELL_KNOWN_ENVIRONMENTS: [&str; 4] = ["development", "production", "staging", "test"];

/// Canonical environment name → accepted synonyms.
pub type EnvironmentAliases = BTreeMap<String, Vec<String>>;

pub fn default_aliases() -> EnvironmentAliases {
    BTreeMap::from([
        ("development".to_string(), vec!["dev".to_string()]),
        ("production".to_string(), vec!["prod".to_string()]),
    ])
}

/// Immutable snapshot of environment variables.
///
/// Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are left out.
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    fn from_os_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        vars.into_iter()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl FromIterator<(String, String)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Map `name` to its canonical environment if it is a known alias.
pub fn canonical_environment(name: &str, aliases: &EnvironmentAliases) -> String {
    aliases
        .iter()
        .find(|(_, synonyms)| synonyms.iter().any(|s| s == name))
        .map(|(canonical, _)| canonical.clone())
        .unwrap_or_else(|| name.to_string())
}

/// The active deployment environment: the first set variable among
/// `source_names`, canonicalised through `aliases`.
pub fn current_environment(
    vars: &EnvVars,
    source_names: &[String],
    aliases: &EnvironmentAliases,
) -> Option<String> {
    source_names
        .iter()
        .find_map(|name| vars.get(name))
        .map(|value| canonical_environment(value, aliases))
}

/// The environment followed by its aliases: `production` → `[production, prod]`.
pub fn environment_with_aliases(environment: &str, aliases: &EnvironmentAliases) -> Vec<String> {
    let mut names = vec![environment.to_string()];
    if let Some(synonyms) = aliases.get(environment) {
        names.extend(synonyms.iter().cloned());
    }
    names
}

/// Parse a literal config stored in an environment variable.
///
/// Returns `Ok(None)` when the variable is unset. The format is guessed unless
/// one is given.
pub fn parse_env(
    vars: &EnvVars,
    name: &str,
    format: Option<FileFormat>,
) -> Result<Option<(FileFormat, Value)>, LayerfigError> {
    let Some(text) = vars.get(name) else {
        return Ok(None);
    };
    let parsed = match format {
        Some(format) => (format, format.parse_document(text, name)?),
        None => format::guess_format(text, name)?,
    };
    Ok(Some(parsed))
}
