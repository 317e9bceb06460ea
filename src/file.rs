//! Candidate file names and concurrent discovery of the first parseable file.
//!
//! # Candidate names
//!
//! A base name such as `app-config` expands into the list tried in order:
//!
//! ```text
//! .app-config.production   app-config.production   (active environment)
//! .app-config.prod         app-config.prod         (its aliases)
//! .app-config              app-config              (unsuffixed)
//! ```
//!
//! Each candidate is then tried with every extension in
//! [`EXTENSIONS`](crate::format::EXTENSIONS) (`.yml`, `.yaml`, `.toml`, `.json`).
//!
//! # Discovery
//!
//! All reads are issued at once and awaited together. The first file in
//! priority order wins; missing files are silently skipped. I/O errors other
//! than not-found, and parse errors of a file that does exist, are propagated.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde_json::Value;
use tracing::trace;

use crate::env::{self, EnvironmentAliases};
use crate::error::LayerfigError;
use crate::format::{EXTENSIONS, FileFormat};

/// Main config base names for `file_name`: hidden variant first.
pub fn config_file_names(file_name: &str) -> Vec<String> {
    vec![format!(".{file_name}"), file_name.to_string()]
}

/// Secrets base names for `file_name`: hidden variant first.
pub fn secrets_file_names(file_name: &str) -> Vec<String> {
    vec![
        format!(".{file_name}.secrets"),
        format!("{file_name}.secrets"),
    ]
}

/// Suffix every base name with the environment and then each of its aliases.
///
/// Returns an empty list when there is no environment.
pub fn environment_file_names(
    bases: &[String],
    environment: Option<&str>,
    aliases: &EnvironmentAliases,
) -> Vec<String> {
    let Some(environment) = environment else {
        return vec![];
    };
    env::environment_with_aliases(environment, aliases)
        .iter()
        .flat_map(|suffix| bases.iter().map(move |base| format!("{base}.{suffix}")))
        .collect()
}

/// Environment-suffixed names followed by the plain names, joined onto `dir`.
pub fn candidate_paths(
    dir: &Path,
    bases: &[String],
    environment: Option<&str>,
    aliases: &EnvironmentAliases,
) -> Vec<PathBuf> {
    environment_file_names(bases, environment, aliases)
        .into_iter()
        .chain(bases.iter().cloned())
        .map(|name| dir.join(name))
        .collect()
}

/// A file that was found and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundFile {
    pub format: FileFormat,
    pub path: PathBuf,
    pub value: Value,
}

/// Find and parse the first existing file among `candidates`.
///
/// Each candidate is a path without extension.
pub async fn find_parseable_file(
    candidates: &[PathBuf],
) -> Result<Option<FoundFile>, LayerfigError> {
    let attempts: Vec<(PathBuf, FileFormat)> = candidates
        .iter()
        .flat_map(|base| {
            EXTENSIONS.iter().map(move |(ext, format)| {
                let mut name = base.as_os_str().to_owned();
                name.push(".");
                name.push(ext);
                (PathBuf::from(name), *format)
            })
        })
        .collect();

    trace!(candidates = attempts.len(), "searching for config file");

    let reads = join_all(attempts.iter().map(|(path, _)| read_if_exists(path))).await;

    for ((path, format), read) in attempts.into_iter().zip(reads) {
        if let Some(content) = read? {
            let value = format.parse_document(&content, &path.display().to_string())?;
            return Ok(Some(FoundFile {
                format,
                path,
                value,
            }));
        }
    }
    Ok(None)
}

/// Read a file, returning `None` when it does not exist.
pub async fn read_if_exists(path: &Path) -> Result<Option<String>, LayerfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LayerfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
