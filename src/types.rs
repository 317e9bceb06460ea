use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::format::FileFormat;

/// Where the active raw configuration was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A config file in the working directory.
    File,
    /// The config override environment variable.
    EnvVar,
}

/// Origin of a value in the tree. Attached to parsed values as provenance.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    EnvVar { name: String, format: FileFormat },
    /// A value built in code, or the merge of several sources.
    Literal,
}

/// Shared handle to a [`ConfigSource`]; cloned into every parsed node.
pub type SourceRef = Arc<ConfigSource>;

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File { path, .. } => write!(f, "{}", path.display()),
            ConfigSource::EnvVar { name, .. } => write!(f, "${name}"),
            ConfigSource::Literal => write!(f, "<literal>"),
        }
    }
}

/// A config read operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Show every resolved leaf as a dotted key-value pair.
    List,
    /// Show one resolved value and where it came from.
    Get { key: String },
}
