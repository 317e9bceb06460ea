//! Clap adapter for layerfig.
//!
//! Compiled only with the `clap` Cargo feature (on by default). Embed
//! [`ConfigArgs`] in your own clap derive to get `config list|get`
//! subcommands, then bridge to the clap-free core:
//!
//! ```ignore
//! let builder = args.config.configure(Layerfig::builder());
//! builder.handle_and_print(&args.config.into_action()).await?;
//! ```

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::builder::LayerfigBuilder;
use crate::types::ConfigAction;

/// Clap-derived args for the `config` subcommand group.
///
/// ```ignore
/// #[derive(Subcommand)]
/// enum Commands {
///     Config(ConfigArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Load as this environment instead of reading APP_CONFIG_ENV / ENV.
    #[arg(long, global = true)]
    pub environment: Option<String>,

    /// Directory containing the config files (default: current directory).
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Option<ConfigSubcommand>,
}

/// Available config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show all resolved configuration key-value pairs.
    List,
    /// Show the resolved value of a key and where it came from.
    Get {
        /// Dotted key path (e.g. "database.url").
        key: String,
    },
}

impl ConfigArgs {
    /// The framework-agnostic action. Bare `config` means `list`.
    pub fn into_action(self) -> ConfigAction {
        match self.action {
            None | Some(ConfigSubcommand::List) => ConfigAction::List,
            Some(ConfigSubcommand::Get { key }) => ConfigAction::Get { key },
        }
    }

    /// Apply `--environment` and `--dir` to a builder.
    pub fn configure(&self, mut builder: LayerfigBuilder) -> LayerfigBuilder {
        if let Some(environment) = &self.environment {
            builder = builder.environment(environment);
        }
        if let Some(dir) = &self.dir {
            builder = builder.cwd(dir.clone());
        }
        builder
    }
}
