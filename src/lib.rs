//! Environment-aware configuration loading with secret partitioning and an
//! async extension pipeline.
//!
//! Layerfig finds your application's configuration (in an environment
//! variable or in `app-config.*` files next to your code), merges the
//! secrets file over it, resolves `$`-directives such as `$env` and
//! `$extends`, and hands you an immutable view of the result.
//!
//! ```ignore
//! let config = Layerfig::builder().load().await?;
//! let port: u16 = config.get_as("server.port")?;
//! ```
//!
//! # Where configuration comes from
//!
//! Sources are tried in order and the first one that exists wins:
//!
//! 1. **`APP_CONFIG`**: the whole configuration as a literal (JSON, TOML or
//!    YAML; the format is detected unless set with
//!    [`env_var_format()`](LayerfigBuilder::env_var_format)). No files are
//!    read at all.
//! 2. **Environment-specific files**: `app-config.production.yml`,
//!    `app-config.prod.yml`, ... for the active environment and its aliases.
//! 3. **Plain files**: `app-config.yml`, `app-config.toml`, ...
//!
//! Every base name is tried hidden first (`.app-config.yml`), and with each
//! extension in the order `.yml`, `.yaml`, `.toml`, `.json`.
//!
//! The active environment is read from `APP_CONFIG_ENV`, then `ENV`, and
//! canonicalised through the alias table (`prod` → `production`,
//! `dev` → `development`). Both lists can be changed in a meta file
//! (`.app-config.meta.yml`) or on the builder.
//!
//! When nothing matches, the error says why: a file for some other
//! environment was found but no environment is set
//! ([`NoEnvironment`](LayerfigError::NoEnvironment)), or it is set to
//! something else ([`WrongEnvironment`](LayerfigError::WrongEnvironment)).
//!
//! # Secrets
//!
//! `app-config.secrets.*` (found the same way) is loaded alongside the main
//! file and deep-merged over it. Overrides from `APP_CONFIG_CI` or
//! `APP_CONFIG_EXTEND` are routed leaf by leaf: a leaf lands in the
//! non-secret tree when that tree already holds a truthy value at the same
//! path, and in the secrets tree otherwise. The two trees stay separate in
//! [`LoadedConfig`] (see [`load_raw()`](LayerfigBuilder::load_raw)).
//!
//! # Extensions
//!
//! After the raw tree is assembled it is parsed through a list of
//! [`Extension`]s. At every node the first extension that applies replaces
//! the node with the result of its async [`Transform`]. The built-in
//! directives are ordinary extensions:
//!
//! ```yaml
//! $extends: base.yml          # merge another file in, siblings win
//! database:
//!   host:
//!     $env:                   # pick by environment
//!       production: db.internal
//!       default: localhost
//!   password:
//!     $substitute: ${DB_PASSWORD:-dev}
//! ```
//!
//! Your own extensions are registered with
//! [`extension()`](LayerfigBuilder::extension) and built with the
//! combinators in [`combinators`]: [`for_key`](combinators::for_key) limits
//! an extension to named keys,
//! [`compose_extensions`](combinators::compose_extensions) bundles several
//! into one, and [`validate_options`](combinators::validate_options) checks a
//! directive's options against a [`Schema`](schema::Schema) first.
//!
//! # Global access
//!
//! [`global::load`] publishes a loaded config process-wide; [`global::config`]
//! returns it from anywhere, or [`LayerfigError::NotLoaded`] before that.
//!
//! # Clap adapter
//!
//! With the `clap` feature (on by default), [`ConfigArgs`] gives your CLI
//! `config list|get` subcommands with `--environment` and `--dir` flags.
//!
//! # Error handling
//!
//! All fallible operations return [`LayerfigError`]. See the [`error`]
//! module for the full set.

pub mod combinators;
pub mod directives;
pub mod error;
pub mod extension;
pub mod parse;
pub mod schema;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod env;
mod file;
mod format;
mod merge;
mod meta;
mod ops;
mod resolve;
mod resolved;
mod secrets;
mod tree;
mod validate;

#[cfg(test)]
mod fixtures;

pub use builder::{Layerfig, LayerfigBuilder};
#[cfg(feature = "clap")]
pub use cli::{ConfigArgs, ConfigSubcommand};
pub use env::{EnvVars, EnvironmentAliases};
pub use error::LayerfigError;
pub use extension::{Applicability, Extension, ExtensionKey, KeyKind, SharedExtension, Transform};
pub use format::FileFormat;
pub use merge::deep_merge;
pub use meta::MetaConfig;
pub use ops::ConfigResult;
pub use parse::{Parse, ParseOptions, ParsedValue};
pub use resolve::LoadedConfig;
pub use resolved::{ResolvedConfig, global};
pub use secrets::assign_properties;
pub use types::{ConfigAction, ConfigSource, SourceKind, SourceRef};
