//! Source resolution: find the raw configuration and split off secrets.
//!
//! Steps, in order:
//!
//! 1. If the config variable (`APP_CONFIG`) is set, its contents are the
//!    whole configuration. No file is read and there are no secrets.
//! 2. Otherwise the secrets file and the main file are looked up
//!    concurrently, environment-suffixed names first. A missing secrets file
//!    is an empty mapping; a missing main file is an error whose message
//!    points at the most likely mistake (see [`diagnose_missing`]).
//! 3. The first set global override variable (`APP_CONFIG_CI`, then
//!    `APP_CONFIG_EXTEND`) is routed into the non-secret or secret tree by
//!    [`assign_properties`](crate::secrets::assign_properties).
//! 4. `config` is the secrets deep-merged over the non-secrets.
//!
//! Everything the pipeline reads from the process comes in through
//! [`ResolveInput`], so tests run against synthetic variables and a temporary
//! directory.

use std::path::PathBuf;

use futures::future::try_join;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::env::{self, EnvVars, EnvironmentAliases, WELL_KNOWN_ENVIRONMENTS};
use crate::error::LayerfigError;
use crate::file;
use crate::format::FileFormat;
use crate::merge::deep_merge;
use crate::secrets;
use crate::types::SourceKind;

/// Default variable holding a whole literal configuration.
pub const DEFAULT_CONFIG_ENV_VAR: &str = "APP_CONFIG";

/// Default variables holding an override applied on top of the files.
pub const DEFAULT_GLOBAL_OVERRIDE_VARS: [&str; 2] = ["APP_CONFIG_CI", "APP_CONFIG_EXTEND"];

/// Default base name of config files.
pub const DEFAULT_FILE_NAME: &str = "app-config";

/// Everything source resolution needs.
#[derive(Debug, Clone)]
pub struct ResolveInput {
    pub dir: PathBuf,
    pub file_name: String,
    pub env_vars: EnvVars,
    /// The active environment, already canonical. `None` means unset.
    pub environment: Option<String>,
    /// Variables consulted for the environment; only named in error messages.
    pub environment_source_names: Vec<String>,
    pub aliases: EnvironmentAliases,
    pub config_env_var: String,
    /// Format of the config variable's contents; guessed when `None`.
    pub env_var_format: Option<FileFormat>,
    pub global_override_vars: Vec<String>,
}

/// The raw configuration after source resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub source: SourceKind,
    pub format: FileFormat,
    /// Path of the main file, when loaded from a file.
    pub file_source: Option<PathBuf>,
    pub non_secrets: Value,
    /// `None` only when loaded from the config variable.
    pub secrets: Option<Value>,
    /// Secrets merged over non-secrets.
    pub config: Value,
}

pub async fn resolve(input: &ResolveInput) -> Result<LoadedConfig, LayerfigError> {
    if let Some((format, value)) =
        env::parse_env(&input.env_vars, &input.config_env_var, input.env_var_format)?
    {
        debug!(var = %input.config_env_var, %format, "loaded config from environment variable");
        return Ok(LoadedConfig {
            source: SourceKind::EnvVar,
            format,
            file_source: None,
            non_secrets: value.clone(),
            secrets: None,
            config: value,
        });
    }

    let environment = input.environment.as_deref();
    let secrets_candidates = file::candidate_paths(
        &input.dir,
        &file::secrets_file_names(&input.file_name),
        environment,
        &input.aliases,
    );
    let main_candidates = file::candidate_paths(
        &input.dir,
        &file::config_file_names(&input.file_name),
        environment,
        &input.aliases,
    );
    trace!(?main_candidates, ?secrets_candidates, "config file candidates");

    let (secrets_file, main_file) = try_join(
        file::find_parseable_file(&secrets_candidates),
        file::find_parseable_file(&main_candidates),
    )
    .await?;

    let Some(main_file) = main_file else {
        return Err(diagnose_missing(input).await?);
    };
    debug!(path = %main_file.path.display(), format = %main_file.format, "loaded config file");

    let mut non_secrets = main_file.value;
    let mut secrets = match secrets_file {
        Some(found) => {
            debug!(path = %found.path.display(), "loaded secrets file");
            found.value
        }
        None => Value::Object(Map::new()),
    };

    if let Some((name, overrides)) = global_override(input)? {
        debug!(var = %name, "applying global override");
        secrets::assign_properties(overrides, &mut non_secrets, &mut secrets);
    }

    let config = deep_merge(non_secrets.clone(), secrets.clone());

    Ok(LoadedConfig {
        source: SourceKind::File,
        format: main_file.format,
        file_source: Some(main_file.path),
        non_secrets,
        secrets: Some(secrets),
        config,
    })
}

/// The first set global override variable, parsed.
///
/// Every set variable is parsed, so a malformed one fails the load even when
/// an earlier one wins.
fn global_override(
    input: &ResolveInput,
) -> Result<Option<(String, Map<String, Value>)>, LayerfigError> {
    let mut set = Vec::new();
    for name in &input.global_override_vars {
        if let Some((_, value)) = env::parse_env(&input.env_vars, name, None)? {
            set.push((name, value));
        }
    }
    let Some((name, value)) = set.into_iter().next() else {
        return Ok(None);
    };
    let overrides = serde_json::from_value(value).map_err(|e| LayerfigError::InvalidValue {
        key: name.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some((name.clone(), overrides)))
}

/// Explain why no main file was found.
///
/// A file for a well-known environment other than the active one usually
/// means the environment variable is missing or wrong, so that is reported
/// instead of a bare "nothing found".
async fn diagnose_missing(input: &ResolveInput) -> Result<LayerfigError, LayerfigError> {
    let bases = file::config_file_names(&input.file_name);
    let candidates: Vec<PathBuf> = WELL_KNOWN_ENVIRONMENTS
        .iter()
        .flat_map(|environment| {
            file::environment_file_names(&bases, Some(environment), &input.aliases)
        })
        .map(|name| input.dir.join(name))
        .collect();

    let Some(found) = file::find_parseable_file(&candidates).await? else {
        return Ok(LayerfigError::NothingFound);
    };

    Ok(match &input.environment {
        Some(environment) => LayerfigError::WrongEnvironment {
            found: found.path,
            environment: environment.clone(),
        },
        None => LayerfigError::NoEnvironment {
            found: found.path,
            vars: input.environment_source_names.join(" || "),
        },
    })
}
