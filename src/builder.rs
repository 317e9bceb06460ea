use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::combinators::compose_extensions;
use crate::directives::{self, DirectiveContext};
use crate::env::{self, EnvVars, EnvironmentAliases};
use crate::error::LayerfigError;
use crate::extension::SharedExtension;
use crate::format::FileFormat;
use crate::meta;
use crate::ops::{self, ConfigResult};
use crate::parse;
use crate::resolve::{
    self, DEFAULT_CONFIG_ENV_VAR, DEFAULT_FILE_NAME, DEFAULT_GLOBAL_OVERRIDE_VARS, LoadedConfig,
    ResolveInput,
};
use crate::resolved::ResolvedConfig;
use crate::schema::Schema;
use crate::types::{ConfigAction, ConfigSource, SourceKind};

/// Check run over the fully parsed configuration.
type ConfigValidator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Entry point for building a layerfig configuration.
pub struct Layerfig;

impl Layerfig {
    pub fn builder() -> LayerfigBuilder {
        LayerfigBuilder::new()
    }
}

/// Builder for locating and loading a configuration.
///
/// Every setting has a default, so `Layerfig::builder().load().await` works
/// out of the box: it reads `app-config.*` from the working directory, honours
/// `APP_CONFIG` and the `APP_CONFIG_ENV`/`ENV` environment selectors, and
/// applies the built-in directives. Settings made here take precedence over
/// the meta file.
pub struct LayerfigBuilder {
    dir: Option<PathBuf>,
    file_name: Option<String>,
    environment: Option<String>,
    env_vars: Option<EnvVars>,
    env_var_format: Option<FileFormat>,
    config_env_var: Option<String>,
    global_override_vars: Option<Vec<String>>,
    environment_aliases: Option<EnvironmentAliases>,
    environment_source_names: Option<Vec<String>>,
    extensions: Vec<SharedExtension>,
    default_extensions: bool,
    validator: Option<ConfigValidator>,
}

impl LayerfigBuilder {
    fn new() -> Self {
        Self {
            dir: None,
            file_name: None,
            environment: None,
            env_vars: None,
            env_var_format: None,
            config_env_var: None,
            global_override_vars: None,
            environment_aliases: None,
            environment_source_names: None,
            extensions: Vec::new(),
            default_extensions: true,
            validator: None,
        }
    }

    /// Directory searched for config files (default: the process working directory).
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Base name of config files (default: `"app-config"`).
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Use this environment instead of reading it from environment variables.
    pub fn environment(mut self, environment: &str) -> Self {
        self.environment = Some(environment.to_string());
        self
    }

    /// Read variables from this snapshot instead of the process environment.
    pub fn env_vars(mut self, vars: EnvVars) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Format of the config variable's contents (default: guessed).
    pub fn env_var_format(mut self, format: FileFormat) -> Self {
        self.env_var_format = Some(format);
        self
    }

    /// Variable holding a whole literal configuration (default: `APP_CONFIG`).
    pub fn config_env_var(mut self, name: &str) -> Self {
        self.config_env_var = Some(name.to_string());
        self
    }

    /// Variables holding an override applied over the files, first set wins
    /// (default: `APP_CONFIG_CI`, `APP_CONFIG_EXTEND`).
    pub fn global_override_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_override_vars = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn environment_aliases(mut self, aliases: EnvironmentAliases) -> Self {
        self.environment_aliases = Some(aliases);
        self
    }

    /// Variables that name the environment, first set wins.
    pub fn environment_source_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_source_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Register an extension. Registered extensions run before the built-in
    /// directives, in registration order.
    pub fn extension(mut self, extension: SharedExtension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Skip the built-in `$env`, `$extends` and `$substitute` directives.
    pub fn no_default_extensions(mut self) -> Self {
        self.default_extensions = false;
        self
    }

    /// Check the parsed configuration against `schema` before `load` returns
    /// it. The schema is primed once, here.
    pub fn schema<S>(mut self, mut schema: S) -> Self
    where
        S: Schema + Send + Sync + 'static,
    {
        schema.prime();
        let validator: ConfigValidator =
            Arc::new(move |value: &Value| schema.validate(value).map(|_| ()));
        self.validator = Some(validator);
        self
    }

    fn effective_dir(&self) -> Result<PathBuf, LayerfigError> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }
        std::env::current_dir().map_err(|e| LayerfigError::IoError {
            path: PathBuf::from("."),
            source: e,
        })
    }

    /// Combine builder settings, the meta file, and defaults.
    async fn build_input(&self) -> Result<ResolveInput, LayerfigError> {
        let dir = self.effective_dir()?;
        let meta = meta::load_meta(&dir).await?;

        let aliases = self
            .environment_aliases
            .clone()
            .unwrap_or(meta.environment_aliases);
        let environment_source_names = self
            .environment_source_names
            .clone()
            .unwrap_or(meta.environment_source_names);
        let env_vars = self.env_vars.clone().unwrap_or_else(EnvVars::from_process);
        let environment = match &self.environment {
            Some(environment) => Some(env::canonical_environment(environment, &aliases)),
            None => env::current_environment(&env_vars, &environment_source_names, &aliases),
        };
        debug!(dir = %dir.display(), environment = ?environment, "resolving config");

        Ok(ResolveInput {
            dir,
            file_name: self
                .file_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            env_vars,
            environment,
            environment_source_names,
            aliases,
            config_env_var: self
                .config_env_var
                .clone()
                .unwrap_or_else(|| DEFAULT_CONFIG_ENV_VAR.to_string()),
            env_var_format: self.env_var_format,
            global_override_vars: self.global_override_vars.clone().unwrap_or_else(|| {
                DEFAULT_GLOBAL_OVERRIDE_VARS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
        })
    }

    /// Find the raw configuration and split off secrets, without running
    /// any extensions.
    pub async fn load_raw(self) -> Result<LoadedConfig, LayerfigError> {
        let input = self.build_input().await?;
        resolve::resolve(&input).await
    }

    /// Find, merge and parse the configuration.
    pub async fn load(self) -> Result<ResolvedConfig, LayerfigError> {
        let input = self.build_input().await?;
        let loaded = resolve::resolve(&input).await?;

        let origin = match (&loaded.source, &loaded.file_source) {
            (SourceKind::File, Some(path)) => ConfigSource::File {
                path: path.clone(),
                format: loaded.format,
            },
            _ => ConfigSource::EnvVar {
                name: input.config_env_var.clone(),
                format: loaded.format,
            },
        };

        let mut extensions = self.extensions;
        if self.default_extensions {
            extensions.extend(directives::directives(&DirectiveContext {
                dir: input.dir.clone(),
                environment: input.environment.clone(),
                aliases: input.aliases.clone(),
                env_vars: input.env_vars.clone(),
            }));
        }
        let parsed = parse::parse_value(
            loaded.config,
            Arc::new(origin),
            &[compose_extensions(extensions)],
        )
        .await?;

        if let Some(validator) = &self.validator {
            validator(parsed.value())
                .map_err(|message| LayerfigError::InvalidConfig { message })?;
        }

        info!(source = ?loaded.source, format = %loaded.format, "config loaded");
        Ok(ResolvedConfig::new(
            parsed,
            loaded.source,
            loaded.format,
            loaded.file_source,
            input.environment,
        ))
    }

    /// Handle a `ConfigAction` and print the result to stdout.
    pub async fn handle_and_print(self, action: &ConfigAction) -> Result<(), LayerfigError> {
        let result = self.handle(action).await?;
        println!("{result}");
        Ok(())
    }

    /// Handle a `ConfigAction` (list / get).
    pub async fn handle(self, action: &ConfigAction) -> Result<ConfigResult, LayerfigError> {
        let config = self.load().await?;
        match action {
            ConfigAction::List => Ok(ops::list_values(&config)),
            ConfigAction::Get { key } => ops::get_value(&config, key),
        }
    }
}
