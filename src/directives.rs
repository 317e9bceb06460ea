//! Built-in `$`-directives applied while loading.
//!
//! | Directive | Options | Result |
//! |---|---|---|
//! | `$env` | environment name (or alias, or `default`) → value | the matching value |
//! | `$extends` | path, or `{ path, optional }` | the file's parsed contents |
//! | `$substitute`, `$subs` | string with `${VAR}` / `${VAR:-fallback}` | the expanded string |
//!
//! Every result is flattened into the mapping holding the directive, so
//! `{ port: { $substitute: "${PORT}" } }` becomes `{ port: "8080" }` and the
//! keys of an extended file merge with their siblings (later siblings win).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::combinators::{ValidateOptions, compose_extensions, for_key, validate_options};
use crate::env::{EnvVars, EnvironmentAliases, canonical_environment};
use crate::error::LayerfigError;
use crate::extension::{Applicability, SharedExtension, context_path};
use crate::file::{self, FoundFile};
use crate::format::FileFormat;
use crate::parse::{ParseOptions, ParsedValue};
use crate::schema;
use crate::types::{ConfigSource, SourceRef};

/// What the directives need to know about the load in progress.
#[derive(Debug, Clone)]
pub struct DirectiveContext {
    /// Base for relative `$extends` paths in values not read from a file.
    pub dir: PathBuf,
    pub environment: Option<String>,
    pub aliases: EnvironmentAliases,
    pub env_vars: EnvVars,
}

/// All built-in directives, in evaluation order.
pub fn directives(context: &DirectiveContext) -> Vec<SharedExtension> {
    vec![
        env_directive(context.environment.clone(), context.aliases.clone()),
        extends_directive(context.dir.clone()),
        substitute_directive(context.env_vars.clone()),
    ]
}

/// The built-in directives as one composed extension.
pub fn default_extensions(context: &DirectiveContext) -> SharedExtension {
    compose_extensions(directives(context))
}

/// `$env`: pick the value for the active environment.
pub fn env_directive(environment: Option<String>, aliases: EnvironmentAliases) -> SharedExtension {
    for_key(
        ["$env"],
        validate_options(
            schema::typed::<Map<String, Value>>,
            move |options, key, context| {
                let selected = select_environment(options, environment.as_deref(), &aliases);
                let path = context_path(context, key);
                let environment = environment.clone();
                Applicability::apply(move |parse| async move {
                    let Some(value) = selected else {
                        let reason = match environment {
                            Some(environment) => format!(
                                "no option for environment \"{environment}\" and no default"
                            ),
                            None => "no environment is set and no default".to_string(),
                        };
                        return Err(LayerfigError::Extension { path, reason });
                    };
                    parse.parse_with(value, ParseOptions::flatten()).await
                })
            },
            ValidateOptions::lazy(),
        ),
    )
}

/// The option whose key names `environment` (directly or by alias), else
/// `default`.
fn select_environment(
    mut options: Map<String, Value>,
    environment: Option<&str>,
    aliases: &EnvironmentAliases,
) -> Option<Value> {
    if let Some(environment) = environment {
        let matching = options
            .keys()
            .find(|key| canonical_environment(key, aliases) == environment)
            .cloned();
        if let Some(key) = matching {
            return options.remove(&key);
        }
    }
    options.remove("default")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ExtendsOptions {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        optional: bool,
    },
}

impl ExtendsOptions {
    fn into_parts(self) -> (String, bool) {
        match self {
            ExtendsOptions::Path(path) => (path, false),
            ExtendsOptions::Detailed { path, optional } => (path, optional),
        }
    }
}

/// `$extends`: merge in another config file.
///
/// Relative paths resolve against the directory of the file holding the
/// directive, or `dir` for values that came from elsewhere. Without an
/// extension every supported one is tried, as for the main config file. A
/// file that extends itself, directly or through others, is an error.
pub fn extends_directive(dir: PathBuf) -> SharedExtension {
    for_key(
        ["$extends"],
        validate_options(
            schema::typed::<ExtendsOptions>,
            move |options, key, context| {
                let (relative, optional) = options.into_parts();
                let dir = dir.clone();
                let path = context_path(context, key);
                Applicability::apply(move |parse| async move {
                    let base = match parse.source().as_ref() {
                        ConfigSource::File { path: file, .. } => file
                            .parent()
                            .filter(|parent| !parent.as_os_str().is_empty())
                            .unwrap_or(&dir),
                        _ => dir.as_path(),
                    };
                    let target = base.join(relative);
                    let Some(found) = load_extended(&target).await? else {
                        if optional {
                            let empty = Value::Object(Map::new());
                            return Ok(ParsedValue::literal(empty, Arc::clone(parse.source()))
                                .flattened());
                        }
                        return Err(LayerfigError::Extension {
                            path,
                            reason: format!("could not find {}", target.display()),
                        });
                    };
                    if already_extending(&found.path, parse.lineage()).await {
                        return Err(LayerfigError::Extension {
                            path,
                            reason: format!("circular $extends of {}", found.path.display()),
                        });
                    }
                    debug!(path = %found.path.display(), "extending config");
                    let source = Arc::new(ConfigSource::File {
                        path: found.path,
                        format: found.format,
                    });
                    let options = ParseOptions {
                        source: Some(source),
                        should_flatten: true,
                        ..ParseOptions::default()
                    };
                    parse.parse_with(found.value, options).await
                })
            },
            ValidateOptions::default(),
        ),
    )
}

/// Whether `target` is one of the files already being parsed above this node.
async fn already_extending(target: &Path, lineage: &[SourceRef]) -> bool {
    let target = canonical(target).await;
    for source in lineage {
        if let ConfigSource::File { path, .. } = source.as_ref() {
            if canonical(path).await == target {
                return true;
            }
        }
    }
    false
}

async fn canonical(path: &Path) -> PathBuf {
    tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

async fn load_extended(target: &Path) -> Result<Option<FoundFile>, LayerfigError> {
    let Some(format) = FileFormat::from_path(target) else {
        return file::find_parseable_file(&[target.to_path_buf()]).await;
    };
    let Some(content) = file::read_if_exists(target).await? else {
        return Ok(None);
    };
    let value = format.parse_document(&content, &target.display().to_string())?;
    Ok(Some(FoundFile {
        format,
        path: target.to_path_buf(),
        value,
    }))
}

/// `$substitute` / `$subs`: expand environment variable placeholders.
pub fn substitute_directive(env_vars: EnvVars) -> SharedExtension {
    for_key(
        ["$substitute", "$subs"],
        validate_options(
            schema::typed::<String>,
            move |text, key, context| {
                let expanded =
                    substitute(&text, &env_vars).map_err(|reason| LayerfigError::Extension {
                        path: context_path(context, key),
                        reason,
                    });
                Applicability::apply(move |parse| async move {
                    let expanded = Value::String(expanded?);
                    Ok(ParsedValue::literal(expanded, Arc::clone(parse.source())).flattened())
                })
            },
            ValidateOptions::default(),
        ),
    )
}

/// Replace `${VAR}` and `${VAR:-fallback}` in `text`.
pub fn substitute(text: &str, env_vars: &EnvVars) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(format!("unterminated placeholder in \"{text}\""));
        };
        let expression = &after[..end];
        let (name, fallback) = match expression.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expression, None),
        };
        match env_vars.get(name).or(fallback) {
            Some(value) => out.push_str(value),
            None => return Err(format!("environment variable {name} is not set")),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::default_aliases;
    use crate::fixtures::test::{literal, vars};
    use crate::parse::parse_value;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &Path, environment: Option<&str>, pairs: &[(&str, &str)]) -> DirectiveContext {
        DirectiveContext {
            dir: dir.to_path_buf(),
            environment: environment.map(str::to_string),
            aliases: default_aliases(),
            env_vars: vars(pairs),
        }
    }

    async fn resolve(raw: Value, context: &DirectiveContext) -> Result<ParsedValue, LayerfigError> {
        parse_value(raw, literal(), &[default_extensions(context)]).await
    }

    #[tokio::test]
    async fn env_selects_active_environment() {
        let ctx = context(Path::new("."), Some("production"), &[]);
        let raw = json!({
            "url": {"$env": {"production": "https://prod", "default": "http://local"}}
        });
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"url": "https://prod"}));
    }

    #[tokio::test]
    async fn env_matches_alias_keys() {
        let ctx = context(Path::new("."), Some("development"), &[]);
        let raw = json!({"debug": {"$env": {"dev": true, "prod": false}}});
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"debug": true}));
    }

    #[tokio::test]
    async fn env_falls_back_to_default() {
        let ctx = context(Path::new("."), None, &[]);
        let raw = json!({
            "db": {
                "$env": {"production": {"host": "db"}, "default": {"host": "localhost"}},
                "port": 5432
            }
        });
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"db": {"host": "localhost", "port": 5432}}));
    }

    #[tokio::test]
    async fn env_without_match_or_default_fails() {
        let ctx = context(Path::new("."), Some("staging"), &[]);
        let raw = json!({"a": {"$env": {"production": 1}}});
        let err = resolve(raw, &ctx).await.unwrap_err();
        match err {
            LayerfigError::Extension { path, reason } => {
                assert_eq!(path, "a.$env");
                assert!(reason.contains("staging"));
            }
            other => panic!("Expected Extension error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn env_options_must_be_a_mapping() {
        let ctx = context(Path::new("."), None, &[]);
        let err = resolve(json!({"a": {"$env": [1]}}), &ctx).await.unwrap_err();
        assert!(matches!(err, LayerfigError::InvalidOptions { ref path, .. } if path == "a.$env"));
    }

    #[tokio::test]
    async fn extends_merges_file_and_siblings_win() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.yml"),
            "name: base\nserver:\n  host: 0.0.0.0\n  port: 80\n",
        )
        .unwrap();
        let ctx = context(dir.path(), None, &[]);
        let raw = json!({"$extends": "base.yml", "server": {"port": 8080}});
        let parsed = resolve(raw, &ctx).await.unwrap();

        assert_eq!(
            parsed.value(),
            &json!({"name": "base", "server": {"host": "0.0.0.0", "port": 8080}})
        );
        match parsed.source_of("name").as_ref() {
            ConfigSource::File { path, format } => {
                assert!(path.ends_with("base.yml"));
                assert_eq!(*format, FileFormat::Yaml);
            }
            other => panic!("Expected file source, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn extends_tries_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("shared.toml"), "level = \"info\"\n").unwrap();
        let ctx = context(dir.path(), None, &[]);
        let parsed = resolve(json!({"log": {"$extends": "shared"}}), &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"log": {"level": "info"}}));
    }

    #[tokio::test]
    async fn extended_file_can_use_directives() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.json"),
            r#"{"mode": {"$env": {"test": "testing", "default": "normal"}}}"#,
        )
        .unwrap();
        let ctx = context(dir.path(), Some("test"), &[]);
        let parsed = resolve(json!({"$extends": "base.json"}), &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"mode": "testing"}));
    }

    #[tokio::test]
    async fn optional_extends_of_missing_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), None, &[]);
        let raw = json!({"$extends": {"path": "missing.yml", "optional": true}, "a": 1});
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"a": 1}));
    }

    #[tokio::test]
    async fn required_extends_of_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), None, &[]);
        let err = resolve(json!({"$extends": "missing.yml"}), &ctx).await.unwrap_err();
        assert!(matches!(err, LayerfigError::Extension { ref path, .. } if path == "$extends"));
    }

    #[tokio::test]
    async fn extends_resolves_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.yml"), "$extends: b.yml\nfrom_a: true\n").unwrap();
        fs::write(dir.path().join("sub/b.yml"), "which: nested\n").unwrap();
        fs::write(dir.path().join("b.yml"), "which: top\n").unwrap();
        let ctx = context(dir.path(), None, &[]);
        let parsed = resolve(json!({"$extends": "sub/a.yml"}), &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"which": "nested", "from_a": true}));
    }

    #[tokio::test]
    async fn circular_extends_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yml"), "$extends: b.yml\nx: 1\n").unwrap();
        fs::write(dir.path().join("b.yml"), "$extends: a.yml\ny: 2\n").unwrap();
        let ctx = context(dir.path(), None, &[]);
        let err = resolve(json!({"$extends": "a.yml"}), &ctx).await.unwrap_err();
        match err {
            LayerfigError::Extension { path, reason } => {
                assert!(path.ends_with("$extends"), "{path}");
                assert!(reason.starts_with("circular $extends of"), "{reason}");
                assert!(reason.ends_with("a.yml"), "{reason}");
            }
            other => panic!("Expected Extension error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_extending_itself_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("self.yml"), "$extends: ./self.yml\n").unwrap();
        let ctx = context(dir.path(), None, &[]);
        let err = resolve(json!({"$extends": "self.yml"}), &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            LayerfigError::Extension { ref reason, .. } if reason.contains("circular")
        ));
    }

    #[tokio::test]
    async fn extending_the_same_file_twice_is_not_a_cycle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("common.yml"), "shared: 1\n").unwrap();
        let ctx = context(dir.path(), None, &[]);
        let raw = json!({"a": {"$extends": "common.yml"}, "b": {"$extends": "common.yml"}});
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"a": {"shared": 1}, "b": {"shared": 1}}));
    }

    #[tokio::test]
    async fn substitute_expands_variables() {
        let ctx = context(Path::new("."), None, &[("HOST", "db.internal")]);
        let raw = json!({
            "url": {"$substitute": "postgres://${HOST}:${PORT:-5432}/app"},
            "short": {"$subs": "${HOST}"}
        });
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(
            parsed.value(),
            &json!({"url": "postgres://db.internal:5432/app", "short": "db.internal"})
        );
    }

    #[tokio::test]
    async fn substitute_options_resolved_first() {
        let ctx = context(Path::new("."), Some("production"), &[("PROD_HOST", "p")]);
        let raw = json!({
            "host": {"$substitute": {"$env": {"production": "${PROD_HOST}", "default": "local"}}}
        });
        let parsed = resolve(raw, &ctx).await.unwrap();
        assert_eq!(parsed.value(), &json!({"host": "p"}));
    }

    #[tokio::test]
    async fn substitute_missing_variable_fails() {
        let ctx = context(Path::new("."), None, &[]);
        let err = resolve(json!({"a": {"$subs": "${NOPE}"}}), &ctx).await.unwrap_err();
        assert!(matches!(err, LayerfigError::Extension { ref path, .. } if path == "a.$subs"));
    }

    #[test]
    fn substitute_plain_text_untouched() {
        assert_eq!(substitute("no placeholders", &EnvVars::default()).unwrap(), "no placeholders");
    }

    #[test]
    fn substitute_unterminated_placeholder() {
        assert!(substitute("${OPEN", &EnvVars::default()).is_err());
    }

    #[test]
    fn substitute_empty_variable_uses_fallback() {
        assert_eq!(substitute("${EMPTY:-x}", &vars(&[("EMPTY", "")])).unwrap(), "x");
    }
}
