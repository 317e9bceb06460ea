//! Config read operations and the `ConfigResult` returned for display.

use std::fmt;

use serde_json::Value;

use crate::error::LayerfigError;
use crate::resolved::ResolvedConfig;

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// A key's resolved value and the source it came from.
    KeyValue {
        key: String,
        value: String,
        source: String,
    },
    /// Every resolved leaf as a dotted key-value pair.
    Listing { entries: Vec<(String, String)> },
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::KeyValue { key, value, source } => {
                writeln!(f, "# from {source}")?;
                write!(f, "{key} = {value}")
            }
            ConfigResult::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
        }
    }
}

/// Get a value by dotted key, with its source.
pub fn get_value(config: &ResolvedConfig, key: &str) -> Result<ConfigResult, LayerfigError> {
    let value = config
        .get(key)
        .ok_or_else(|| LayerfigError::KeyNotFound(key.into()))?;
    Ok(ConfigResult::KeyValue {
        key: key.into(),
        value: format_value(value),
        source: config.source_of(key).to_string(),
    })
}

/// List every resolved leaf as a flattened dotted key-value pair.
pub fn list_values(config: &ResolvedConfig) -> ConfigResult {
    let entries = config
        .entries()
        .into_iter()
        .map(|(key, value)| (key, format_value(value)))
        .collect();
    ConfigResult::Listing { entries }
}

/// Format a value for display: strings bare, everything else as JSON.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "<not set>".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FileFormat;
    use crate::parse::ParsedValue;
    use crate::types::{ConfigSource, SourceKind};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn config(value: Value) -> ResolvedConfig {
        let source = ConfigSource::File {
            path: PathBuf::from("/srv/app-config.yml"),
            format: FileFormat::Yaml,
        };
        ResolvedConfig::new(
            ParsedValue::literal(value, Arc::new(source)),
            SourceKind::File,
            FileFormat::Yaml,
            Some(PathBuf::from("/srv/app-config.yml")),
            None,
        )
    }

    #[test]
    fn get_flat_key() {
        let result = get_value(&config(json!({"port": 8080})), "port").unwrap();
        assert_eq!(
            result,
            ConfigResult::KeyValue {
                key: "port".into(),
                value: "8080".into(),
                source: "/srv/app-config.yml".into(),
            }
        );
    }

    #[test]
    fn get_nested_key() {
        let result = get_value(&config(json!({"db": {"host": "h"}})), "db.host").unwrap();
        match result {
            ConfigResult::KeyValue { value, .. } => assert_eq!(value, "h"),
            other => panic!("Expected KeyValue, got {other:?}"),
        }
    }

    #[test]
    fn get_subtree_as_json() {
        let result = get_value(&config(json!({"db": {"port": 1}})), "db").unwrap();
        match result {
            ConfigResult::KeyValue { value, .. } => assert_eq!(value, r#"{"port":1}"#),
            other => panic!("Expected KeyValue, got {other:?}"),
        }
    }

    #[test]
    fn get_nonexistent_key() {
        let result = get_value(&config(json!({})), "nonexistent");
        assert!(matches!(result, Err(LayerfigError::KeyNotFound(_))));
    }

    #[test]
    fn list_values_formats_leaves() {
        let result = list_values(&config(json!({
            "host": "localhost",
            "port": 8080,
            "tags": ["a", "b"],
            "db": {"url": null, "tls": true}
        })));
        assert_eq!(
            result,
            ConfigResult::Listing {
                entries: vec![
                    ("host".into(), "localhost".into()),
                    ("port".into(), "8080".into()),
                    ("tags".into(), r#"["a","b"]"#.into()),
                    ("db.url".into(), "<not set>".into()),
                    ("db.tls".into(), "true".into()),
                ]
            }
        );
    }

    #[test]
    fn listing_display_format() {
        let result = ConfigResult::Listing {
            entries: vec![
                ("host".into(), "localhost".into()),
                ("port".into(), "8080".into()),
            ],
        };
        assert_eq!(format!("{result}"), "host = localhost\nport = 8080");
    }

    #[test]
    fn key_value_display_names_source() {
        let result = ConfigResult::KeyValue {
            key: "port".into(),
            value: "8080".into(),
            source: "app-config.yml".into(),
        };
        assert_eq!(format!("{result}"), "# from app-config.yml\nport = 8080");
    }
}
