//! Text formats a config tree can be written in.
//!
//! Every format parses into the same `serde_json::Value` tree, so the rest of
//! the pipeline never cares where a value came from.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::error::LayerfigError;

/// A supported config file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
}

/// File extensions tried for each candidate base name, in priority order.
pub const EXTENSIONS: [(&str, FileFormat); 4] = [
    ("yml", FileFormat::Yaml),
    ("yaml", FileFormat::Yaml),
    ("toml", FileFormat::Toml),
    ("json", FileFormat::Json),
];

impl FileFormat {
    /// Infer a format from a file extension (`config.yml` → `Yaml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        EXTENSIONS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
            .map(|(_, format)| *format)
    }

    /// Parse `text` into a value tree. `origin` only feeds error messages.
    pub fn parse(self, text: &str, origin: &str) -> Result<Value, LayerfigError> {
        let parse_error = |reason: String| LayerfigError::ParseError {
            origin: origin.to_string(),
            format: self,
            reason,
        };

        match self {
            FileFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
            FileFormat::Yaml => {
                // An empty YAML document is null; treat it as an empty mapping.
                if text.trim().is_empty() {
                    return Ok(Value::Object(Default::default()));
                }
                serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))
            }
            FileFormat::Toml => {
                let table: toml::Table =
                    toml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| parse_error(e.to_string()))
            }
        }
    }

    /// Like [`parse`](Self::parse), but the top level must be a mapping.
    pub fn parse_document(self, text: &str, origin: &str) -> Result<Value, LayerfigError> {
        let value = self.parse(text, origin)?;
        if value.is_object() {
            Ok(value)
        } else {
            Err(LayerfigError::ParseError {
                origin: origin.to_string(),
                format: self,
                reason: "expected a mapping at the top level".into(),
            })
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Json => write!(f, "JSON"),
            FileFormat::Yaml => write!(f, "YAML"),
            FileFormat::Toml => write!(f, "TOML"),
        }
    }
}

/// Detect the format of a literal config string.
///
/// Tries JSON, then TOML, then YAML. YAML goes last because nearly any text is
/// valid YAML. A result only counts when it is a mapping.
pub fn guess_format(text: &str, origin: &str) -> Result<(FileFormat, Value), LayerfigError> {
    for format in [FileFormat::Json, FileFormat::Toml, FileFormat::Yaml] {
        if let Ok(value) = format.parse_document(text, origin) {
            return Ok((format, value));
        }
    }
    Err(LayerfigError::UnknownFormat {
        origin: origin.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            FileFormat::from_path(Path::new("app-config.yml")),
            Some(FileFormat::Yaml)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("dir/app-config.production.TOML")),
            Some(FileFormat::Toml)
        );
        assert_eq!(FileFormat::from_path(Path::new("app-config")), None);
    }

    #[test]
    fn parse_each_format_to_same_tree() {
        let expected = json!({"server": {"port": 3000}});
        let yaml = FileFormat::Yaml.parse("server:\n  port: 3000\n", "t").unwrap();
        let toml = FileFormat::Toml.parse("[server]\nport = 3000\n", "t").unwrap();
        let json = FileFormat::Json
            .parse(r#"{"server": {"port": 3000}}"#, "t")
            .unwrap();
        assert_eq!(yaml, expected);
        assert_eq!(toml, expected);
        assert_eq!(json, expected);
    }

    #[test]
    fn empty_yaml_is_empty_mapping() {
        assert_eq!(FileFormat::Yaml.parse("  \n", "t").unwrap(), json!({}));
    }

    #[test]
    fn yaml_keeps_key_order() {
        let value = FileFormat::Yaml.parse("b: 1\na: 2\nc: 3\n", "t").unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn parse_document_rejects_scalar_top_level() {
        let err = FileFormat::Json.parse_document("42", "APP_CONFIG").unwrap_err();
        assert!(matches!(err, LayerfigError::ParseError { .. }));
    }

    #[test]
    fn malformed_json_reports_origin() {
        let err = FileFormat::Json.parse("{nope", "/tmp/app-config.json").unwrap_err();
        assert!(err.to_string().contains("/tmp/app-config.json"));
    }

    #[test]
    fn guess_prefers_json() {
        let (format, value) = guess_format(r#"{"a": 1}"#, "APP_CONFIG").unwrap();
        assert_eq!(format, FileFormat::Json);
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn guess_detects_toml() {
        let (format, value) = guess_format("a = 1\n[b]\nc = \"x\"\n", "APP_CONFIG").unwrap();
        assert_eq!(format, FileFormat::Toml);
        assert_eq!(value, json!({"a": 1, "b": {"c": "x"}}));
    }

    #[test]
    fn guess_falls_back_to_yaml() {
        let (format, value) = guess_format("a: 1\nb: [x, y]\n", "APP_CONFIG").unwrap();
        assert_eq!(format, FileFormat::Yaml);
        assert_eq!(value, json!({"a": 1, "b": ["x", "y"]}));
    }

    #[test]
    fn guess_rejects_plain_scalar() {
        let err = guess_format("just words", "APP_CONFIG").unwrap_err();
        assert!(matches!(err, LayerfigError::UnknownFormat { .. }));
    }
}
