#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::env::EnvVars;
    use crate::extension::{Applicability, SharedExtension, extension};
    use crate::parse::ParsedValue;
    use crate::types::{ConfigSource, SourceRef};

    pub fn literal() -> SourceRef {
        Arc::new(ConfigSource::Literal)
    }

    pub fn vars(pairs: &[(&str, &str)]) -> EnvVars {
        pairs.iter().copied().collect()
    }

    /// Replaces every string with its upper-case form.
    pub fn upper() -> SharedExtension {
        extension(|value, _, _| match value.as_str() {
            Some(s) => {
                let upper = s.to_uppercase();
                Applicability::apply(move |parse| async move {
                    Ok(ParsedValue::literal(Value::String(upper), Arc::clone(parse.source())))
                })
            }
            None => Applicability::NotApplicable,
        })
    }

    /// Replaces every node it is asked about with `output`.
    pub fn constant(output: Value) -> SharedExtension {
        extension(move |_, _, _| {
            let output = output.clone();
            Applicability::apply(move |parse| async move {
                Ok(ParsedValue::literal(output, Arc::clone(parse.source())))
            })
        })
    }

    #[tokio::test]
    async fn upper_leaves_other_values() {
        let parsed = crate::parse::parse_value(
            serde_json::json!({"a": "x", "b": 1}),
            literal(),
            &[upper()],
        )
        .await
        .unwrap();
        assert_eq!(parsed.value(), &serde_json::json!({"a": "X", "b": 1}));
    }
}
