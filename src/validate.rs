//! Strict-mode validation: detect unknown keys in a parsed document.
//!
//! Uses `serde_ignored` to deserialize into `C::Layer` (all-optional fields) and
//! capture any keys that the layer doesn't consume. Each unknown key is
//! reported with the path of the file it came from.

use std::path::Path;

use confique::Config;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LayerfigError;

/// Deserialize `value` into `C::Layer`, rejecting keys unknown to `C`.
///
/// Any key that `C::Layer` doesn't consume is unknown. On success the layer is
/// returned so the caller can hand it to confique as a preloaded layer.
pub fn validate_unknown_keys<C: Config>(
    value: &Value,
    path: &Path,
) -> Result<C::Layer, LayerfigError>
where
    C::Layer: DeserializeOwned,
{
    let mut unknown_keys: Vec<String> = Vec::new();

    let layer: C::Layer = serde_ignored::deserialize(value.clone(), |ignored_path| {
        unknown_keys.push(ignored_path.to_string());
    })
    .map_err(|e| LayerfigError::InvalidValue {
        key: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if unknown_keys.is_empty() {
        return Ok(layer);
    }

    let errors: Vec<LayerfigError> = unknown_keys
        .into_iter()
        .map(|key| LayerfigError::UnknownKey {
            key,
            path: path.to_path_buf(),
        })
        .collect();

    Err(LayerfigError::UnknownKeys(errors))
}
