//! Extension combinators: restrict by key, compose, validate options.
//!
//! Each takes and returns [`SharedExtension`]s, so they nest arbitrarily:
//!
//! ```ignore
//! let schema = schema::typed::<Map<String, Value>>;
//! let options = validate_options(schema, select, ValidateOptions::lazy());
//! let env = for_key(["$env"], options);
//! let all = compose_extensions(vec![env, extends]);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use crate::error::LayerfigError;
use crate::extension::{
    Applicability, ExtensionKey, KeyKind, SharedExtension, context_path, extension,
};
use crate::parse::ParseOptions;
use crate::schema::Schema;

/// Apply `inner` only at mapping keys named in `keys`.
///
/// Root and sequence nodes are always declined, and `inner` is never asked
/// about a key outside the set.
pub fn for_key<I, S>(keys: I, inner: SharedExtension) -> SharedExtension
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keys: HashSet<String> = keys.into_iter().map(Into::into).collect();
    extension(move |value, key, context| match key {
        ExtensionKey::Object(name) if keys.contains(name) => inner.applies(value, key, context),
        _ => Applicability::NotApplicable,
    })
}

/// Bundle `extensions` into one that applies at the root and re-parses the
/// whole tree with exactly that set.
///
/// Parsing a tree with `[compose_extensions(list)]` gives the same value as
/// parsing it with `list` directly.
pub fn compose_extensions(extensions: Vec<SharedExtension>) -> SharedExtension {
    extension(move |value, key, _| {
        if key.kind() != KeyKind::Root {
            return Applicability::NotApplicable;
        }
        let value = value.clone();
        let extensions = extensions.clone();
        Applicability::apply(move |parse| async move {
            let options = ParseOptions {
                extensions: Some(extensions),
                should_flatten: true,
                ..ParseOptions::default()
            };
            parse.parse_with(value, options).await
        })
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Validate the raw value instead of parsing it first.
    pub lazy: bool,
}

impl ValidateOptions {
    pub fn lazy() -> Self {
        Self { lazy: true }
    }
}

/// Validate a node's options against a schema before handing the typed
/// result to `inner`.
///
/// `schema_builder` runs once, here, and the schema is primed once; every
/// node this extension sees reuses it. Unless `options.lazy` is set, the node
/// is parsed first so nested directives are resolved before validation.
///
/// Errors:
/// - [`LayerfigError::InvalidOptions`] naming the node's dotted path when the
///   value does not match;
/// - [`LayerfigError::NonApplicableValidated`] when `inner` declines a value
///   that passed validation.
pub fn validate_options<S, B, F>(
    schema_builder: B,
    inner: F,
    options: ValidateOptions,
) -> SharedExtension
where
    B: FnOnce() -> S,
    S: Schema + Send + Sync + 'static,
    F: Fn(S::Output, &ExtensionKey, &[ExtensionKey]) -> Applicability + Send + Sync + 'static,
{
    let mut schema = schema_builder();
    schema.prime();
    let schema = Arc::new(schema);
    let inner = Arc::new(inner);
    let lazy = options.lazy;

    extension(move |value, key, context| {
        let schema = Arc::clone(&schema);
        let inner = Arc::clone(&inner);
        let value = value.clone();
        let key = key.clone();
        let context = context.to_vec();
        Applicability::apply(move |parse| async move {
            let candidate = if lazy {
                value
            } else {
                parse.parse(value).await?.into_value()
            };
            let path = context_path(&context, &key);
            let validated = schema
                .validate(&candidate)
                .map_err(|message| LayerfigError::InvalidOptions {
                    path: path.clone(),
                    message,
                })?;
            trace!(%path, "options validated");
            match inner(validated, &key, &context) {
                Applicability::Apply(transform) => transform.run(parse).await,
                Applicability::NotApplicable => Err(LayerfigError::NonApplicableValidated),
            }
        })
    })
}
