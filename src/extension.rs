//! The extension contract.
//!
//! An [`Extension`] looks at one node of the config tree (its value, its key,
//! and the keys of its ancestors) and either declines or hands back a
//! [`Transform`]. The applicability check is synchronous and side-effect
//! free; all work, including any recursive parsing, happens inside the
//! transform.
//!
//! Every combinator in [`combinators`](crate::combinators) consumes and
//! produces [`SharedExtension`]s, so they nest freely.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::LayerfigError;
use crate::parse::{Parse, ParsedValue};

/// The kind of position a node occupies in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Root,
    Object,
    Array,
}

/// A node's position: the root, a named key in a mapping, or an index in a
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionKey {
    Root,
    Object(String),
    Array(usize),
}

impl ExtensionKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            ExtensionKey::Root => KeyKind::Root,
            ExtensionKey::Object(_) => KeyKind::Object,
            ExtensionKey::Array(_) => KeyKind::Array,
        }
    }

    /// The key name, for mapping keys only.
    pub fn name(&self) -> Option<&str> {
        match self {
            ExtensionKey::Object(name) => Some(name),
            _ => None,
        }
    }

    fn segment(&self) -> Option<String> {
        match self {
            ExtensionKey::Root => None,
            ExtensionKey::Object(name) => Some(name.clone()),
            ExtensionKey::Array(index) => Some(index.to_string()),
        }
    }
}

/// Dotted path of a node from its ancestors and own key, or `"root"`.
///
/// Every segment is kept, including index `0` and empty keys, so the path
/// always names exactly one node.
pub fn context_path(context: &[ExtensionKey], key: &ExtensionKey) -> String {
    let segments: Vec<String> = context
        .iter()
        .chain(std::iter::once(key))
        .filter_map(ExtensionKey::segment)
        .collect();
    if segments.is_empty() {
        "root".to_string()
    } else {
        segments.join(".")
    }
}

pub type TransformFuture = BoxFuture<'static, Result<ParsedValue, LayerfigError>>;

/// Deferred work for a node an extension accepted.
///
/// Receives a [`Parse`] handle for recursive parsing and resolves to the
/// node's final value.
pub struct Transform(Box<dyn FnOnce(Parse) -> TransformFuture + Send>);

impl Transform {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Parse) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ParsedValue, LayerfigError>> + Send + 'static,
    {
        Self(Box::new(move |parse| Box::pin(f(parse))))
    }

    pub fn run(self, parse: Parse) -> TransformFuture {
        (self.0)(parse)
    }
}

/// Outcome of an extension's applicability check.
pub enum Applicability {
    /// Continue normal resolution of the node.
    NotApplicable,
    /// Resolve the node through this transform.
    Apply(Transform),
}

impl Applicability {
    /// Shorthand for `Applicability::Apply(Transform::new(f))`.
    pub fn apply<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Parse) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ParsedValue, LayerfigError>> + Send + 'static,
    {
        Applicability::Apply(Transform::new(f))
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Applicability::Apply(_))
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::NotApplicable => write!(f, "NotApplicable"),
            Applicability::Apply(_) => write!(f, "Apply(..)"),
        }
    }
}

pub trait Extension: Send + Sync {
    fn applies(&self, value: &Value, key: &ExtensionKey, context: &[ExtensionKey]) -> Applicability;
}

impl<F> Extension for F
where
    F: Fn(&Value, &ExtensionKey, &[ExtensionKey]) -> Applicability + Send + Sync,
{
    fn applies(
        &self,
        value: &Value,
        key: &ExtensionKey,
        context: &[ExtensionKey],
    ) -> Applicability {
        self(value, key, context)
    }
}

pub type SharedExtension = Arc<dyn Extension>;

/// Wrap a closure as a [`SharedExtension`].
pub fn extension<F>(f: F) -> SharedExtension
where
    F: Fn(&Value, &ExtensionKey, &[ExtensionKey]) -> Applicability + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identity of an extension instance, stable for the lifetime of its `Arc`.
pub(crate) fn extension_id(extension: &SharedExtension) -> usize {
    Arc::as_ptr(extension) as *const () as usize
}
