//! The parse engine: walks a raw tree, giving extensions a chance at every
//! node, and produces a [`ParsedValue`].
//!
//! # Evaluation
//!
//! At each node the active extensions are asked in order; the first one that
//! applies and has not already fired on this node wins, and its transform's
//! result replaces the node. When none applies, mappings and sequences are
//! descended and scalars are kept as they are.
//!
//! Descent uses an explicit frame stack, so arbitrarily deep trees never grow
//! the call stack. Transforms are awaited in place; only extension nesting
//! (a transform parsing a value that triggers another transform) adds depth.
//!
//! # Re-parsing a node
//!
//! A transform receives a [`Parse`] handle positioned on its own node. Parsing
//! through it keeps the node's key, context, and the set of extensions that
//! already fired there, so an extension can resolve its own input without
//! triggering itself again. Children of the re-parsed value start with a fresh
//! set.
//!
//! # Flattening
//!
//! A result marked `should_flatten` is merged into its parent instead of being
//! stored under its key:
//!
//! - a mapping is deep-merged into the parent mapping at its position, so
//!   later siblings override it;
//! - a sequence is spliced into a parent sequence;
//! - any other value replaces the parent entirely.
//!
//! The flag never survives past the top-level result.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::LayerfigError;
use crate::extension::{
    self, Applicability, ExtensionKey, SharedExtension, Transform, context_path,
};
use crate::merge;
use crate::tree;
use crate::types::SourceRef;

/// A fully resolved value plus where its parts came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    value: Value,
    source: SourceRef,
    /// Dotted subtree path → source, only where it differs from `source`.
    provenance: HashMap<String, SourceRef>,
    should_flatten: bool,
}

impl ParsedValue {
    /// A value taken as-is from `source`.
    pub fn literal(value: Value, source: SourceRef) -> Self {
        Self {
            value,
            source,
            provenance: HashMap::new(),
            should_flatten: false,
        }
    }

    /// Mark this value to be merged into its parent rather than nested.
    pub fn flattened(mut self) -> Self {
        self.should_flatten = true;
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn should_flatten(&self) -> bool {
        self.should_flatten
    }

    /// Source of the value at a dotted path: the closest recorded ancestor,
    /// or the value's own source.
    pub fn source_of(&self, path: &str) -> &SourceRef {
        let mut candidate = path;
        loop {
            if let Some(source) = self.provenance.get(candidate) {
                return source;
            }
            match candidate.rsplit_once('.') {
                Some((parent, _)) => candidate = parent,
                None => return &self.source,
            }
        }
    }

    /// Provenance entries of `child` once placed at `prefix` (or merged in
    /// place when `prefix` is `None`).
    fn provenance_entries(&self, prefix: Option<&str>) -> Vec<(String, SourceRef)> {
        if self.provenance.is_empty() {
            return match prefix {
                Some(prefix) => vec![(prefix.to_string(), Arc::clone(&self.source))],
                None => self
                    .value
                    .as_object()
                    .map(|map| {
                        map.keys()
                            .map(|key| (key.clone(), Arc::clone(&self.source)))
                            .collect()
                    })
                    .unwrap_or_default(),
            };
        }
        self.provenance
            .iter()
            .map(|(path, source)| {
                let path = match prefix {
                    Some(prefix) => tree::dotted(prefix, path),
                    None => path.clone(),
                };
                (path, Arc::clone(source))
            })
            .collect()
    }

    fn record(&mut self, entries: Vec<(String, SourceRef)>) {
        for (path, source) in entries {
            self.provenance.retain(|existing, _| !overlaps(existing, &path));
            if !Arc::ptr_eq(&source, &self.source) {
                self.provenance.insert(path, source);
            }
        }
    }
}

/// One path is the other, or an ancestor of it.
fn overlaps(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('.'))
    };
    a == b || nested(a, b) || nested(b, a)
}

/// Options for [`Parse::parse_with`]. Unset fields inherit from the handle.
#[derive(Clone, Default)]
pub struct ParseOptions {
    pub source: Option<SourceRef>,
    pub extensions: Option<Vec<SharedExtension>>,
    pub should_flatten: bool,
}

impl ParseOptions {
    /// Options that only mark the result for flattening.
    pub fn flatten() -> Self {
        Self {
            should_flatten: true,
            ..Self::default()
        }
    }
}

/// Recursive-parse handle given to a transform, positioned on its node.
#[derive(Clone)]
pub struct Parse {
    source: SourceRef,
    extensions: Arc<[SharedExtension]>,
    key: ExtensionKey,
    context: Arc<[ExtensionKey]>,
    /// Sources entered on the way to this node, outermost first.
    lineage: Arc<[SourceRef]>,
    /// Extensions that already fired on this node.
    visited: Vec<usize>,
}

impl Parse {
    fn root(source: SourceRef, extensions: Arc<[SharedExtension]>) -> Self {
        Self {
            lineage: Arc::from([Arc::clone(&source)]),
            source,
            extensions,
            key: ExtensionKey::Root,
            context: Arc::from([]),
            visited: Vec::new(),
        }
    }

    pub fn key(&self) -> &ExtensionKey {
        &self.key
    }

    /// Keys from the root down to, but excluding, this node.
    pub fn context(&self) -> &[ExtensionKey] {
        &self.context
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Every source switched to between the root and this node, ending with
    /// the current one.
    pub fn lineage(&self) -> &[SourceRef] {
        &self.lineage
    }

    /// Dotted path of this node, `"root"` at the top.
    pub fn path(&self) -> String {
        context_path(&self.context, &self.key)
    }

    /// Parse `value` at this node with the current source and extensions.
    pub fn parse(&self, value: Value) -> BoxFuture<'static, Result<ParsedValue, LayerfigError>> {
        self.parse_with(value, ParseOptions::default())
    }

    pub fn parse_with(
        &self,
        value: Value,
        options: ParseOptions,
    ) -> BoxFuture<'static, Result<ParsedValue, LayerfigError>> {
        let mut node = self.clone();
        if let Some(source) = options.source {
            let lineage: Vec<SourceRef> = node
                .lineage
                .iter()
                .cloned()
                .chain(std::iter::once(Arc::clone(&source)))
                .collect();
            node.lineage = lineage.into();
            node.source = source;
        }
        if let Some(extensions) = options.extensions {
            node.extensions = extensions.into();
        }
        let flatten = options.should_flatten;
        Box::pin(async move {
            let parsed = evaluate(value, node).await?;
            Ok(if flatten { parsed.flattened() } else { parsed })
        })
    }

    fn child(&self, key: ExtensionKey) -> Self {
        let context: Vec<ExtensionKey> = self
            .context
            .iter()
            .cloned()
            .chain(std::iter::once(self.key.clone()))
            .collect();
        Self {
            source: Arc::clone(&self.source),
            extensions: Arc::clone(&self.extensions),
            key,
            context: context.into(),
            lineage: Arc::clone(&self.lineage),
            visited: Vec::new(),
        }
    }

    /// The first extension that applies here and has not fired here yet.
    fn first_applicable(&self, value: &Value) -> Option<(usize, Transform)> {
        self.extensions.iter().find_map(|ext| {
            let id = extension::extension_id(ext);
            if self.visited.contains(&id) {
                return None;
            }
            match ext.applies(value, &self.key, &self.context) {
                Applicability::Apply(transform) => Some((id, transform)),
                Applicability::NotApplicable => None,
            }
        })
    }
}

/// Parse a whole tree from `source` with `extensions`.
pub async fn parse_value(
    value: Value,
    source: SourceRef,
    extensions: &[SharedExtension],
) -> Result<ParsedValue, LayerfigError> {
    let mut parsed = evaluate(value, Parse::root(source, extensions.into())).await?;
    parsed.should_flatten = false;
    Ok(parsed)
}

enum Step {
    Done(ParsedValue),
    Descend(Frame, (Value, Parse)),
}

/// A mapping or sequence whose children are being evaluated.
struct Frame {
    node: Parse,
    out: ParsedValue,
    /// A flattened non-mapping child that replaces the whole container.
    replacement: Option<ParsedValue>,
    children: Children,
}

enum Children {
    Object {
        remaining: serde_json::map::IntoIter,
        current: String,
    },
    Array {
        remaining: std::iter::Enumerate<std::vec::IntoIter<Value>>,
    },
}

impl Frame {
    fn object(node: Parse, map: Map<String, Value>) -> Self {
        let out = ParsedValue::literal(Value::Object(Map::new()), Arc::clone(&node.source));
        Self {
            node,
            out,
            replacement: None,
            children: Children::Object {
                remaining: map.into_iter(),
                current: String::new(),
            },
        }
    }

    fn array(node: Parse, items: Vec<Value>) -> Self {
        let out = ParsedValue::literal(Value::Array(Vec::new()), Arc::clone(&node.source));
        Self {
            node,
            out,
            replacement: None,
            children: Children::Array {
                remaining: items.into_iter().enumerate(),
            },
        }
    }

    fn next_child(&mut self) -> Option<(Value, Parse)> {
        match &mut self.children {
            Children::Object { remaining, current } => {
                let (key, value) = remaining.next()?;
                *current = key.clone();
                Some((value, self.node.child(ExtensionKey::Object(key))))
            }
            Children::Array { remaining } => {
                let (index, value) = remaining.next()?;
                Some((value, self.node.child(ExtensionKey::Array(index))))
            }
        }
    }

    fn accept(&mut self, child: ParsedValue) {
        match &self.children {
            Children::Object { current, .. } => {
                if child.should_flatten {
                    if child.value.is_object() {
                        let entries = child.provenance_entries(None);
                        let base = mem::take(&mut self.out.value);
                        self.out.value = merge::deep_merge(base, child.value);
                        self.out.record(entries);
                    } else {
                        self.replacement = Some(child);
                    }
                    return;
                }
                // Merged rather than inserted: a flattened sibling may already
                // have filled this key.
                let entries = child.provenance_entries(Some(current));
                let mut overlay = Map::new();
                overlay.insert(current.clone(), child.value);
                let base = mem::take(&mut self.out.value);
                self.out.value = merge::deep_merge(base, Value::Object(overlay));
                self.out.record(entries);
            }
            Children::Array { .. } => {
                let start = self.out.value.as_array().map_or(0, Vec::len);
                let splice = child.should_flatten && child.value.is_array();
                let entries = if splice {
                    let len = child.value.as_array().map_or(0, Vec::len);
                    let own: Vec<(String, SourceRef)> = (start..start + len)
                        .map(|index| (index.to_string(), Arc::clone(&child.source)))
                        .collect();
                    let nested: Vec<(String, SourceRef)> = child
                        .provenance
                        .iter()
                        .map(|(path, source)| (path.clone(), Arc::clone(source)))
                        .collect();
                    own.into_iter().chain(shift_indexes(nested, start)).collect()
                } else {
                    child.provenance_entries(Some(&start.to_string()))
                };
                if let Value::Array(items) = &mut self.out.value {
                    match child.value {
                        Value::Array(spliced) if splice => items.extend(spliced),
                        value => items.push(value),
                    }
                }
                self.out.record(entries);
            }
        }
    }

    fn finish(self) -> ParsedValue {
        match self.replacement {
            Some(mut replacement) => {
                replacement.should_flatten = false;
                replacement
            }
            None => self.out,
        }
    }
}

/// Re-base `index.rest` provenance paths of a spliced sequence at `offset`.
fn shift_indexes(entries: Vec<(String, SourceRef)>, offset: usize) -> Vec<(String, SourceRef)> {
    entries
        .into_iter()
        .filter_map(|(path, source)| {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path.as_str(), None),
            };
            let index = head.parse::<usize>().ok()? + offset;
            let path = match rest {
                Some(rest) => format!("{index}.{rest}"),
                None => index.to_string(),
            };
            Some((path, source))
        })
        .collect()
}

async fn visit(value: Value, mut node: Parse) -> Result<Step, LayerfigError> {
    if let Some((id, transform)) = node.first_applicable(&value) {
        trace!(path = %node.path(), "extension applied");
        node.visited.push(id);
        return Ok(Step::Done(transform.run(node).await?));
    }
    match value {
        Value::Object(map) if !map.is_empty() => {
            let mut frame = Frame::object(node, map);
            match frame.next_child() {
                Some(child) => Ok(Step::Descend(frame, child)),
                None => Ok(Step::Done(frame.finish())),
            }
        }
        Value::Array(items) if !items.is_empty() => {
            let mut frame = Frame::array(node, items);
            match frame.next_child() {
                Some(child) => Ok(Step::Descend(frame, child)),
                None => Ok(Step::Done(frame.finish())),
            }
        }
        value => Ok(Step::Done(ParsedValue::literal(value, node.source))),
    }
}

fn evaluate(value: Value, start: Parse) -> BoxFuture<'static, Result<ParsedValue, LayerfigError>> {
    Box::pin(async move {
        let mut frames: Vec<Frame> = Vec::new();
        let mut pending = (value, start);
        loop {
            let (value, node) = pending;
            let mut completed = match visit(value, node).await? {
                Step::Done(parsed) => parsed,
                Step::Descend(frame, child) => {
                    frames.push(frame);
                    pending = child;
                    continue;
                }
            };
            // Hand the finished node to its parent, closing every frame whose
            // children are all done.
            pending = loop {
                let Some(mut frame) = frames.pop() else {
                    return Ok(completed);
                };
                frame.accept(completed);
                if let Some(child) = frame.next_child() {
                    frames.push(frame);
                    break child;
                }
                completed = frame.finish();
            };
        }
    })
}
