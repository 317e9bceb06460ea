//! Route a global override into the secret or non-secret half of a config.
//!
//! The override (typically injected by CI through an environment variable)
//! is walked leaf by leaf. A leaf whose path already holds a truthy value in
//! the non-secret tree overwrites it there. Every other leaf lands in the
//! secret tree, so an override the config never declared is treated as
//! sensitive.
//!
//! The check is truthiness, not existence: a non-secret `false` or `0` at the
//! same path routes the override to the secrets.

use serde_json::{Map, Value};
use tracing::trace;

use crate::tree;

/// Write every leaf of `overrides` into `non_secrets` or `secrets`.
///
/// Mappings recurse; scalars, sequences and `null` are leaves. Leaves are
/// visited depth-first in document order with an explicit stack.
pub fn assign_properties(
    overrides: Map<String, Value>,
    non_secrets: &mut Value,
    secrets: &mut Value,
) {
    let mut stack = vec![(Vec::<String>::new(), overrides.into_iter())];

    loop {
        let next = match stack.last_mut() {
            Some((prefix, entries)) => entries.next().map(|(key, value)| {
                let mut path = prefix.clone();
                path.push(key);
                (path, value)
            }),
            None => break,
        };

        match next {
            None => {
                stack.pop();
            }
            Some((path, Value::Object(children))) => stack.push((path, children.into_iter())),
            Some((path, leaf)) => {
                let in_non_secrets =
                    tree::get_path(non_secrets, path.as_slice()).is_some_and(tree::is_truthy);
                if in_non_secrets {
                    trace!(path = %path.join("."), "override replaces non-secret value");
                    tree::set_path(non_secrets, path.as_slice(), leaf);
                } else {
                    trace!(path = %path.join("."), "override routed to secrets");
                    tree::set_path(secrets, path.as_slice(), leaf);
                }
            }
        }
    }
}
