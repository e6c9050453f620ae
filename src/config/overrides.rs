//! Path-addressed overrides on configuration trees
//!
//! [`deep_replace`] applies `dotted.path=value` overrides to an existing
//! tree, producing a new tree without touching the original. Replacement is
//! copy-on-write along the touched paths and identity-preserving: a node
//! reachable through several reference paths is replaced everywhere it
//! appears, so an override applied through one path is visible through all
//! of them. That sharing visibility is intentional (one model node, many
//! consumers) and pinned by tests.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::node::{node_id, NodeRef};
use super::value::ConfigValue;

/// Ordered path → value override specification
pub type OverrideMap = Vec<(String, ConfigValue)>;

/// Errors from override parsing and application
#[derive(Debug, Error)]
pub enum OverrideError {
    /// A path segment does not exist on the tree
    #[error("override path `{path}` does not resolve: no field at `{prefix}`")]
    PathNotFound { path: String, prefix: String },

    /// A path tries to descend through a value that is not a node
    #[error("override path `{path}` cannot descend below `{prefix}`: field is {found}, not a node")]
    NotANode {
        path: String,
        prefix: String,
        found: &'static str,
    },

    /// A raw override string is not of the form `path=value`
    #[error("malformed override `{0}` (expected `path=value`)")]
    Malformed(String),
}

/// Result alias for override operations
pub type Result<T> = std::result::Result<T, OverrideError>;

/// Parse raw `path=value` strings (typically CLI arguments) into an
/// override map. Values coerce via [`ConfigValue::parse`].
pub fn parse_overrides<I, S>(specs: I) -> Result<OverrideMap>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = OverrideMap::new();
    for spec in specs {
        let spec = spec.as_ref();
        let (path, raw) = spec
            .split_once('=')
            .ok_or_else(|| OverrideError::Malformed(spec.to_string()))?;
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(OverrideError::Malformed(spec.to_string()));
        }
        out.push((path.to_string(), ConfigValue::parse(raw)));
    }
    Ok(out)
}

/// Apply overrides to a tree, returning the new tree.
///
/// Overrides apply in order, each against the result of the previous one.
/// An empty map returns the input tree unchanged. A path that does not
/// resolve to an existing field fails with [`OverrideError::PathNotFound`]
/// and leaves the original tree unaltered.
pub fn deep_replace(tree: &NodeRef, overrides: &OverrideMap) -> Result<NodeRef> {
    let mut root = tree.clone();
    for (path, value) in overrides {
        root = apply_one(&root, path, value)?;
    }
    Ok(root)
}

fn apply_one(root: &NodeRef, path: &str, value: &ConfigValue) -> Result<NodeRef> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(OverrideError::Malformed(path.to_string()));
    }

    // Walk down to the node owning the final attribute.
    let mut current = root.clone();
    for (i, &segment) in segments[..segments.len() - 1].iter().enumerate() {
        let prefix = segments[..=i].join(".");
        match current.get(segment) {
            None => {
                return Err(OverrideError::PathNotFound {
                    path: path.to_string(),
                    prefix,
                })
            }
            Some(ConfigValue::Node(child)) => current = child.clone(),
            Some(other) => {
                return Err(OverrideError::NotANode {
                    path: path.to_string(),
                    prefix,
                    found: other.type_name(),
                })
            }
        }
    }

    let leaf = segments[segments.len() - 1];
    if current.get(leaf).is_none() {
        return Err(OverrideError::PathNotFound {
            path: path.to_string(),
            prefix: path.to_string(),
        });
    }

    let replacement = Arc::new(current.with_field(leaf, value.clone()));
    Ok(replace_node(root, node_id(&current), &replacement))
}

/// Rewrite `root`, substituting every occurrence of the node identified by
/// `target` with `replacement`. Untouched branches are reused; a shared
/// parent is rewritten once and stays shared in the result.
fn replace_node(root: &NodeRef, target: usize, replacement: &NodeRef) -> NodeRef {
    let mut memo: HashMap<usize, NodeRef> = HashMap::new();
    rewrite(root, target, replacement, &mut memo)
}

fn rewrite(
    node: &NodeRef,
    target: usize,
    replacement: &NodeRef,
    memo: &mut HashMap<usize, NodeRef>,
) -> NodeRef {
    if node_id(node) == target {
        return replacement.clone();
    }
    if let Some(done) = memo.get(&node_id(node)) {
        return done.clone();
    }

    let mut changed = false;
    let fields: Vec<(String, ConfigValue)> = node
        .fields()
        .iter()
        .map(|(k, v)| {
            (
                k.clone(),
                rewrite_value(v, target, replacement, memo, &mut changed),
            )
        })
        .collect();

    let out = if changed {
        Arc::new(node.with_fields(fields))
    } else {
        node.clone()
    };
    memo.insert(node_id(node), out.clone());
    out
}

fn rewrite_value(
    value: &ConfigValue,
    target: usize,
    replacement: &NodeRef,
    memo: &mut HashMap<usize, NodeRef>,
    changed: &mut bool,
) -> ConfigValue {
    match value {
        ConfigValue::Node(child) => {
            let rewritten = rewrite(child, target, replacement, memo);
            if !Arc::ptr_eq(&rewritten, child) {
                *changed = true;
            }
            ConfigValue::Node(rewritten)
        }
        ConfigValue::List(items) => ConfigValue::List(
            items
                .iter()
                .map(|item| rewrite_value(item, target, replacement, memo, changed))
                .collect(),
        ),
        other => other.clone(),
    }
}
