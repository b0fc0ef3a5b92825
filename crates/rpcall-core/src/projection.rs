// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Secure argument projection.
//!
//! Flattens an [`ArgumentTree`] into an ordered mapping keyed by field name.
//! Two flags select the view and are fully orthogonal:
//!
//! | `plain` | `redact_secure` | Use |
//! |---------|-----------------|-----|
//! | `true`  | `false` | trusted internal logging ([`ProjectionOptions::plain_view`]) |
//! | `false` | `false` | handler code needing typed values ([`ProjectionOptions::typed_view`]) |
//! | `true`  | `true`  | untrusted logs and audit trails ([`ProjectionOptions::redacted_view`]) |
//! | `false` | `true`  | typed values with secrets removed |
//!
//! A secure field under redaction is replaced by [`REDACTED_SENTINEL`] and
//! never descended into.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::arguments::{ArgumentTree, FieldValue, TypedValue};

/// Text substituted for secure fields under redaction.
pub const REDACTED_SENTINEL: &str = "*** omitted ***";

/// Default limit on nested tree levels, counting the root.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Flags selecting a projection view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Render leaves as scalars instead of typed wrappers.
    pub plain: bool,
    /// Replace secure fields with [`REDACTED_SENTINEL`].
    pub redact_secure: bool,
    /// Maximum number of tree levels, counting the root.
    pub max_depth: usize,
}

impl ProjectionOptions {
    /// Any combination of the two flags, with the default depth limit.
    pub fn new(plain: bool, redact_secure: bool) -> Self {
        Self {
            plain,
            redact_secure,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Plain scalars, nothing redacted.
    pub fn plain_view() -> Self {
        Self::new(true, false)
    }

    /// Typed wrappers, nothing redacted.
    pub fn typed_view() -> Self {
        Self::new(false, false)
    }

    /// Plain scalars with secure fields replaced by the sentinel.
    pub fn redacted_view() -> Self {
        Self::new(true, true)
    }

    /// Override the depth limit. Values below 1 are raised to 1.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }
}

/// Projection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// The tree nests deeper than the configured limit.
    #[error("argument tree exceeds maximum depth {max_depth} at '{path}'")]
    DepthExceeded {
        /// The configured limit.
        max_depth: usize,
        /// Dotted path of the field whose value crossed the limit.
        path: String,
    },
}

impl ProjectionError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DepthExceeded { .. } => "ARGUMENT_DEPTH_EXCEEDED",
        }
    }
}

/// A single projected field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedValue {
    /// Absent or null value.
    Null,
    /// Secure field under redaction.
    Redacted,
    /// Scalar leaf (`plain` view).
    Plain(Value),
    /// Typed leaf (typed view).
    Typed(TypedValue),
    /// Nested tree.
    Nested(ProjectedMap),
}

impl ProjectedValue {
    /// Whether this value was replaced by the sentinel.
    pub fn is_redacted(&self) -> bool {
        matches!(self, Self::Redacted)
    }

    /// Nested mapping, if this value is one.
    pub fn as_nested(&self) -> Option<&ProjectedMap> {
        match self {
            Self::Nested(map) => Some(map),
            _ => None,
        }
    }

    /// Render as JSON. Typed leaves keep their type name.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Redacted => Value::String(REDACTED_SENTINEL.to_string()),
            Self::Plain(v) => v.clone(),
            Self::Typed(t) => serde_json::json!({
                "type": t.type_name(),
                "value": t.value_plain(),
            }),
            Self::Nested(map) => map.to_json(),
        }
    }
}

impl Serialize for ProjectedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Redacted => serializer.serialize_str(REDACTED_SENTINEL),
            Self::Plain(v) => v.serialize(serializer),
            Self::Typed(t) => t.serialize(serializer),
            Self::Nested(map) => map.serialize(serializer),
        }
    }
}

/// Ordered mapping from field name to projected value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedMap {
    entries: Vec<(String, ProjectedValue)>,
}

impl ProjectedMap {
    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&ProjectedValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Entries in tree order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProjectedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in tree order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of fields on this level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this level is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dotted paths of every leaf, in tree order.
    ///
    /// Redacted fields and empty nested maps count as leaves.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaf_paths("", &mut paths);
        paths
    }

    fn collect_leaf_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (key, value) in &self.entries {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                ProjectedValue::Nested(map) if !map.is_empty() => {
                    map.collect_leaf_paths(&path, out)
                }
                _ => out.push(path),
            }
        }
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(object)
    }
}

impl Serialize for ProjectedMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Project `tree` under `options`.
///
/// Pure and deterministic: the same tree and options always yield the same
/// mapping. Fails only when the tree is deeper than `options.max_depth`.
pub fn project(
    tree: &ArgumentTree,
    options: &ProjectionOptions,
) -> Result<ProjectedMap, ProjectionError> {
    let mut path = Vec::new();
    project_level(tree, options, 1, &mut path)
}

fn project_level(
    tree: &ArgumentTree,
    options: &ProjectionOptions,
    depth: usize,
    path: &mut Vec<String>,
) -> Result<ProjectedMap, ProjectionError> {
    if depth > options.max_depth {
        return Err(ProjectionError::DepthExceeded {
            max_depth: options.max_depth,
            path: path.join("."),
        });
    }

    let mut entries = Vec::with_capacity(tree.len());
    for field in tree.fields() {
        let projected = if options.redact_secure && field.is_secure() {
            ProjectedValue::Redacted
        } else {
            match field.value() {
                FieldValue::Null => ProjectedValue::Null,
                FieldValue::Typed(value) if options.plain => {
                    ProjectedValue::Plain(value.value_plain().clone())
                }
                FieldValue::Typed(value) => ProjectedValue::Typed(value.clone()),
                FieldValue::Tree(nested) => {
                    path.push(field.name().to_string());
                    let map = project_level(nested, options, depth + 1, path)?;
                    path.pop();
                    ProjectedValue::Nested(map)
                }
            }
        };
        entries.push((field.name().to_string(), projected));
    }

    Ok(ProjectedMap { entries })
}
