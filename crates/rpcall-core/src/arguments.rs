// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Argument tree produced by the protocol codec.
//!
//! An [`ArgumentTree`] is an ordered list of named fields. A field's value is
//! either null, a [`TypedValue`] or another tree. Each field carries its schema
//! metadata, including whether the IDL marks it `secure`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A leaf value together with the IDL type it was decoded as.
///
/// Dispatch logic works with this wrapper so it can reuse the declared type;
/// logging works with [`value_plain`](Self::value_plain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    #[serde(rename = "type")]
    type_name: String,
    value: Value,
}

impl TypedValue {
    /// Create a typed value from a declared type name and a JSON-native scalar.
    pub fn new(type_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    /// `i64` value.
    pub fn int(value: i64) -> Self {
        Self::new("i64", value)
    }

    /// `double` value.
    pub fn double(value: f64) -> Self {
        Self::new("double", value)
    }

    /// `bool` value.
    pub fn bool(value: bool) -> Self {
        Self::new("bool", value)
    }

    /// `string` value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::new("string", value.into())
    }

    /// The IDL type name this value was decoded as.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The language-native scalar, without the type wrapper.
    pub fn value_plain(&self) -> &Value {
        &self.value
    }

    /// Consume the wrapper and return the scalar.
    pub fn into_plain(self) -> Value {
        self.value
    }
}

/// Schema metadata attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Declared IDL type of the field.
    pub type_name: String,
    /// Whether the field holds sensitive data that must not reach untrusted logs.
    #[serde(default)]
    pub secure: bool,
}

impl FieldSchema {
    /// Schema for a non-secure field of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            secure: false,
        }
    }

    /// Mark the field as secure.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }
}

/// Value held by a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// The caller omitted the value or sent an explicit null.
    Null,
    /// A scalar leaf.
    Typed(TypedValue),
    /// A nested structure.
    Tree(ArgumentTree),
}

impl FieldValue {
    fn inferred_type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Typed(v) => v.type_name(),
            Self::Tree(_) => "struct",
        }
    }
}

impl From<TypedValue> for FieldValue {
    fn from(value: TypedValue) -> Self {
        Self::Typed(value)
    }
}

impl From<ArgumentTree> for FieldValue {
    fn from(tree: ArgumentTree) -> Self {
        Self::Tree(tree)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A named field of an [`ArgumentTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    value: FieldValue,
    schema: FieldSchema,
}

impl Field {
    /// Create a field whose schema type is inferred from the value.
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        let schema = FieldSchema::new(value.inferred_type_name());
        Self {
            name: name.into(),
            value,
            schema,
        }
    }

    /// Create a field with explicit schema metadata.
    pub fn with_schema(
        name: impl Into<String>,
        value: impl Into<FieldValue>,
        schema: FieldSchema,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            schema,
        }
    }

    /// Create a field the schema marks as secure.
    pub fn secure(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let mut field = Self::new(name, value);
        field.schema.secure = true;
        field
    }

    /// Field name, unique within its tree level.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field value.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Schema metadata.
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Whether the schema marks this field as secure.
    pub fn is_secure(&self) -> bool {
        self.schema.secure
    }
}

/// Ordered collection of named fields, possibly nested.
///
/// Field names are unique per level. Decoding rejects a level that repeats a
/// name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DecodedTree")]
pub struct ArgumentTree {
    fields: Vec<Field>,
}

#[derive(Deserialize)]
struct DecodedTree {
    fields: Vec<Field>,
}

impl TryFrom<DecodedTree> for ArgumentTree {
    type Error = String;

    fn try_from(decoded: DecodedTree) -> Result<Self, Self::Error> {
        let mut tree = Self::new();
        for field in decoded.fields {
            if tree.get(&field.name).is_some() {
                return Err(format!("duplicate field '{}'", field.name));
            }
            tree.fields.push(field);
        }
        Ok(tree)
    }
}

impl ArgumentTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, keeping insertion order.
    ///
    /// A field with the same name is replaced in place and returned.
    pub fn insert(&mut self, field: Field) -> Option<Field> {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => Some(std::mem::replace(existing, field)),
            None => {
                self.fields.push(field);
                None
            }
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_field(mut self, field: Field) -> Self {
        self.insert(field);
        self
    }

    /// Add a non-secure field.
    pub fn with(self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.with_field(Field::new(name, value))
    }

    /// Add a secure field.
    pub fn with_secure(self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.with_field(Field::secure(name, value))
    }

    /// Fields in stored order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field on this level by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields on this level.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether this level has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of tree levels, counting this one.
    ///
    /// Walks the tree with an explicit stack, so arbitrarily deep trees are safe.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((tree, level)) = pending.pop() {
            deepest = deepest.max(level);
            for field in &tree.fields {
                if let FieldValue::Tree(nested) = &field.value {
                    pending.push((nested, level + 1));
                }
            }
        }
        deepest
    }
}

impl FromIterator<Field> for ArgumentTree {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut tree = Self::new();
        for field in iter {
            tree.insert(field);
        }
        tree
    }
}
