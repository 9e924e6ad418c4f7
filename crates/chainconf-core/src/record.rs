//! Configuration record model
//!
//! A [`Record`] is an ordered set of typed [`Field`]s. Each field carries a
//! name, an annotation blob (source locators, declarations, validation
//! rules), a declared [`FieldKind`], and its current [`FieldValue`]. Field
//! positions are stable for the lifetime of the record, so the interpolation
//! engine and loaders address fields by index.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declared type of a field, as far as interpolation is concerned.
///
/// Anything that cannot provide a variable value is `Opaque`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text
    Text,
    /// Signed integer (any width collapses to i64)
    SignedInt,
    /// Unsigned integer (any width collapses to u64)
    UnsignedInt,
    /// Floating point
    Float,
    /// Boolean
    Bool,
    /// Any other type; carried but never rendered to text
    Opaque,
}

impl FieldKind {
    /// Human-readable kind name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::SignedInt => "signed integer",
            FieldKind::UnsignedInt => "unsigned integer",
            FieldKind::Float => "float",
            FieldKind::Bool => "boolean",
            FieldKind::Opaque => "opaque",
        }
    }
}

/// Runtime value of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    /// Unset
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Int(i64),
    /// Unsigned integer value
    Uint(u64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Sequence of values (opaque to interpolation)
    Sequence(Vec<FieldValue>),
    /// Mapping of string keys to values (opaque to interpolation)
    Mapping(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// Check if this value is unset
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Get as str if this is Text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is Int
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as u64 if this is Uint
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// Get as f64 if this is Float or an integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Uint(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Get as bool if this is Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Int(_) => "signed integer",
            FieldValue::Uint(_) => "unsigned integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Sequence(_) => "sequence",
            FieldValue::Mapping(_) => "mapping",
        }
    }

    /// Check whether this is the default (zero) value for its shape.
    ///
    /// Empty text, zero numbers, and `false` all count as default, matching
    /// the short-circuit population check.
    pub fn is_default(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Int(i) => *i == 0,
            FieldValue::Uint(u) => *u == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Sequence(s) => s.is_empty(),
            FieldValue::Mapping(m) => m.is_empty(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        FieldValue::Uint(u)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

/// One member of a configuration record
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    annotation: String,
    kind: FieldKind,
    public: bool,
    value: FieldValue,
}

impl Field {
    /// Create a field with an explicit kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            annotation: String::new(),
            kind,
            public: true,
            value: FieldValue::Null,
        }
    }

    /// Create a text field
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Create a signed integer field
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::SignedInt)
    }

    /// Create an unsigned integer field
    pub fn uint(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::UnsignedInt)
    }

    /// Create a float field
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Create a boolean field
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Create an opaque field (never usable as a variable provider)
    pub fn opaque(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Opaque)
    }

    /// Set the annotation blob (e.g. `env:"PORT" config:"availableAs=PORT"`)
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    /// Mark the field as not publicly accessible
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    /// Set an initial value
    pub fn with_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = value.into();
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw annotation text
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Declared kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether the field is publicly accessible
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Current value
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Whether the current value is the default for the field's shape
    pub fn is_default(&self) -> bool {
        self.value.is_default()
    }

    /// Replace the value, checking it against the declared kind
    pub fn set_value(&mut self, value: FieldValue) -> Result<()> {
        let compatible = matches!(
            (self.kind, &value),
            (_, FieldValue::Null)
                | (FieldKind::Text, FieldValue::Text(_))
                | (FieldKind::SignedInt, FieldValue::Int(_))
                | (FieldKind::UnsignedInt, FieldValue::Uint(_))
                | (FieldKind::Float, FieldValue::Float(_))
                | (FieldKind::Float, FieldValue::Int(_))
                | (FieldKind::Bool, FieldValue::Bool(_))
                | (FieldKind::Opaque, _)
        );
        if !compatible {
            return Err(Error::coercion(
                &self.name,
                self.kind.name(),
                value.type_name(),
            ));
        }
        // Widen integers assigned to float fields
        self.value = match (self.kind, value) {
            (FieldKind::Float, FieldValue::Int(i)) => FieldValue::Float(i as f64),
            (_, v) => v,
        };
        Ok(())
    }

    /// Parse a raw text value into the declared kind and store it
    pub fn set_from_str(&mut self, raw: &str) -> Result<()> {
        let value = match self.kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::SignedInt => FieldValue::Int(
                raw.trim()
                    .parse()
                    .map_err(|_| Error::coercion(&self.name, "signed integer", raw))?,
            ),
            FieldKind::UnsignedInt => FieldValue::Uint(
                raw.trim()
                    .parse()
                    .map_err(|_| Error::coercion(&self.name, "unsigned integer", raw))?,
            ),
            FieldKind::Float => FieldValue::Float(
                raw.trim()
                    .parse()
                    .map_err(|_| Error::coercion(&self.name, "float", raw))?,
            ),
            FieldKind::Bool => match raw.trim() {
                "true" | "1" => FieldValue::Bool(true),
                "false" | "0" => FieldValue::Bool(false),
                _ => return Err(Error::coercion(&self.name, "boolean", raw)),
            },
            FieldKind::Opaque => {
                return Err(Error::coercion(&self.name, "a non-opaque kind", raw));
            }
        };
        self.value = value;
        Ok(())
    }
}

/// An ordered configuration record
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Create a record from its fields. Positions are fixed from here on.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in positional order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field at a position.
    ///
    /// Panics if `index` is out of range; indices come from the record
    /// itself or from an analysis of it, so a bad index is a caller bug.
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Mutable field at a position
    pub fn field_mut(&mut self, index: usize) -> &mut Field {
        &mut self.fields[index]
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Mutable lookup by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Text value of a named field
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|f| f.value().as_str())
    }

    /// Signed integer value of a named field
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|f| f.value().as_i64())
    }

    /// Unsigned integer value of a named field
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|f| f.value().as_u64())
    }

    /// Float value of a named field
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|f| f.value().as_f64())
    }

    /// Boolean value of a named field
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|f| f.value().as_bool())
    }

    /// Whether every public field holds a non-default value.
    ///
    /// Drives the short-circuit check in the chain loaders. Private fields
    /// are ignored.
    pub fn is_fully_populated(&self) -> bool {
        self.fields
            .iter()
            .filter(|f| f.is_public())
            .all(|f| !f.is_default())
    }
}
