//! Declarative description of the output shape a stage expects.
//!
//! An [`OutputSchema`] renders format instructions for the prompt and
//! coerces a parsed provider payload into that shape, reporting the JSON
//! path of the first mismatch.

use crate::errors::SchemaMismatchError;
use serde_json::{Map, Value};

/// The type of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A string, optionally bounded in characters.
    String {
        /// Maximum length in characters.
        max_len: Option<usize>,
    },
    /// A string drawn from a closed set (matched case-insensitively).
    Enum {
        /// Accepted values, in canonical lowercase form.
        values: Vec<String>,
    },
    /// An array of a single item kind.
    Array {
        /// Kind of every element.
        item: Box<FieldKind>,
        /// Required element count.
        len: Option<usize>,
    },
    /// A nested object.
    Object(OutputSchema),
}

impl FieldKind {
    /// An unbounded string.
    #[must_use]
    pub const fn string() -> Self {
        Self::String { max_len: None }
    }

    /// A string of at most `max_len` characters.
    #[must_use]
    pub const fn bounded_string(max_len: usize) -> Self {
        Self::String {
            max_len: Some(max_len),
        }
    }

    /// A string drawn from `values`.
    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Enum {
            values: values
                .into_iter()
                .map(|v| v.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// An array of exactly `len` elements of `item`.
    #[must_use]
    pub fn array_of(item: Self, len: usize) -> Self {
        Self::Array {
            item: Box::new(item),
            len: Some(len),
        }
    }

    fn to_json_schema(&self, description: Option<&str>) -> Value {
        let mut node = Map::new();

        match self {
            Self::String { max_len } => {
                node.insert("type".to_string(), Value::from("string"));
                if let Some(max) = max_len {
                    node.insert("maxLength".to_string(), Value::from(*max));
                }
            }
            Self::Enum { values } => {
                node.insert("type".to_string(), Value::from("string"));
                node.insert("enum".to_string(), Value::from(values.clone()));
            }
            Self::Array { item, len } => {
                node.insert("type".to_string(), Value::from("array"));
                node.insert("items".to_string(), item.to_json_schema(None));
                if let Some(len) = len {
                    node.insert("minItems".to_string(), Value::from(*len));
                    node.insert("maxItems".to_string(), Value::from(*len));
                }
            }
            Self::Object(schema) => return schema.object_node(description),
        }

        if let Some(description) = description {
            node.insert("description".to_string(), Value::from(description));
        }
        Value::Object(node)
    }

    fn coerce(&self, value: Value, path: &str) -> Result<Value, SchemaMismatchError> {
        match self {
            Self::String { max_len } => {
                let text = expect_str(value, path)?;
                let trimmed = text.trim();
                if let Some(max) = max_len {
                    let count = trimmed.chars().count();
                    if count > *max {
                        return Err(SchemaMismatchError::at(
                            path,
                            format!("expected at most {max} characters, got {count}"),
                        ));
                    }
                }
                Ok(Value::from(trimmed))
            }
            Self::Enum { values } => {
                let text = expect_str(value, path)?;
                let normalized = text.trim().to_lowercase();
                if values.contains(&normalized) {
                    Ok(Value::from(normalized))
                } else {
                    Err(SchemaMismatchError::at(
                        path,
                        format!("'{}' is not one of [{}]", text, values.join(", ")),
                    ))
                }
            }
            Self::Array { item, len } => {
                let elements = match value {
                    Value::Array(elements) => elements,
                    other => {
                        return Err(SchemaMismatchError::at(
                            path,
                            format!("expected an array, got {}", type_name(&other)),
                        ));
                    }
                };
                if let Some(len) = len {
                    if elements.len() != *len {
                        return Err(SchemaMismatchError::at(
                            path,
                            format!("expected {len} items, got {}", elements.len()),
                        ));
                    }
                }
                elements
                    .into_iter()
                    .enumerate()
                    .map(|(i, element)| item.coerce(element, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Self::Object(schema) => schema.coerce_at(value, path),
        }
    }
}

/// One named field of an object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// JSON key.
    pub name: String,
    /// Guidance for the model.
    pub description: String,
    /// Field type.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
}

impl FieldSpec {
    /// Creates a required field.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    /// Marks the field optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A declarative object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl OutputSchema {
    /// Creates an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Returns the schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Renders the schema as a JSON Schema document.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        self.object_node(None)
    }

    /// Renders instructions telling the model how to format its answer.
    ///
    /// The rendering is deterministic for a given schema.
    #[must_use]
    pub fn format_instructions(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.to_json_schema())
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "Respond only with a JSON object named \"{}\" that conforms to the JSON schema below. \
             Do not add commentary or extra fields.\n```json\n{}\n```",
            self.name, schema
        )
    }

    /// Coerces `value` into this schema.
    ///
    /// Strings are trimmed, enum values are lowercased, and keys that the
    /// schema does not declare are dropped.
    pub fn coerce(&self, value: Value) -> Result<Value, SchemaMismatchError> {
        self.coerce_at(value, "$")
    }

    fn coerce_at(&self, value: Value, path: &str) -> Result<Value, SchemaMismatchError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(SchemaMismatchError::at(
                    path,
                    format!("expected an object, got {}", type_name(&other)),
                ));
            }
        };

        let mut coerced = Map::new();
        for spec in &self.fields {
            let field_path = format!("{path}.{}", spec.name);
            match object.remove(&spec.name) {
                Some(Value::Null) | None if spec.required => {
                    return Err(SchemaMismatchError::at(field_path, "required field is missing"));
                }
                Some(Value::Null) | None => {}
                Some(field) => {
                    coerced.insert(spec.name.clone(), spec.kind.coerce(field, &field_path)?);
                }
            }
        }

        Ok(Value::Object(coerced))
    }

    fn object_node(&self, description: Option<&str>) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.kind.to_json_schema(Some(&f.description))))
            .collect();
        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| Value::from(f.name.clone()))
            .collect();

        let mut node = Map::new();
        node.insert("type".to_string(), Value::from("object"));
        node.insert("properties".to_string(), Value::Object(properties));
        node.insert("required".to_string(), Value::Array(required));
        if let Some(description) = description {
            node.insert("description".to_string(), Value::from(description));
        }
        Value::Object(node)
    }
}

fn expect_str(value: Value, path: &str) -> Result<String, SchemaMismatchError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(SchemaMismatchError::at(
            path,
            format!("expected a string, got {}", type_name(&other)),
        )),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
