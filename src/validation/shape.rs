//! Declarative object schema.
//!
//! A `Shape` lists named fields with a scalar kind and a required flag.
//! Records coming from the path or query string are coerced from strings
//! before checking; decoded JSON is checked as-is.

use async_trait::async_trait;
use serde_json::{Map, Number, Value};

use crate::validation::{record_to_value, Issue, Schema};

/// Expected kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Any,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Any => "any",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Any => true,
        }
    }

    /// Best-effort conversion of a string into this kind. Leaves the value
    /// untouched when it does not parse, so the type check reports it.
    fn coerce(self, value: Value) -> Value {
        let Value::String(raw) = &value else {
            return value;
        };
        match self {
            FieldKind::Integer => raw.parse::<i64>().map(Value::from).unwrap_or(value),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(value),
            FieldKind::Boolean => match raw.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value,
            },
            FieldKind::String | FieldKind::Any => value,
        }
    }
}

/// What to do with fields the shape does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFields {
    #[default]
    Allow,
    Strip,
    Deny,
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Shape {
    fields: Vec<Field>,
    unknown: UnknownFields,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.unknown = policy;
        self
    }

    fn check(&self, value: Value, coerce: bool) -> Result<Value, Vec<Issue>> {
        let Value::Object(mut input) = value else {
            return Err(vec![Issue::root(format!(
                "expected object, received {}",
                describe(&value)
            ))]);
        };

        let mut issues = Vec::new();
        let mut output = Map::new();

        for field in &self.fields {
            match input.remove(&field.name) {
                None | Some(Value::Null) if field.required => {
                    issues.push(Issue::field(&field.name, "required"));
                }
                None | Some(Value::Null) => {}
                Some(raw) => {
                    let value = if coerce { field.kind.coerce(raw) } else { raw };
                    if field.kind.accepts(&value) {
                        output.insert(field.name.clone(), value);
                    } else {
                        issues.push(Issue::field(
                            &field.name,
                            format!("expected {}, received {}", field.kind.name(), describe(&value)),
                        ));
                    }
                }
            }
        }

        match self.unknown {
            UnknownFields::Allow => output.extend(input),
            UnknownFields::Strip => {}
            UnknownFields::Deny => {
                for key in input.keys() {
                    issues.push(Issue::field(key, "unrecognized field"));
                }
            }
        }

        if issues.is_empty() {
            Ok(Value::Object(output))
        } else {
            Err(issues)
        }
    }
}

#[async_trait]
impl Schema for Shape {
    async fn validate(&self, value: Value) -> Result<Value, Vec<Issue>> {
        self.check(value, false)
    }

    async fn validate_record(&self, record: &[(String, String)]) -> Result<Value, Vec<Issue>> {
        self.check(record_to_value(record), true)
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
