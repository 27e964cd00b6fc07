//! Serde-backed schema: a value is valid when it deserializes into `T`.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::validation::{Issue, Schema};

/// Validates by round-tripping through `T`, so the output is normalized to
/// exactly what `T` serializes (defaults filled, unknown fields dropped
/// unless `T` keeps them).
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedSchema<{}>", std::any::type_name::<T>())
    }
}

fn normalize<T: Serialize>(typed: &T) -> Result<Value, Vec<Issue>> {
    serde_json::to_value(typed).map_err(|e| vec![Issue::root(e.to_string())])
}

#[async_trait]
impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    async fn validate(&self, value: Value) -> Result<Value, Vec<Issue>> {
        let typed: T = serde_json::from_value(value).map_err(|e| vec![Issue::root(e.to_string())])?;
        normalize(&typed)
    }

    /// Records go through the urlencoded deserializer, which parses numbers
    /// and booleans out of strings according to `T`.
    async fn validate_record(&self, record: &[(String, String)]) -> Result<Value, Vec<Issue>> {
        let encoded = serde_urlencoded::to_string(record).map_err(|e| vec![Issue::root(e.to_string())])?;
        let typed: T = serde_urlencoded::from_str(&encoded).map_err(|e| vec![Issue::root(e.to_string())])?;
        normalize(&typed)
    }
}
