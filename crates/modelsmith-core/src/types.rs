//! Scalar type tags for field and column descriptors.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// The declared type of a plain field or synthesized column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean
    Boolean,
    /// 64-bit signed integer (also the identifier type for primary keys)
    Integer,
    /// 64-bit floating point
    Float,
    /// Text string
    Text,
    /// Binary data
    Bytes,
}

impl ScalarType {
    /// SQL type name used in table descriptors.
    #[must_use]
    pub const fn sql_name(&self) -> &'static str {
        match self {
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::Integer => "BIGINT",
            ScalarType::Float => "DOUBLE PRECISION",
            ScalarType::Text => "TEXT",
            ScalarType::Bytes => "BLOB",
        }
    }

    /// Check whether a (non-null) value already has this scalar type.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarType::Boolean, Value::Bool(_))
                | (ScalarType::Integer, Value::Int(_))
                | (ScalarType::Float, Value::Float(_))
                | (ScalarType::Text, Value::Text(_))
                | (ScalarType::Bytes, Value::Bytes(_))
        )
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_name())
    }
}
