//! The validator collaborator.
//!
//! Validates a bag of plain field values against an entity type's plain
//! field descriptors: required-presence, type checking with coercion, and
//! the declared text constraints. Returns the normalized values or a
//! structured error carrying, per failing field, a location path and an
//! error-kind tag. Relationship fields never reach this layer; the
//! constructor partitions them out first.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::descriptor::{EntityType, PlainField};
use crate::error::{ValidationError, ValidationErrorKind};
use crate::row::ColumnValues;
use crate::types::ScalarType;
use crate::value::Value;

/// Thread-safe cache of compiled regex patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime of
/// the process.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Fast path: already cached. Recover from a poisoned lock; the
        // cache holds only immutable compiled patterns.
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern, using the process-wide cache.
///
/// An invalid pattern is treated as a non-match and logged rather than
/// panicking inside a validation pass.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// Coerce a non-null value to the declared scalar type.
///
/// Exact matches pass through; integers widen to floats. Everything else is
/// a type mismatch.
fn coerce(field: &PlainField, value: &Value) -> Result<Value, ()> {
    if field.scalar.matches(value) {
        return Ok(value.clone());
    }
    match (field.scalar, value) {
        (ScalarType::Float, Value::Int(v)) => Ok(Value::Float(*v as f64)),
        _ => Err(()),
    }
}

/// Validate a bag of plain field values against an entity type.
///
/// Returns the normalized values in field declaration order. Fails with a
/// [`ValidationError`] listing every violation: missing required fields,
/// uncoercible types, violated text constraints, and keys that name no
/// declared plain field.
pub fn validate_fields(
    entity: &EntityType,
    values: &ColumnValues,
) -> Result<ColumnValues, ValidationError> {
    let mut errors = ValidationError::new();
    let mut normalized = ColumnValues::new();

    for field in entity.plain_fields() {
        let value = values.get(&field.name);
        match value {
            None | Some(Value::Null) => {
                if field.required {
                    errors.add_required(&field.name);
                } else {
                    normalized.set(field.name.clone(), Value::Null);
                }
            }
            Some(value) => match coerce(field, value) {
                Ok(coerced) => {
                    check_constraints(field, &coerced, &mut errors);
                    normalized.set(field.name.clone(), coerced);
                }
                Err(()) => {
                    errors.add_type(&field.name, field.scalar, value.type_name());
                }
            },
        }
    }

    // Keys that name no declared plain field are reported, not ignored:
    // synthesized foreign keys are derived state and must not be set here.
    for (name, _) in values.iter() {
        if !entity.plain_fields().any(|f| f.name == name) {
            errors.add_unknown_field(name);
        }
    }

    errors.into_result().map(|()| normalized)
}

fn check_constraints(field: &PlainField, value: &Value, errors: &mut ValidationError) {
    let Some(text) = value.as_str() else {
        return;
    };
    if let Some(max) = field.max_length {
        let len = text.chars().count();
        if len > max {
            errors.add_max_length(&field.name, max, len);
        }
    }
    if let Some(pattern) = &field.pattern {
        if !matches_pattern(text, pattern) {
            errors.add_pattern(&field.name, pattern);
        }
    }
}

/// Convert a JSON object into a plain-value bag.
///
/// Numbers become integers when exactly representable, floats otherwise;
/// nested arrays and objects are rejected as type errors on the field.
pub fn values_from_json(json: &serde_json::Value) -> Result<ColumnValues, ValidationError> {
    let mut errors = ValidationError::new();
    let mut values = ColumnValues::new();

    let Some(object) = json.as_object() else {
        let mut errors = ValidationError::new();
        errors.add("__root__", ValidationErrorKind::Type, "expected a JSON object");
        return Err(errors);
    };

    for (name, raw) in object {
        match raw {
            serde_json::Value::Null => values.set(name.clone(), Value::Null),
            serde_json::Value::Bool(v) => values.set(name.clone(), Value::Bool(*v)),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    values.set(name.clone(), Value::Int(v));
                } else if let Some(v) = n.as_f64() {
                    values.set(name.clone(), Value::Float(v));
                } else {
                    errors.add_type(name, "a representable number", n.to_string());
                }
            }
            serde_json::Value::String(s) => values.set(name.clone(), Value::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                errors.add_type(name, "a scalar value", "a nested JSON structure");
            }
        }
    }

    errors.into_result().map(|()| values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EntityType, PlainField};

    fn user() -> EntityType {
        EntityType::builder("User")
            .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
            .plain(PlainField::new("username", ScalarType::Text).max_length(16))
            .plain(
                PlainField::new("email", ScalarType::Text)
                    .required(false)
                    .pattern(r"^[^@\s]+@[^@\s]+$"),
            )
            .plain(PlainField::new("score", ScalarType::Float).required(false))
            .build()
            .unwrap()
    }

    fn bag(entries: &[(&str, Value)]) -> ColumnValues {
        entries
            .iter()
            .map(|(n, v)| ((*n).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn valid_values_normalize_in_declaration_order() {
        let values = bag(&[
            ("username", Value::from("alice")),
            ("id", Value::Int(1)),
        ]);
        let normalized = validate_fields(&user(), &values).unwrap();
        let names: Vec<&str> = normalized.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "username", "email", "score"]);
        assert_eq!(normalized.get("email"), Some(&Value::Null));
    }

    #[test]
    fn missing_required_field_reports_location_and_kind() {
        let err = validate_fields(&user(), &bag(&[("id", Value::Int(1))])).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "username");
        assert_eq!(err.errors[0].kind, ValidationErrorKind::Required);
    }

    #[test]
    fn explicit_null_for_required_field_fails() {
        let values = bag(&[("id", Value::Int(1)), ("username", Value::Null)]);
        let err = validate_fields(&user(), &values).unwrap_err();
        assert_eq!(err.errors[0].kind, ValidationErrorKind::Required);
    }

    #[test]
    fn integer_widens_to_float() {
        let values = bag(&[
            ("id", Value::Int(1)),
            ("username", Value::from("alice")),
            ("score", Value::Int(7)),
        ]);
        let normalized = validate_fields(&user(), &values).unwrap();
        assert_eq!(normalized.get("score"), Some(&Value::Float(7.0)));
    }

    #[test]
    fn type_mismatch_is_not_silently_coerced() {
        let values = bag(&[
            ("id", Value::from("one")),
            ("username", Value::from("alice")),
        ]);
        let err = validate_fields(&user(), &values).unwrap_err();
        assert_eq!(err.errors[0].field, "id");
        assert_eq!(err.errors[0].kind, ValidationErrorKind::Type);
    }

    #[test]
    fn text_constraints_enforced() {
        let values = bag(&[
            ("id", Value::Int(1)),
            ("username", Value::from("much_too_long_for_the_limit")),
            ("email", Value::from("not-an-email")),
        ]);
        let err = validate_fields(&user(), &values).unwrap_err();
        let kinds: Vec<ValidationErrorKind> = err.errors.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ValidationErrorKind::MaxLength));
        assert!(kinds.contains(&ValidationErrorKind::Pattern));
    }

    #[test]
    fn undeclared_keys_are_rejected() {
        let values = bag(&[
            ("id", Value::Int(1)),
            ("username", Value::from("alice")),
            ("author_id", Value::Int(9)),
        ]);
        let err = validate_fields(&user(), &values).unwrap_err();
        assert_eq!(err.errors[0].field, "author_id");
        assert_eq!(err.errors[0].kind, ValidationErrorKind::UnknownField);
    }

    #[test]
    fn json_object_conversion() {
        let json = serde_json::json!({
            "id": 1,
            "username": "alice",
            "score": 1.5,
            "email": null,
        });
        let values = values_from_json(&json).unwrap();
        assert_eq!(values.get("id"), Some(&Value::Int(1)));
        assert_eq!(values.get("score"), Some(&Value::Float(1.5)));
        assert_eq!(values.get("email"), Some(&Value::Null));
    }

    #[test]
    fn json_nested_structures_rejected() {
        let json = serde_json::json!({"tags": ["a", "b"]});
        let err = values_from_json(&json).unwrap_err();
        assert_eq!(err.errors[0].field, "tags");
    }

    #[test]
    fn pattern_cache_reuses_compiled_regex() {
        assert!(matches_pattern("abc", "^a"));
        assert!(matches_pattern("abc", "^a"));
        assert!(!matches_pattern("abc", "("));
    }
}
