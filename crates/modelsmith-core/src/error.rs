//! Error types for modelsmith operations.

use std::fmt;

/// The primary error type for all modelsmith operations.
#[derive(Debug)]
pub enum Error {
    /// A plain field value failed the validator's type/required checks.
    /// Always raised during construction, never deferred to save time.
    Validation(ValidationError),
    /// A required singular relationship has a null foreign key at save time.
    /// Raised before any store mutation.
    RequiredRelationship(RequiredRelationshipError),
    /// Delete attempted on an instance with no backing row.
    UnsavedInstance(UnsavedInstanceError),
    /// A failure surfaced by the row store. The session always attempts a
    /// rollback before surfacing this.
    Backend(BackendError),
    /// Schema definition or registry errors, reported at describe time.
    Schema(SchemaError),
}

/// Validation failure for one or more fields.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The individual field failures, in field declaration order.
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a field.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    /// Location path of the failing value (the field name).
    pub field: String,
    /// The kind of validation that failed.
    pub kind: ValidationErrorKind,
    /// Human-readable error message.
    pub message: String,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field is missing or null
    Required,
    /// Value has the wrong type and could not be coerced
    Type,
    /// String is longer than the declared maximum length
    MaxLength,
    /// Value doesn't match the declared regex pattern
    Pattern,
    /// Field name is not declared on the entity type
    UnknownField,
    /// Field cannot be rewritten in the instance's current state
    Immutable,
}

impl ValidationError {
    /// Create a new empty validation error container.
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a required field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Required, "is required");
    }

    /// Add a type mismatch error.
    pub fn add_type(
        &mut self,
        field: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) {
        self.add(
            field,
            ValidationErrorKind::Type,
            format!("expected {expected}, got {actual}"),
        );
    }

    /// Add a max length error.
    pub fn add_max_length(&mut self, field: impl Into<String>, max: usize, actual: usize) {
        self.add(
            field,
            ValidationErrorKind::MaxLength,
            format!("must be at most {max} characters, got {actual}"),
        );
    }

    /// Add a pattern match error.
    pub fn add_pattern(&mut self, field: impl Into<String>, pattern: &str) {
        self.add(
            field,
            ValidationErrorKind::Pattern,
            format!("must match pattern '{pattern}'"),
        );
    }

    /// Add an unknown field error.
    pub fn add_unknown_field(&mut self, field: impl Into<String>) {
        self.add(
            field,
            ValidationErrorKind::UnknownField,
            "is not a declared field",
        );
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

/// A required singular relationship was null at save time.
#[derive(Debug, Clone)]
pub struct RequiredRelationshipError {
    /// Name of the relationship field.
    pub field: String,
    /// Name of the target entity type.
    pub target: String,
}

/// Delete was attempted on an instance that was never saved.
#[derive(Debug, Clone)]
pub struct UnsavedInstanceError {
    /// Name of the entity type.
    pub entity: String,
}

/// A failure surfaced by the row store.
#[derive(Debug)]
pub struct BackendError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create a backend error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Schema definition or registry errors.
#[derive(Debug, Clone)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Two fields share a name, or a synthesized foreign key collides
    /// with a declared field.
    DuplicateField,
    /// A relationship declares an empty or invalid target.
    InvalidTarget,
    /// An entity name is not present in the registry.
    UnknownEntity,
    /// An entity was re-registered with a conflicting definition.
    Conflict,
    /// An entity type has no primary-key field.
    MissingPrimaryKey,
    /// A field name is not declared on the entity type.
    UnknownField,
}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "Validation error: {e}"),
            Error::RequiredRelationship(e) => write!(f, "{e}"),
            Error::UnsavedInstance(e) => write!(f, "{e}"),
            Error::Backend(e) => write!(f, "Backend error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Backend(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl fmt::Display for RequiredRelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Required relationship '{}' cannot be None - provide a {} instance",
            self.field, self.target
        )
    }
}

impl std::error::Error for RequiredRelationshipError {}

impl fmt::Display for UnsavedInstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot delete unsaved {} instance. Use save() before delete().",
            self.entity
        )
    }
}

impl std::error::Error for UnsavedInstanceError {}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SchemaError {}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<RequiredRelationshipError> for Error {
    fn from(err: RequiredRelationshipError) -> Self {
        Error::RequiredRelationship(err)
    }
}

impl From<UnsavedInstanceError> for Error {
    fn from(err: UnsavedInstanceError) -> Self {
        Error::UnsavedInstance(err)
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::Backend(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

/// Result type alias for modelsmith operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_relationship_message_names_field_and_target() {
        let err = RequiredRelationshipError {
            field: "product".to_string(),
            target: "Product".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("product"));
        assert!(msg.contains("Product"));
        assert!(msg.contains("cannot be None"));
    }

    #[test]
    fn validation_error_display_single_and_multi() {
        let mut err = ValidationError::new();
        err.add_required("name");
        assert!(err.to_string().contains("'name'"));

        err.add_type("age", "INTEGER", "TEXT");
        let multi = err.to_string();
        assert!(multi.contains("name"));
        assert!(multi.contains("age"));
    }

    #[test]
    fn backend_error_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::Backend(BackendError::with_source("row write failed", io));
        let source = std::error::Error::source(&err).expect("source attached");
        assert!(source.to_string().contains("disk gone"));
    }

    #[test]
    fn into_result_round_trip() {
        assert!(ValidationError::new().into_result().is_ok());
        let mut err = ValidationError::new();
        err.add_required("x");
        assert!(err.into_result().is_err());
    }
}
