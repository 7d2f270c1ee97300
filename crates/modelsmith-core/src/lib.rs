//! Core types and traits for modelsmith.
//!
//! This crate provides the foundational abstractions for declarative
//! entities backed by a row store:
//!
//! - [`EntityType`] and field descriptors for schema declaration
//! - [`synthesize_foreign_keys`] for relationship foreign-key inference
//! - [`validate_fields`] for plain-field validation
//! - [`Store`] for the persistence collaborator contract
//! - [`Value`] for dynamically-typed field state

pub mod descriptor;
pub mod error;
pub mod fk;
pub mod row;
pub mod store;
pub mod types;
pub mod validate;
pub mod value;

pub use descriptor::{
    CollectionField, EntityType, EntityTypeBuilder, FieldDescriptor, PlainField, RelationField,
};
pub use error::{
    BackendError, Error, FieldValidationError, RequiredRelationshipError, Result, SchemaError,
    SchemaErrorKind, UnsavedInstanceError, ValidationError, ValidationErrorKind,
};
pub use fk::{foreign_key_name, synthesize_foreign_keys};
pub use row::ColumnValues;
pub use store::{ColumnDescriptor, RowHandle, Store, StoreResult, TableDescriptor};
pub use types::ScalarType;
pub use validate::{matches_pattern, validate_fields, values_from_json};
pub use value::Value;
