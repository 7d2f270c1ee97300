//! Declarative entities with validation, foreign-key inference, and lazy
//! relationship loading.
//!
//! Declare entity types once as ordered field descriptors, register them,
//! and work with validated [`Instance`]s through a [`Session`] over any
//! [`Store`] backend:
//!
//! - singular relationship fields synthesize a `{field}_id` foreign-key
//!   column automatically, nullable exactly when the relationship is
//!   optional;
//! - plain values are validated at construction, never at save time;
//! - relationships resolve lazily on first read and cache the resolved
//!   instance, so repeated reads return the same `Arc` without touching
//!   the store;
//! - every save and delete is a unit of work: commit on success, rollback
//!   before any error surfaces.
//!
//! ```
//! use std::sync::Arc;
//! use modelsmith::{
//!     EntityType, FieldValues, Instance, PlainField, RelationField, ScalarType,
//!     SchemaRegistry, Session,
//! };
//! use modelsmith_memory::MemoryStore;
//!
//! # fn main() -> modelsmith::Result<()> {
//! let registry = Arc::new(SchemaRegistry::new());
//! registry.register(
//!     EntityType::builder("Author")
//!         .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
//!         .plain(PlainField::new("name", ScalarType::Text))
//!         .build()?,
//! )?;
//! registry.register(
//!     EntityType::builder("Book")
//!         .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
//!         .plain(PlainField::new("title", ScalarType::Text))
//!         .relation(RelationField::new("author", "Author").required(false))
//!         .build()?,
//! )?;
//!
//! let mut session = Session::new(MemoryStore::new(), Arc::clone(&registry));
//! let author = Arc::new(Instance::build(
//!     registry.expect("Author")?,
//!     FieldValues::new().value("id", 1).value("name", "Ursula"),
//! )?);
//! let book = Instance::build(
//!     registry.expect("Book")?,
//!     FieldValues::new()
//!         .value("id", 10)
//!         .value("title", "A Wizard of Earthsea")
//!         .related("author", &author),
//! )?;
//! session.save(&author)?;
//! session.save(&book)?;
//!
//! let fetched = session.find_by_id("Book", 10)?.unwrap();
//! let related = session.related(&fetched, "author")?.unwrap();
//! assert_eq!(related.get("name"), Some(modelsmith::Value::from("Ursula")));
//! # Ok(())
//! # }
//! ```

pub mod instance;
pub mod registry;
pub mod relation;
pub mod session;

pub use instance::{FieldValues, HasPrimaryKey, Instance};
pub use registry::{EntitySchema, SchemaRegistry};
pub use relation::RelationCell;
pub use session::Session;

pub use modelsmith_core::{
    BackendError, CollectionField, ColumnDescriptor, ColumnValues, EntityType, Error,
    FieldDescriptor, FieldValidationError, PlainField, RelationField, RequiredRelationshipError,
    Result, RowHandle, ScalarType, SchemaError, SchemaErrorKind, Store, StoreResult,
    TableDescriptor, UnsavedInstanceError, ValidationError, ValidationErrorKind, Value,
    foreign_key_name, synthesize_foreign_keys,
};
