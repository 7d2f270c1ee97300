//! Entity instances.
//!
//! An [`Instance`] is one row's worth of state for a registered entity type:
//! validated plain values, one lazy [`RelationCell`] per singular
//! relationship, and an owned vector per collection field. Construction
//! partitions the supplied values by descriptor kind, runs the validator
//! over the plain ones, and eagerly captures foreign keys from any related
//! instances that already have a primary key.

use std::fmt;
use std::sync::{Arc, Mutex};

use modelsmith_core::{
    ColumnValues, Error, FieldDescriptor, Result, RowHandle, ValidationError, ValidationErrorKind,
    Value, foreign_key_name, validate_fields, values_from_json,
};

use crate::registry::EntitySchema;
use crate::relation::RelationCell;

/// Anything that can contribute a primary key as a foreign-key value.
pub trait HasPrimaryKey {
    /// The primary-key value, [`Value::Null`] when not yet assigned.
    fn primary_key(&self) -> Value;
}

/// One supplied field value, tagged by the descriptor kind it targets.
#[derive(Debug, Clone)]
enum FieldValue {
    Scalar(Value),
    Related(Option<Arc<Instance>>),
    Many(Vec<Arc<Instance>>),
}

/// An ordered bag of field values for constructing an instance.
#[derive(Debug, Clone, Default)]
pub struct FieldValues {
    entries: Vec<(String, FieldValue)>,
}

impl FieldValues {
    /// An empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a scalar value for a plain field.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), FieldValue::Scalar(value.into())));
        self
    }

    /// Attach a related instance to a singular relationship field.
    #[must_use]
    pub fn related(mut self, name: impl Into<String>, related: &Arc<Instance>) -> Self {
        self.entries
            .push((name.into(), FieldValue::Related(Some(Arc::clone(related)))));
        self
    }

    /// Explicitly leave a singular relationship unattached.
    #[must_use]
    pub fn related_none(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), FieldValue::Related(None)));
        self
    }

    /// Supply the contents of a collection field.
    #[must_use]
    pub fn many(mut self, name: impl Into<String>, related: Vec<Arc<Instance>>) -> Self {
        self.entries.push((name.into(), FieldValue::Many(related)));
        self
    }
}

/// One instance of a registered entity type.
#[derive(Debug)]
pub struct Instance {
    schema: Arc<EntitySchema>,
    plain: ColumnValues,
    relations: Vec<(String, RelationCell)>,
    collections: Vec<(String, Vec<Arc<Instance>>)>,
    handle: Mutex<Option<RowHandle>>,
}

impl Instance {
    /// Construct and validate an instance from a bag of field values.
    ///
    /// Plain values are validated against the declared fields; every
    /// singular relationship gets its own cell (unattached ones start with
    /// a null foreign key); every collection field gets its own fresh
    /// vector, so two instances never share one. Failures from the
    /// validator list every violation at once.
    pub fn build(schema: Arc<EntitySchema>, values: FieldValues) -> Result<Self> {
        let mut errors = ValidationError::new();
        let mut plain = ColumnValues::new();
        let mut assigned: Vec<(String, Option<Arc<Instance>>)> = Vec::new();
        let mut many: Vec<(String, Vec<Arc<Instance>>)> = Vec::new();

        for (name, value) in values.entries {
            match (schema.entity().field(&name), value) {
                (Some(FieldDescriptor::Plain(_)) | None, FieldValue::Scalar(v)) => {
                    // Undeclared scalar keys flow through so the validator
                    // reports them as unknown fields.
                    plain.set(name, v);
                }
                (Some(FieldDescriptor::Relation(_)), FieldValue::Related(related)) => {
                    assigned.push((name, related));
                }
                (Some(FieldDescriptor::Collection(_)), FieldValue::Many(items)) => {
                    many.push((name, items));
                }
                (None, FieldValue::Related(_) | FieldValue::Many(_)) => {
                    errors.add_unknown_field(name);
                }
                (Some(FieldDescriptor::Plain(f)), _) => {
                    errors.add_type(&name, f.scalar, "a related instance");
                }
                (Some(FieldDescriptor::Relation(_)), FieldValue::Scalar(_)) => {
                    errors.add(
                        &name,
                        ValidationErrorKind::Type,
                        "relationship fields take a related instance, not a scalar",
                    );
                }
                (Some(FieldDescriptor::Relation(_)), FieldValue::Many(_)) => {
                    errors.add(
                        &name,
                        ValidationErrorKind::Type,
                        "singular relationship fields take at most one instance",
                    );
                }
                (Some(FieldDescriptor::Collection(_)), _) => {
                    errors.add(
                        &name,
                        ValidationErrorKind::Type,
                        "collection fields take a vector of instances",
                    );
                }
            }
        }
        errors.into_result().map_err(Error::Validation)?;

        let plain = validate_fields(schema.entity(), &plain)?;

        let relations: Vec<(String, RelationCell)> = schema
            .entity()
            .relation_fields()
            .map(|r| (r.name.clone(), RelationCell::unresolved(Value::Null)))
            .collect();
        for (name, related) in assigned {
            if let Some((_, cell)) = relations.iter().find(|(n, _)| *n == name) {
                cell.assign(related);
            }
        }

        let mut collections: Vec<(String, Vec<Arc<Instance>>)> = schema
            .entity()
            .collection_fields()
            .map(|c| (c.name.clone(), Vec::new()))
            .collect();
        for (name, items) in many {
            if let Some((_, slot)) = collections.iter_mut().find(|(n, _)| *n == name) {
                *slot = items;
            }
        }

        Ok(Self {
            schema,
            plain,
            relations,
            collections,
            handle: Mutex::new(None),
        })
    }

    /// Construct an instance from a JSON object of plain field values.
    pub fn build_json(schema: Arc<EntitySchema>, json: &serde_json::Value) -> Result<Self> {
        let bag = values_from_json(json)?;
        let mut values = FieldValues::new();
        for (name, value) in bag {
            values = values.value(name, value);
        }
        Self::build(schema, values)
    }

    /// Hydrate an instance from a stored row. No validation: the row was
    /// validated when written. Relationship cells carry the stored foreign
    /// keys, unresolved.
    pub(crate) fn from_row(schema: Arc<EntitySchema>, row: &ColumnValues) -> Self {
        let mut plain = ColumnValues::new();
        for field in schema.entity().plain_fields() {
            plain.set(
                field.name.clone(),
                row.get(&field.name).cloned().unwrap_or(Value::Null),
            );
        }
        let relations: Vec<(String, RelationCell)> = schema
            .entity()
            .relation_fields()
            .map(|r| {
                let fk = row
                    .get(&foreign_key_name(&r.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                (r.name.clone(), RelationCell::unresolved(fk))
            })
            .collect();
        let collections = schema
            .entity()
            .collection_fields()
            .map(|c| (c.name.clone(), Vec::new()))
            .collect();
        Self {
            schema,
            plain,
            relations,
            collections,
            handle: Mutex::new(None),
        }
    }

    /// The schema this instance was built against.
    #[must_use]
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// The entity type name.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        self.schema.entity().name()
    }

    /// Read a plain field value, or a synthesized foreign key by its
    /// `{relation}_id` name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        if let Some(value) = self.plain.get(field) {
            return Some(value.clone());
        }
        self.relations
            .iter()
            .find(|(name, _)| foreign_key_name(name) == field)
            .map(|(_, cell)| cell.fk())
    }

    /// Write a plain field value, revalidating the whole instance.
    ///
    /// The primary key is frozen once the instance has a backing row: the
    /// store addresses the row by it, so rewriting it would strand the row
    /// under its old key. Delete first, or build a fresh instance.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let field = field.into();
        if self.is_saved()
            && self
                .schema
                .entity()
                .primary_key_field()
                .is_some_and(|pk| pk.name == field)
        {
            let mut errors = ValidationError::new();
            errors.add(
                field,
                ValidationErrorKind::Immutable,
                "primary key cannot change while the instance is saved",
            );
            return Err(errors.into());
        }
        let mut candidate = self.plain.clone();
        candidate.set(field, value.into());
        self.plain = validate_fields(self.schema.entity(), &candidate)?;
        Ok(())
    }

    /// Attach, replace, or detach the related instance on a singular
    /// relationship field. The foreign key follows the related instance's
    /// primary key and is re-derived again at save time.
    pub fn set_related(&self, field: &str, related: Option<Arc<Instance>>) -> Result<()> {
        let cell = self.cell(field)?;
        cell.assign(related);
        Ok(())
    }

    /// The cached related instance for a singular relationship, if any.
    /// Never touches the store; use a session to resolve lazily.
    #[must_use]
    pub fn related_cached(&self, field: &str) -> Option<Arc<Instance>> {
        self.relations
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, cell)| cell.cached())
    }

    /// The current foreign-key value for a singular relationship field.
    #[must_use]
    pub fn foreign_key(&self, field: &str) -> Option<Value> {
        self.relations
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, cell)| cell.fk())
    }

    /// Read a collection field.
    #[must_use]
    pub fn collection(&self, field: &str) -> Option<&[Arc<Instance>]> {
        self.collections
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, items)| items.as_slice())
    }

    /// Mutable access to a collection field.
    pub fn collection_mut(&mut self, field: &str) -> Option<&mut Vec<Arc<Instance>>> {
        self.collections
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, items)| items)
    }

    /// Whether this instance is backed by a stored row.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.handle.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub(crate) fn cell(&self, field: &str) -> Result<&RelationCell> {
        self.relations
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, cell)| cell)
            .ok_or_else(|| {
                modelsmith_core::SchemaError::new(
                    modelsmith_core::SchemaErrorKind::UnknownField,
                    format!(
                        "'{}' is not a relationship field on {}",
                        field,
                        self.entity_name()
                    ),
                )
                .into()
            })
    }

    pub(crate) fn cells(&self) -> impl Iterator<Item = &(String, RelationCell)> {
        self.relations.iter()
    }

    pub(crate) fn plain_values(&self) -> &ColumnValues {
        &self.plain
    }

    pub(crate) fn handle(&self) -> Option<RowHandle> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_handle(&self, handle: Option<RowHandle>) {
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }
}

impl HasPrimaryKey for Instance {
    fn primary_key(&self) -> Value {
        let Some(pk) = self.schema.entity().primary_key_field() else {
            return Value::Null;
        };
        self.plain.get(&pk.name).cloned().unwrap_or(Value::Null)
    }
}

impl Instance {
    /// The primary-key value, [`Value::Null`] when not yet assigned.
    #[must_use]
    pub fn primary_key(&self) -> Value {
        HasPrimaryKey::primary_key(self)
    }
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            plain: self.plain.clone(),
            relations: self.relations.clone(),
            collections: self.collections.clone(),
            handle: Mutex::new(self.handle()),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity_name(), self.primary_key())
    }
}
