//! The schema registry.
//!
//! Entity descriptors, synthesized foreign keys, and the backing table
//! descriptor are computed once per entity type at registration and cached
//! here. The registry is the process-wide, write-once-then-read-many cache
//! the rest of the system reads from; population is serialized behind a
//! single writer lock so concurrent first-time registration cannot race.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use modelsmith_core::{
    ColumnDescriptor, EntityType, PlainField, Result, SchemaError, SchemaErrorKind,
    TableDescriptor, foreign_key_name, synthesize_foreign_keys,
};

/// The cached product of registering one entity type: its descriptors, the
/// synthesized foreign-key columns, and the derived table descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    entity: EntityType,
    foreign_keys: Vec<PlainField>,
    table: TableDescriptor,
}

impl EntitySchema {
    fn compute(entity: EntityType) -> std::result::Result<Self, SchemaError> {
        let Some(pk) = entity.primary_key_field() else {
            return Err(SchemaError::new(
                SchemaErrorKind::MissingPrimaryKey,
                format!(
                    "{}: an entity type needs a primary-key field ('id' by convention)",
                    entity.name()
                ),
            ));
        };
        let pk_name = pk.name.clone();

        let foreign_keys = synthesize_foreign_keys(entity.fields());

        let mut columns: Vec<ColumnDescriptor> = entity
            .plain_fields()
            .map(|f| {
                ColumnDescriptor::new(f.name.clone(), f.scalar)
                    .nullable(!f.required)
                    .primary_key(f.name == pk_name)
            })
            .collect();
        columns.extend(
            foreign_keys
                .iter()
                .map(|f| ColumnDescriptor::new(f.name.clone(), f.scalar).nullable(!f.required)),
        );

        let table = TableDescriptor {
            table: entity.table_name().to_string(),
            columns,
            primary_key: pk_name,
        };

        Ok(Self {
            entity,
            foreign_keys,
            table,
        })
    }

    /// The declared entity type.
    #[must_use]
    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    /// The synthesized foreign-key columns, in source relation order.
    #[must_use]
    pub fn foreign_keys(&self) -> &[PlainField] {
        &self.foreign_keys
    }

    /// The synthesized foreign key for a relationship field, if any.
    #[must_use]
    pub fn foreign_key_for(&self, relation: &str) -> Option<&PlainField> {
        let name = foreign_key_name(relation);
        self.foreign_keys.iter().find(|f| f.name == name)
    }

    /// The derived backing table descriptor.
    #[must_use]
    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }
}

/// Process-wide cache of registered entity schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<String, Arc<EntitySchema>>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, computing its schema once.
    ///
    /// Idempotent: re-registering an identical declaration returns the
    /// cached schema. A conflicting redefinition under the same name is a
    /// schema error. Relationship targets may be registered later; forward
    /// and self references are legal.
    pub fn register(&self, entity: EntityType) -> Result<Arc<EntitySchema>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(entity.name()) {
            if *existing.entity() == entity {
                return Ok(Arc::clone(existing));
            }
            return Err(SchemaError::new(
                SchemaErrorKind::Conflict,
                format!("entity type '{}' is already registered with a different shape", entity.name()),
            )
            .into());
        }

        tracing::debug!(entity = entity.name(), "registering entity type");
        let schema = Arc::new(EntitySchema::compute(entity)?);
        entries.insert(schema.entity().name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Look up a registered schema by entity name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<EntitySchema>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).cloned()
    }

    /// Look up a registered schema, failing with a schema error when absent.
    pub fn expect(&self, name: &str) -> Result<Arc<EntitySchema>> {
        self.lookup(name).ok_or_else(|| {
            SchemaError::new(
                SchemaErrorKind::UnknownEntity,
                format!("entity type '{name}' is not registered"),
            )
            .into()
        })
    }

    /// Check that every relationship target names a registered entity type.
    ///
    /// Registration itself tolerates forward references so declaration
    /// order stays free; call this once after the last registration to
    /// surface dangling target names eagerly instead of at first lazy
    /// resolution.
    pub fn verify_targets(&self) -> Result<()> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut dangling: Vec<String> = Vec::new();
        for schema in entries.values() {
            let entity = schema.entity();
            let targets = entity
                .relation_fields()
                .map(|r| (&r.name, &r.target))
                .chain(entity.collection_fields().map(|c| (&c.name, &c.target)));
            for (field, target) in targets {
                if !entries.contains_key(target) {
                    dangling.push(format!("{}.{field} -> '{target}'", entity.name()));
                }
            }
        }
        if dangling.is_empty() {
            return Ok(());
        }
        dangling.sort();
        Err(SchemaError::new(
            SchemaErrorKind::UnknownEntity,
            format!(
                "relationship targets name no registered entity type: {}",
                dangling.join(", ")
            ),
        )
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsmith_core::{RelationField, ScalarType};

    fn author() -> EntityType {
        EntityType::builder("Author")
            .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
            .plain(PlainField::new("name", ScalarType::Text))
            .build()
            .unwrap()
    }

    fn book() -> EntityType {
        EntityType::builder("Book")
            .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
            .plain(PlainField::new("title", ScalarType::Text))
            .relation(RelationField::new("author", "Author").required(false))
            .build()
            .unwrap()
    }

    #[test]
    fn register_is_idempotent() {
        let registry = SchemaRegistry::new();
        let first = registry.register(author()).unwrap();
        let second = registry.register(author()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn conflicting_redefinition_rejected() {
        let registry = SchemaRegistry::new();
        registry.register(author()).unwrap();

        let reshaped = EntityType::builder("Author")
            .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
            .build()
            .unwrap();
        assert!(registry.register(reshaped).is_err());
    }

    #[test]
    fn table_descriptor_includes_synthesized_foreign_keys() {
        let registry = SchemaRegistry::new();
        let schema = registry.register(book()).unwrap();

        assert_eq!(schema.table().table, "book");
        assert_eq!(schema.table().primary_key, "id");
        let names: Vec<&str> = schema
            .table()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["id", "title", "author_id"]);

        let fk = schema.table().column("author_id").unwrap();
        assert!(fk.nullable, "optional relation synthesizes nullable fk");
    }

    #[test]
    fn foreign_key_lookup_by_relation_name() {
        let registry = SchemaRegistry::new();
        let schema = registry.register(book()).unwrap();
        assert_eq!(schema.foreign_key_for("author").unwrap().name, "author_id");
        assert!(schema.foreign_key_for("title").is_none());
    }

    #[test]
    fn forward_references_are_legal() {
        // Book's target "Author" is not registered yet.
        let registry = SchemaRegistry::new();
        assert!(registry.register(book()).is_ok());
        assert!(registry.lookup("Author").is_none());
        assert!(registry.expect("Author").is_err());
    }

    #[test]
    fn verify_targets_surfaces_dangling_names() {
        let registry = SchemaRegistry::new();
        registry.register(book()).unwrap();

        let err = registry.verify_targets().unwrap_err();
        assert!(err.to_string().contains("Book.author -> 'Author'"));

        registry.register(author()).unwrap();
        registry.verify_targets().unwrap();
    }

    #[test]
    fn verify_targets_accepts_self_references() {
        let registry = SchemaRegistry::new();
        registry
            .register(
                EntityType::builder("Category")
                    .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
                    .relation(RelationField::new("parent", "Category").required(false))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry.verify_targets().unwrap();
    }

    #[test]
    fn missing_primary_key_rejected() {
        let registry = SchemaRegistry::new();
        let keyless = EntityType::builder("Note")
            .plain(PlainField::new("body", ScalarType::Text))
            .build()
            .unwrap();
        assert!(registry.register(keyless).is_err());
    }
}
