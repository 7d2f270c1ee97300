//! The persistence session.
//!
//! A [`Session`] owns a store and drives every unit of work against it:
//! saving and deleting instances, fetching by primary key, and resolving
//! lazy relationships. Each successful operation commits; a store failure
//! triggers a rollback before the error surfaces, so the store never holds
//! half a unit of work.

use std::collections::HashSet;
use std::sync::Arc;

use modelsmith_core::{
    ColumnValues, Error, FieldDescriptor, RequiredRelationshipError, Result, RowHandle, Store,
    StoreResult, UnsavedInstanceError, Value, foreign_key_name,
};

use crate::instance::Instance;
use crate::registry::{EntitySchema, SchemaRegistry};

/// A unit-of-work session over a row store.
pub struct Session<S: Store> {
    store: S,
    registry: Arc<SchemaRegistry>,
    materialized: HashSet<String>,
}

impl<S: Store> Session<S> {
    /// Open a session over a store, resolving entity types through the
    /// given registry.
    pub fn new(store: S, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            store,
            registry,
            materialized: HashSet::new(),
        }
    }

    /// The registry this session resolves entity types through.
    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Direct access to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Persist an instance: insert on first save, update afterwards.
    ///
    /// Foreign keys are re-derived from attached related instances first,
    /// so a related instance saved after it was attached contributes its
    /// primary key. A required relationship with a null foreign key fails
    /// before the store is touched at all. Store failures roll back and
    /// leave the instance's saved/unsaved state unchanged.
    pub fn save(&mut self, instance: &Instance) -> Result<()> {
        for (_, cell) in instance.cells() {
            cell.rederive_fk();
        }

        let schema = Arc::clone(instance.schema());
        for relation in schema.entity().relation_fields() {
            if relation.required
                && instance
                    .foreign_key(&relation.name)
                    .is_none_or(|fk| fk.is_null())
            {
                return Err(RequiredRelationshipError {
                    field: relation.name.clone(),
                    target: relation.target.clone(),
                }
                .into());
            }
        }

        tracing::debug!(
            entity = instance.entity_name(),
            pk = %instance.primary_key(),
            update = instance.is_saved(),
            "save"
        );
        let prior = instance.handle();
        if let Err(e) = self.write_row(&schema, instance) {
            instance.set_handle(prior);
            self.roll_back();
            return Err(Error::Backend(e));
        }
        Ok(())
    }

    fn write_row(&mut self, schema: &EntitySchema, instance: &Instance) -> StoreResult<()> {
        self.materialize(schema)?;

        let mut row = ColumnValues::new();
        for (name, value) in instance.plain_values().iter() {
            row.set(name, value.clone());
        }
        for relation in schema.entity().relation_fields() {
            let fk = instance.foreign_key(&relation.name).unwrap_or(Value::Null);
            row.set(foreign_key_name(&relation.name), fk);
        }

        match instance.handle() {
            Some(handle) => self.store.update_row(&handle, row)?,
            None => {
                let handle = self.store.create_row(schema.table(), row)?;
                instance.set_handle(Some(handle));
            }
        }
        self.store.commit()
    }

    /// Delete an instance's backing row. Deleting an instance that was
    /// never saved is an error; the instance itself is untouched.
    pub fn delete(&mut self, instance: &Instance) -> Result<()> {
        let Some(handle) = instance.handle() else {
            return Err(UnsavedInstanceError {
                entity: instance.entity_name().to_string(),
            }
            .into());
        };

        tracing::debug!(
            entity = instance.entity_name(),
            pk = %handle.primary_key,
            "delete"
        );
        let outcome = self
            .store
            .delete_row(&handle)
            .and_then(|()| self.store.commit());
        if let Err(e) = outcome {
            self.roll_back();
            return Err(Error::Backend(e));
        }
        // The instance reverts to unsaved; a later save inserts a new row.
        instance.set_handle(None);
        Ok(())
    }

    /// Fetch one instance by primary key. `Ok(None)` when no row matches.
    pub fn find_by_id(
        &mut self,
        entity: &str,
        id: impl Into<Value>,
    ) -> Result<Option<Instance>> {
        let schema = self.registry.expect(entity)?;
        self.materialize(&schema).map_err(Error::Backend)?;

        let id = id.into();
        let Some(row) = self
            .store
            .get_row(schema.table(), &id)
            .map_err(Error::Backend)?
        else {
            return Ok(None);
        };
        Ok(Some(self.hydrate(&schema, &row)))
    }

    /// Fetch every stored instance of an entity type, in insertion order.
    pub fn find_all(&mut self, entity: &str) -> Result<Vec<Instance>> {
        let schema = self.registry.expect(entity)?;
        self.materialize(&schema).map_err(Error::Backend)?;

        let rows = self
            .store
            .query_all_rows(schema.table())
            .map_err(Error::Backend)?;
        Ok(rows.iter().map(|row| self.hydrate(&schema, row)).collect())
    }

    /// Resolve a singular relationship, loading through the store at most
    /// once per cell.
    ///
    /// A null foreign key resolves to `None` without touching the store.
    /// The resolved instance is cached on the cell, so repeated reads
    /// return the same `Arc`; a load failure leaves the cell retryable.
    pub fn related(&mut self, instance: &Instance, field: &str) -> Result<Option<Arc<Instance>>> {
        let cell = instance.cell(field)?;
        let Some(FieldDescriptor::Relation(relation)) = instance.schema().entity().field(field)
        else {
            // cell() already rejected non-relationship fields.
            return Ok(None);
        };
        let target = relation.target.clone();
        cell.resolve_with(|fk| {
            tracing::debug!(
                entity = instance.entity_name(),
                field = field,
                target = %target,
                fk = %fk,
                "resolving relationship"
            );
            self.find_by_id(&target, fk.clone())
        })
    }

    fn hydrate(&self, schema: &Arc<EntitySchema>, row: &ColumnValues) -> Instance {
        let instance = Instance::from_row(Arc::clone(schema), row);
        instance.set_handle(Some(RowHandle {
            table: schema.table().table.clone(),
            primary_key: instance.primary_key(),
        }));
        instance
    }

    fn materialize(&mut self, schema: &EntitySchema) -> StoreResult<()> {
        let table = schema.table();
        if self.materialized.contains(&table.table) {
            return Ok(());
        }
        self.store.ensure_table(table)?;
        self.materialized.insert(table.table.clone());
        Ok(())
    }

    fn roll_back(&mut self) {
        if let Err(e) = self.store.rollback() {
            tracing::warn!(error = %e, "rollback failed, store state is suspect");
        }
    }
}
