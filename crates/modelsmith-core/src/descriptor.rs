//! Entity type descriptors.
//!
//! An entity type is declared once, at registration time, as an ordered set
//! of field descriptors: plain scalar fields, singular relationship fields
//! (which synthesize a foreign key), and collection relationship fields
//! (which do not). This replaces runtime reflection with explicit schema
//! description structures that higher layers (validator, session, lazy
//! loader) consume without re-deriving anything.

use crate::error::{SchemaError, SchemaErrorKind};
use crate::fk::foreign_key_name;
use crate::types::ScalarType;

/// A plain scalar field: name, type, required-ness, constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainField {
    /// Field name (also the column name).
    pub name: String,
    /// Declared scalar type.
    pub scalar: ScalarType,
    /// Whether a non-null value must be present.
    pub required: bool,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Maximum length for text fields.
    pub max_length: Option<usize>,
    /// Regex pattern text fields must match.
    pub pattern: Option<String>,
}

impl PlainField {
    /// Create a required plain field.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            required: true,
            primary_key: false,
            max_length: None,
            pattern: None,
        }
    }

    /// Set the required flag.
    #[must_use]
    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    /// Set the primary key flag.
    #[must_use]
    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set a maximum length constraint (text fields).
    #[must_use]
    pub fn max_length(mut self, value: usize) -> Self {
        self.max_length = Some(value);
        self
    }

    /// Set a regex pattern constraint (text fields).
    #[must_use]
    pub fn pattern(mut self, value: impl Into<String>) -> Self {
        self.pattern = Some(value.into());
        self
    }
}

/// A singular relationship field referencing at most one instance of the
/// target entity type. Synthesizes a `{name}_id` foreign key column.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationField {
    /// Field name.
    pub name: String,
    /// Target entity type name.
    pub target: String,
    /// Whether the relationship must be attached at save time.
    pub required: bool,
    /// Name of the reverse relationship field on the target type.
    pub back_populates: Option<String>,
    /// Declared cascade policy string. Recorded as relationship metadata for
    /// store backends that honor one; the in-memory backend does not.
    pub cascade: Option<String>,
}

impl RelationField {
    /// Create a required singular relationship.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            required: true,
            back_populates: None,
            cascade: None,
        }
    }

    /// Set the required flag. An optional relationship synthesizes a
    /// nullable foreign key.
    #[must_use]
    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    /// Set the back-populates field name on the target type.
    #[must_use]
    pub fn back_populates(mut self, field: impl Into<String>) -> Self {
        self.back_populates = Some(field.into());
        self
    }

    /// Record the declared cascade policy string.
    #[must_use]
    pub fn cascade(mut self, opts: impl Into<String>) -> Self {
        self.cascade = Some(opts.into());
        self
    }
}

/// A collection relationship field referencing many instances of the target
/// type. The foreign key lives on the "many" side; none is synthesized here.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionField {
    /// Field name.
    pub name: String,
    /// Target entity type name.
    pub target: String,
    /// Name of the singular relationship on the target type pointing back.
    pub back_populates: Option<String>,
}

impl CollectionField {
    /// Create a collection relationship.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            back_populates: None,
        }
    }

    /// Set the back-populates field name on the target type.
    #[must_use]
    pub fn back_populates(mut self, field: impl Into<String>) -> Self {
        self.back_populates = Some(field.into());
        self
    }
}

/// One declared field of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDescriptor {
    /// Plain scalar field.
    Plain(PlainField),
    /// Singular relationship field.
    Relation(RelationField),
    /// Collection relationship field.
    Collection(CollectionField),
}

impl FieldDescriptor {
    /// The declared field name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            FieldDescriptor::Plain(f) => &f.name,
            FieldDescriptor::Relation(f) => &f.name,
            FieldDescriptor::Collection(f) => &f.name,
        }
    }
}

/// A named, ordered collection of field descriptors.
///
/// Field order is declaration order and is stable: the validator reports
/// errors in it, the required-relationship check walks it, and the table
/// descriptor lists columns in it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    name: String,
    table_name: String,
    fields: Vec<FieldDescriptor>,
}

impl EntityType {
    /// Start declaring an entity type.
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        let name = name.into();
        EntityTypeBuilder {
            table_name: name.to_lowercase(),
            name,
            fields: Vec::new(),
        }
    }

    /// The entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing table name (lowercase entity name unless overridden).
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All field descriptors in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field descriptor by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Plain fields in declaration order.
    pub fn plain_fields(&self) -> impl Iterator<Item = &PlainField> {
        self.fields.iter().filter_map(|f| match f {
            FieldDescriptor::Plain(p) => Some(p),
            _ => None,
        })
    }

    /// Singular relationship fields in declaration order.
    pub fn relation_fields(&self) -> impl Iterator<Item = &RelationField> {
        self.fields.iter().filter_map(|f| match f {
            FieldDescriptor::Relation(r) => Some(r),
            _ => None,
        })
    }

    /// Collection relationship fields in declaration order.
    pub fn collection_fields(&self) -> impl Iterator<Item = &CollectionField> {
        self.fields.iter().filter_map(|f| match f {
            FieldDescriptor::Collection(c) => Some(c),
            _ => None,
        })
    }

    /// The primary key field: the one marked `primary_key`, or the plain
    /// field named `id` by convention.
    #[must_use]
    pub fn primary_key_field(&self) -> Option<&PlainField> {
        self.plain_fields()
            .find(|f| f.primary_key)
            .or_else(|| self.plain_fields().find(|f| f.name == "id"))
    }
}

/// Builder for [`EntityType`].
///
/// `build()` performs the describe-time structural checks: duplicate field
/// names, relationship names whose synthesized `{name}_id` collides with a
/// declared field, and empty names or targets.
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: String,
    table_name: String,
    fields: Vec<FieldDescriptor>,
}

impl EntityTypeBuilder {
    /// Override the backing table name.
    #[must_use]
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Declare a plain scalar field.
    #[must_use]
    pub fn plain(mut self, field: PlainField) -> Self {
        self.fields.push(FieldDescriptor::Plain(field));
        self
    }

    /// Declare a singular relationship field.
    #[must_use]
    pub fn relation(mut self, field: RelationField) -> Self {
        self.fields.push(FieldDescriptor::Relation(field));
        self
    }

    /// Declare a collection relationship field.
    #[must_use]
    pub fn collection(mut self, field: CollectionField) -> Self {
        self.fields.push(FieldDescriptor::Collection(field));
        self
    }

    /// Finish the declaration, running describe-time checks.
    pub fn build(self) -> Result<EntityType, SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::new(
                SchemaErrorKind::InvalidTarget,
                "entity type name must not be empty",
            ));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let name = field.name();
            if name.is_empty() {
                return Err(SchemaError::new(
                    SchemaErrorKind::DuplicateField,
                    format!("{}: field names must not be empty", self.name),
                ));
            }
            if seen.contains(&name) {
                return Err(SchemaError::new(
                    SchemaErrorKind::DuplicateField,
                    format!("{}: duplicate field '{}'", self.name, name),
                ));
            }
            seen.push(name);

            match field {
                FieldDescriptor::Relation(r) if r.target.is_empty() => {
                    return Err(SchemaError::new(
                        SchemaErrorKind::InvalidTarget,
                        format!("{}.{}: relationship target must not be empty", self.name, r.name),
                    ));
                }
                FieldDescriptor::Collection(c) if c.target.is_empty() => {
                    return Err(SchemaError::new(
                        SchemaErrorKind::InvalidTarget,
                        format!("{}.{}: relationship target must not be empty", self.name, c.name),
                    ));
                }
                _ => {}
            }
        }

        // Synthesized foreign keys must not collide with declared fields.
        for field in &self.fields {
            if let FieldDescriptor::Relation(r) = field {
                let fk = foreign_key_name(&r.name);
                if seen.contains(&fk.as_str()) {
                    return Err(SchemaError::new(
                        SchemaErrorKind::DuplicateField,
                        format!(
                            "{}: synthesized foreign key '{}' collides with a declared field",
                            self.name, fk
                        ),
                    ));
                }
            }
        }

        Ok(EntityType {
            name: self.name,
            table_name: self.table_name,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> EntityType {
        EntityType::builder("Book")
            .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
            .plain(PlainField::new("title", ScalarType::Text))
            .relation(
                RelationField::new("author", "Author")
                    .required(false)
                    .back_populates("books"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn declaration_order_preserved() {
        let book = book();
        let names: Vec<&str> = book.fields().iter().map(FieldDescriptor::name).collect();
        assert_eq!(names, ["id", "title", "author"]);
    }

    #[test]
    fn table_name_defaults_to_lowercase() {
        assert_eq!(book().table_name(), "book");
        let custom = EntityType::builder("Author")
            .table_name("writers")
            .plain(PlainField::new("id", ScalarType::Integer))
            .build()
            .unwrap();
        assert_eq!(custom.table_name(), "writers");
    }

    #[test]
    fn primary_key_by_flag_and_by_convention() {
        assert_eq!(book().primary_key_field().unwrap().name, "id");

        let by_convention = EntityType::builder("Tag")
            .plain(PlainField::new("id", ScalarType::Integer))
            .plain(PlainField::new("label", ScalarType::Text))
            .build()
            .unwrap();
        assert_eq!(by_convention.primary_key_field().unwrap().name, "id");

        let explicit = EntityType::builder("Code")
            .plain(PlainField::new("code", ScalarType::Integer).primary_key(true))
            .build()
            .unwrap();
        assert_eq!(explicit.primary_key_field().unwrap().name, "code");
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = EntityType::builder("Bad")
            .plain(PlainField::new("name", ScalarType::Text))
            .plain(PlainField::new("name", ScalarType::Text))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::DuplicateField);
    }

    #[test]
    fn foreign_key_collision_rejected() {
        let err = EntityType::builder("Bad")
            .plain(PlainField::new("author_id", ScalarType::Integer))
            .relation(RelationField::new("author", "Author"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::DuplicateField);
        assert!(err.message.contains("author_id"));
    }

    #[test]
    fn empty_target_rejected() {
        let err = EntityType::builder("Bad")
            .relation(RelationField::new("author", ""))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::InvalidTarget);
    }

    #[test]
    fn zero_plain_fields_is_not_a_describe_time_error() {
        let only_relations = EntityType::builder("Edge")
            .relation(RelationField::new("from_node", "Node"))
            .build();
        assert!(only_relations.is_ok());
    }

    #[test]
    fn identical_declarations_compare_equal() {
        assert_eq!(book(), book());
    }
}
