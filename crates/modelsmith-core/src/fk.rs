//! Foreign-key synthesis.
//!
//! Every singular relationship field derives one scalar foreign-key column
//! named `{field}_id`. Collection fields derive nothing: their foreign key
//! lives on the "many" side's singular relationship.

use crate::descriptor::{FieldDescriptor, PlainField};
use crate::types::ScalarType;

/// The conventional foreign-key column name for a relationship field.
#[must_use]
pub fn foreign_key_name(field: &str) -> String {
    format!("{field}_id")
}

/// Synthesize foreign-key columns for a descriptor set.
///
/// Pure and deterministic: identical field descriptors always synthesize
/// identical foreign-key columns, in the declaration order of their source
/// relationship fields. Nullability follows the relationship's declared
/// optionality. The identifier type is `Integer`, matching the primary-key
/// convention.
#[must_use]
pub fn synthesize_foreign_keys(fields: &[FieldDescriptor]) -> Vec<PlainField> {
    fields
        .iter()
        .filter_map(|field| match field {
            FieldDescriptor::Relation(rel) => Some(
                PlainField::new(foreign_key_name(&rel.name), ScalarType::Integer)
                    .required(rel.required),
            ),
            FieldDescriptor::Plain(_) | FieldDescriptor::Collection(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CollectionField, RelationField};

    fn descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::Plain(PlainField::new("id", ScalarType::Integer).primary_key(true)),
            FieldDescriptor::Relation(RelationField::new("author", "Author").required(false)),
            FieldDescriptor::Collection(CollectionField::new("reviews", "Review")),
            FieldDescriptor::Relation(RelationField::new("publisher", "Publisher")),
        ]
    }

    #[test]
    fn singular_relations_synthesize_in_order() {
        let fks = synthesize_foreign_keys(&descriptors());
        let names: Vec<&str> = fks.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["author_id", "publisher_id"]);
    }

    #[test]
    fn nullability_follows_relation_optionality() {
        let fks = synthesize_foreign_keys(&descriptors());
        assert!(!fks[0].required, "optional relation -> nullable fk");
        assert!(fks[1].required, "required relation -> non-null fk");
    }

    #[test]
    fn collections_and_plain_fields_synthesize_nothing() {
        let only_skipped = vec![
            FieldDescriptor::Plain(PlainField::new("name", ScalarType::Text)),
            FieldDescriptor::Collection(CollectionField::new("books", "Book")),
        ];
        assert!(synthesize_foreign_keys(&only_skipped).is_empty());
    }

    #[test]
    fn synthesis_is_deterministic() {
        let fields = descriptors();
        assert_eq!(
            synthesize_foreign_keys(&fields),
            synthesize_foreign_keys(&fields)
        );
    }

    #[test]
    fn fk_type_is_integer() {
        let fks = synthesize_foreign_keys(&descriptors());
        assert!(fks.iter().all(|f| f.scalar == ScalarType::Integer));
        assert!(fks.iter().all(|f| !f.primary_key));
    }
}
