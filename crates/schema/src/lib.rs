//! Compiles the schema DSL (`dsl`) into a [`SchemaMap`] and drives it over a
//! document's event stream (`validate`) to produce a typed `Serialization`,
//! matching `SchemaList_parse` / `SchemaMap_parse` / `schema_get` /
//! `schema_parse` from spec.md §4.E.

pub mod dsl;
pub mod validate;

use std::collections::HashMap;

use ligature_errors::{Error, ErrorCode, Result};

use dsl::{parse_schema_list, Field, FieldType};

pub use validate::schema_parse;

/// A compiled set of named schemas, each a list of typed fields, with every
/// `(ref)` already checked to resolve somewhere in the set.
#[derive(Debug, Default)]
pub struct SchemaMap {
    schemas: HashMap<String, Vec<Field>>,
}

impl SchemaMap {
    /// Parse `src` (one or more `name = { ... }` definitions) into a
    /// `SchemaMap`, rejecting duplicate names and dangling `(ref)`s.
    pub fn parse(src: &str) -> Result<Self> {
        let list = parse_schema_list(src)?;
        let mut schemas = HashMap::with_capacity(list.len());
        for source in list {
            if schemas.insert(source.name.clone(), source.fields).is_some() {
                return Err(Error::new(
                    ErrorCode::DuplicateDefinition,
                    format!("schema '{}' defined more than once", source.name),
                ));
            }
        }
        for fields in schemas.values() {
            check_refs(fields, &schemas)?;
        }
        Ok(SchemaMap { schemas })
    }

    /// The field list for a compiled schema name, if it exists.
    pub fn fields(&self, name: &str) -> Option<&[Field]> {
        self.schemas.get(name).map(Vec::as_slice)
    }

    /// `schema_get`: look up a schema by name, failing with `UnknownSchema`.
    pub fn schema_get(&self, name: &str) -> Result<&[Field]> {
        self.fields(name)
            .ok_or_else(|| Error::new(ErrorCode::UnknownSchema, format!("no schema named '{name}'")))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn check_refs(fields: &[Field], schemas: &HashMap<String, Vec<Field>>) -> Result<()> {
    for field in fields {
        check_field_type(&field.ty, schemas)?;
    }
    Ok(())
}

fn check_field_type(ty: &FieldType, schemas: &HashMap<String, Vec<Field>>) -> Result<()> {
    match ty {
        FieldType::Integer | FieldType::Float | FieldType::String => Ok(()),
        FieldType::Struct(fields) => check_refs(fields, schemas),
        FieldType::Array(inner) => check_field_type(inner, schemas),
        FieldType::Ref(name) => {
            if schemas.contains_key(name) {
                Ok(())
            } else {
                Err(Error::new(ErrorCode::AddressedItemNotFound, format!("unknown schema '{name}'")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_reference_to_a_sibling_schema() {
        let src = "user_schema = { name = string }\nitem_schema = { owner = (user_schema) }";
        let map = SchemaMap::parse(src).unwrap();
        assert_eq!(map.len(), 2);
        assert!(matches!(map.fields("item_schema").unwrap()[0].ty, FieldType::Ref(ref n) if n == "user_schema"));
    }

    #[test]
    fn rejects_duplicate_schema_names() {
        let src = "a = { x = integer }\na = { y = string }";
        let err = SchemaMap::parse(src).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateDefinition);
    }

    #[test]
    fn schema_get_reports_unknown_names() {
        let map = SchemaMap::parse("a = { x = integer }").unwrap();
        let err = map.schema_get("b").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSchema);
    }
}
