//! Expands a service's SDL into a standalone subgraph schema.
//!
//! Subgraph SDL is written against the federation spec: it applies `@key`
//! and friends without defining them, extends a query root it may never
//! declare, and relies on `_entities`/`_service` being provided by the
//! runtime. The coordinate collector needs all of that resolvable, so the
//! missing pieces are appended here before building the schema. The result
//! is deliberately not validated; it is a lookup table, not an executable
//! schema.

use crate::errors::ShakeError;
use apollo_compiler::Schema;
use apollo_compiler::ast::{Definition, Document, OperationType};
use apollo_compiler::parser::Parser;
use std::collections::HashSet;

const FEDERATION_PRELUDE: &str = r#"
directive @key(fields: FieldSet!, resolvable: Boolean = true) repeatable on OBJECT | INTERFACE
directive @requires(fields: FieldSet!) on FIELD_DEFINITION
directive @provides(fields: FieldSet!) on FIELD_DEFINITION
directive @external on OBJECT | FIELD_DEFINITION
directive @shareable repeatable on OBJECT | FIELD_DEFINITION
directive @override(from: String!) on FIELD_DEFINITION
directive @extends on OBJECT | INTERFACE
directive @tag(name: String!) repeatable on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION | SCHEMA
scalar FieldSet
scalar _Any
type _Service {
  sdl: String
}
"#;

/// Build a schema for a single service with the federation built-ins filled
/// in: directive definitions, the `FieldSet` and `_Any` scalars, `_Service`,
/// the `_Entity` union over every `@key` type, and the `_entities` and
/// `_service` fields on the query root. Definitions the service already
/// declares are never duplicated.
pub fn expand_service(document: &Document) -> Result<Schema, ShakeError> {
    let mut type_names = HashSet::new();
    let mut directive_names = HashSet::new();
    let mut extended_types: Vec<(&str, String)> = Vec::new();
    let mut entity_names: Vec<String> = Vec::new();
    let mut query_root: Option<String> = None;

    for definition in &document.definitions {
        match definition {
            Definition::SchemaDefinition(schema_def) => {
                for binding in &schema_def.root_operations {
                    if binding.0 == OperationType::Query {
                        query_root = Some(binding.1.to_string());
                    }
                }
            }
            Definition::SchemaExtension(schema_ext) => {
                for binding in &schema_ext.root_operations {
                    if binding.0 == OperationType::Query {
                        query_root = Some(binding.1.to_string());
                    }
                }
            }
            Definition::ObjectTypeDefinition(object_def) => {
                type_names.insert(object_def.name.to_string());
                if object_def.directives.iter().any(|d| d.name == "key") {
                    entity_names.push(object_def.name.to_string());
                }
            }
            Definition::ObjectTypeExtension(object_ext) => {
                extended_types.push(("type", object_ext.name.to_string()));
                if object_ext.directives.iter().any(|d| d.name == "key") {
                    entity_names.push(object_ext.name.to_string());
                }
            }
            Definition::InterfaceTypeDefinition(interface_def) => {
                type_names.insert(interface_def.name.to_string());
            }
            Definition::InterfaceTypeExtension(interface_ext) => {
                extended_types.push(("interface", interface_ext.name.to_string()));
            }
            Definition::UnionTypeDefinition(union_def) => {
                type_names.insert(union_def.name.to_string());
            }
            Definition::UnionTypeExtension(union_ext) => {
                extended_types.push(("union", union_ext.name.to_string()));
            }
            Definition::ScalarTypeDefinition(scalar_def) => {
                type_names.insert(scalar_def.name.to_string());
            }
            Definition::ScalarTypeExtension(scalar_ext) => {
                extended_types.push(("scalar", scalar_ext.name.to_string()));
            }
            Definition::EnumTypeDefinition(enum_def) => {
                type_names.insert(enum_def.name.to_string());
            }
            Definition::EnumTypeExtension(enum_ext) => {
                extended_types.push(("enum", enum_ext.name.to_string()));
            }
            Definition::InputObjectTypeDefinition(input_def) => {
                type_names.insert(input_def.name.to_string());
            }
            Definition::InputObjectTypeExtension(input_ext) => {
                extended_types.push(("input", input_ext.name.to_string()));
            }
            Definition::DirectiveDefinition(directive_def) => {
                directive_names.insert(directive_def.name.to_string());
            }
            Definition::OperationDefinition(_) | Definition::FragmentDefinition(_) => {}
        }
    }

    entity_names.sort();
    entity_names.dedup();

    let prelude = Parser::new()
        .parse_ast(FEDERATION_PRELUDE, "federation.graphql")
        .map_err(|e| ShakeError::GraphQLDocument(Box::new(e)))?;

    let mut expanded = Document::new();
    expanded.definitions = document.definitions.clone();
    for definition in prelude.definitions {
        let already_defined = match &definition {
            Definition::DirectiveDefinition(directive_def) => {
                directive_names.contains(directive_def.name.as_str())
            }
            Definition::ScalarTypeDefinition(scalar_def) => {
                type_names.contains(scalar_def.name.as_str())
            }
            Definition::ObjectTypeDefinition(object_def) => {
                type_names.contains(object_def.name.as_str())
            }
            _ => false,
        };
        if !already_defined {
            expanded.definitions.push(definition);
        }
    }

    let query_root = query_root.unwrap_or_else(|| "Query".to_string());
    let root_fields = declared_field_names(document, &query_root);
    let mut synthesized = String::new();

    // Bases for fed1-style extensions of types the service never declares,
    // the query root included.
    for (keyword, name) in &extended_types {
        if !type_names.contains(name) {
            synthesized.push_str(&format!("{keyword} {name}\n"));
            type_names.insert(name.clone());
        }
    }
    if !type_names.contains(&query_root) {
        synthesized.push_str(&format!("type {query_root}\n"));
    }

    let mut added_root_fields = String::new();
    if !entity_names.is_empty() && !type_names.contains("_Entity") {
        synthesized.push_str(&format!("union _Entity = {}\n", entity_names.join(" | ")));
        if !root_fields.contains("_entities") {
            added_root_fields.push_str("_entities(representations: [_Any!]!): [_Entity]! ");
        }
    }
    if !root_fields.contains("_service") {
        added_root_fields.push_str("_service: _Service! ");
    }
    if !added_root_fields.is_empty() {
        synthesized.push_str(&format!(
            "extend type {query_root} {{ {added_root_fields}}}\n",
        ));
    }

    let synthesized = Parser::new()
        .parse_ast(&synthesized, "federation.graphql")
        .map_err(|e| ShakeError::GraphQLDocument(Box::new(e)))?;
    expanded.definitions.extend(synthesized.definitions);

    expanded
        .to_schema()
        .map_err(|e| ShakeError::GraphQLSchema(Box::new(e)))
}

fn declared_field_names(document: &Document, type_name: &str) -> HashSet<String> {
    let mut fields = HashSet::new();
    for definition in &document.definitions {
        match definition {
            Definition::ObjectTypeDefinition(object_def) if object_def.name == type_name => {
                fields.extend(object_def.fields.iter().map(|f| f.name.to_string()));
            }
            Definition::ObjectTypeExtension(object_ext) if object_ext.name == type_name => {
                fields.extend(object_ext.fields.iter().map(|f| f.name.to_string()));
            }
            _ => {}
        }
    }
    fields
}
