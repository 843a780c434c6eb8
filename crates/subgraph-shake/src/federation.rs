//! Expands a used-coordinate set over the federation directives of a
//! subgraph schema.
//!
//! Entity keys (`@key`) and field dependencies (`@requires`) reference
//! fields that never appear in any fetch operation but must survive pruning
//! for the subgraph to keep satisfying its federation contract.

use crate::collect;
use crate::errors::ShakeError;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::parser::Parser;
use apollo_compiler::schema::ExtendedType;
use std::collections::HashSet;

/// For every type named in `used`, collect the coordinates referenced by its
/// `@key` field sets and by the `@requires` field sets of its fields.
///
/// Runs a single pass: coordinates retained *because* of a key or requires
/// are not themselves re-expanded.
pub fn collect_from_federation_directives(
    schema: &Schema,
    used: &HashSet<String>,
) -> Result<HashSet<String>, ShakeError> {
    let mut collected = HashSet::new();
    for (type_name, extended_type) in &schema.types {
        if extended_type.is_built_in() || !used.contains(type_name.as_str()) {
            continue;
        }
        let (directives, fields) = match extended_type {
            ExtendedType::Object(object_def) => (&object_def.directives, &object_def.fields),
            ExtendedType::Interface(interface_def) => {
                (&interface_def.directives, &interface_def.fields)
            }
            _ => continue,
        };
        for directive in directives.0.iter().filter(|d| d.name == "key") {
            let field_set = field_set_argument(directive, type_name.as_str())?;
            collected.extend(collect_field_set(schema, type_name.as_str(), field_set)?);
        }
        for field in fields.values() {
            for directive in field.directives.iter().filter(|d| d.name == "requires") {
                let field_set = field_set_argument(directive, type_name.as_str())?;
                tracing::debug!(
                    type_name = type_name.as_str(),
                    field = field.name.as_str(),
                    field_set,
                    "expanding requires"
                );
                collected.extend(collect_field_set(schema, type_name.as_str(), field_set)?);
            }
        }
    }
    Ok(collected)
}

fn field_set_argument<'directive>(
    directive: &'directive Directive,
    type_name: &str,
) -> Result<&'directive str, ShakeError> {
    directive
        .arguments
        .iter()
        .find(|argument| argument.name == "fields")
        .and_then(|argument| argument.value.as_str())
        .ok_or_else(|| ShakeError::InvalidFieldSet {
            type_name: type_name.to_string(),
            message: "missing or non-string fields argument".to_string(),
        })
}

fn collect_field_set(
    schema: &Schema,
    type_name: &str,
    field_set: &str,
) -> Result<HashSet<String>, ShakeError> {
    let source = format!("fragment f on {type_name} {{ {field_set} }}");
    let document = Parser::new()
        .parse_ast(&source, "fieldset.graphql")
        .map_err(|e| ShakeError::InvalidFieldSet {
            type_name: type_name.to_string(),
            message: e.to_string(),
        })?;
    collect::collect_used_coordinates(&document, schema)
}
