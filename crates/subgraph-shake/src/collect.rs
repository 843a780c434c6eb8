//! Collects the schema coordinates used by a set of GraphQL operations.
//!
//! Coordinates are strings of the form `Type`, `Type.field`,
//! `Type.field(arg:)`, and `InputType.inputField`. The walk is purely
//! syntactic: variable values are never inspected, so input object arguments
//! are marked conservatively (every declared field of the input type).

use crate::errors::ShakeError;
use apollo_compiler::Schema;
use apollo_compiler::ast::{Definition, Document, Field, FieldDefinition, Selection};
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::Node;
use std::collections::HashSet;

/// Walk every operation and fragment definition in `document` against
/// `schema` and return the set of schema coordinates they use.
pub fn collect_used_coordinates(
    document: &Document,
    schema: &Schema,
) -> Result<HashSet<String>, ShakeError> {
    let mut used = HashSet::new();
    for definition in &document.definitions {
        match definition {
            Definition::OperationDefinition(operation) => {
                let root = schema
                    .root_operation(operation.operation_type)
                    .ok_or(ShakeError::MissingRootOperation(operation.operation_type))?;
                collect_selection_set(&operation.selection_set, root.as_str(), schema, &mut used)?;
            }
            Definition::FragmentDefinition(fragment) => {
                used.insert(fragment.type_condition.to_string());
                collect_selection_set(
                    &fragment.selection_set,
                    fragment.type_condition.as_str(),
                    schema,
                    &mut used,
                )?;
            }
            _ => {}
        }
    }
    propagate_interface_fields(schema, &mut used);
    Ok(used)
}

fn collect_selection_set(
    selections: &[Selection],
    parent: &str,
    schema: &Schema,
    used: &mut HashSet<String>,
) -> Result<(), ShakeError> {
    for selection in selections {
        match selection {
            Selection::Field(field) => collect_field(field, parent, schema, used)?,
            Selection::InlineFragment(inline) => match &inline.type_condition {
                Some(condition) => {
                    used.insert(condition.to_string());
                    collect_selection_set(&inline.selection_set, condition.as_str(), schema, used)?;
                }
                None => {
                    collect_selection_set(&inline.selection_set, parent, schema, used)?;
                }
            },
            // Fragment definitions are walked at the document level, so the
            // spread itself contributes nothing.
            Selection::FragmentSpread(_) => {}
        }
    }
    Ok(())
}

fn collect_field(
    field: &Field,
    parent: &str,
    schema: &Schema,
    used: &mut HashSet<String>,
) -> Result<(), ShakeError> {
    if parent.starts_with("__") {
        return Ok(());
    }
    if field.name == "__typename" {
        used.insert(parent.to_string());
        used.insert("String".to_string());
        return Ok(());
    }
    // __schema / __type and anything else in the introspection namespace
    if field.name.starts_with("__") {
        return Ok(());
    }

    let field_def =
        field_definition(schema, parent, field.name.as_str()).ok_or_else(|| {
            ShakeError::UnknownField {
                type_name: parent.to_string(),
                field_name: field.name.to_string(),
            }
        })?;
    let return_type = field_def.ty.inner_named_type();
    if return_type.starts_with("__") {
        return Ok(());
    }

    used.insert(parent.to_string());
    used.insert(return_type.to_string());
    used.insert(format!("{parent}.{}", field.name));

    // A field selected on a concrete type may be declared by an interface the
    // type implements; plans produced against the composed graph can address
    // it either way, so retain the interface's declaration too.
    for interface in declaring_interfaces(schema, parent, field.name.as_str()) {
        used.insert(format!("{interface}.{}", field.name));
    }

    for argument in &field.arguments {
        let argument_def = field_def
            .arguments
            .iter()
            .find(|a| a.name == argument.name)
            .ok_or_else(|| ShakeError::UnknownArgument {
                type_name: parent.to_string(),
                field_name: field.name.to_string(),
                argument_name: argument.name.to_string(),
            })?;
        used.insert(format!("{parent}.{}({}:)", field.name, argument.name));
        let input_type = argument_def.ty.inner_named_type();
        used.insert(input_type.to_string());
        if let Some(ExtendedType::InputObject(input_def)) = schema.types.get(input_type.as_str()) {
            // Variable substructure is invisible here, so keep the whole
            // input object one level deep.
            for (field_name, input_field) in &input_def.fields {
                used.insert(format!("{input_type}.{field_name}"));
                used.insert(input_field.ty.inner_named_type().to_string());
            }
        }
    }

    collect_selection_set(&field.selection_set, return_type.as_str(), schema, used)
}

fn field_definition<'schema>(
    schema: &'schema Schema,
    type_name: &str,
    field_name: &str,
) -> Option<&'schema Node<FieldDefinition>> {
    match schema.types.get(type_name)? {
        ExtendedType::Object(object_def) => object_def.fields.get(field_name).map(|f| &f.node),
        ExtendedType::Interface(interface_def) => {
            interface_def.fields.get(field_name).map(|f| &f.node)
        }
        _ => None,
    }
}

fn declaring_interfaces(schema: &Schema, type_name: &str, field_name: &str) -> Vec<String> {
    let interfaces = match schema.types.get(type_name) {
        Some(ExtendedType::Object(object_def)) => &object_def.implements_interfaces,
        Some(ExtendedType::Interface(interface_def)) => &interface_def.implements_interfaces,
        _ => return Vec::new(),
    };
    interfaces
        .iter()
        .filter(|interface| {
            matches!(
                schema.types.get(interface.name.as_str()),
                Some(ExtendedType::Interface(interface_def))
                    if interface_def.fields.contains_key(field_name)
            )
        })
        .map(|interface| interface.name.to_string())
        .collect()
}

/// A field used through an interface is also used on every implementing
/// type. Runs to a fixpoint since interfaces implement interfaces. The
/// implementor's own type-name coordinate is deliberately not added: a type
/// never selected directly should still be prunable as a whole.
fn propagate_interface_fields(schema: &Schema, used: &mut HashSet<String>) {
    let mut changed = true;
    while changed {
        changed = false;
        for (type_name, extended_type) in &schema.types {
            let (interfaces, fields) = match extended_type {
                ExtendedType::Object(object_def) => {
                    (&object_def.implements_interfaces, &object_def.fields)
                }
                ExtendedType::Interface(interface_def) => {
                    (&interface_def.implements_interfaces, &interface_def.fields)
                }
                _ => continue,
            };
            for interface in interfaces {
                for field_name in fields.keys() {
                    if used.contains(&format!("{}.{field_name}", interface.name))
                        && used.insert(format!("{type_name}.{field_name}"))
                    {
                        changed = true;
                    }
                }
            }
        }
    }
}
