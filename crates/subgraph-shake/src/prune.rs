//! Rewrites a subgraph document down to the schema elements named by a set
//! of used coordinates.

use apollo_compiler::{Name, Node};
use apollo_compiler::ast::{
    Definition, Document, EnumTypeDefinition, EnumTypeExtension, FieldDefinition,
    InputObjectTypeDefinition, InputObjectTypeExtension, InputValueDefinition,
    InterfaceTypeDefinition, InterfaceTypeExtension, ObjectTypeDefinition,
    ObjectTypeExtension, ScalarTypeDefinition, ScalarTypeExtension, SchemaDefinition,
    SchemaExtension, UnionTypeDefinition, UnionTypeExtension,
};
use std::collections::HashSet;

/// Produce a copy of `document` with every definition, field, argument,
/// union member, and implemented interface not named in `used` removed.
///
/// A second pass repairs the schema blocks: operation-type bindings whose
/// root type did not survive are dropped, a binding-less block without
/// directives is removed, and a binding-less schema definition that still
/// carries directives is demoted to a schema extension.
pub fn remove_unused_elements(used: &HashSet<String>, document: &Document) -> Document {
    let definitions: Vec<Definition> = document
        .definitions
        .iter()
        .filter_map(|definition| prune_definition(definition, used))
        .collect();

    let surviving_objects: HashSet<String> = definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::ObjectTypeDefinition(object_def) => Some(object_def.name.to_string()),
            Definition::ObjectTypeExtension(object_ext) => Some(object_ext.name.to_string()),
            _ => None,
        })
        .collect();

    let mut pruned = Document::new();
    pruned.definitions = definitions
        .into_iter()
        .filter_map(|definition| repair_schema_block(definition, &surviving_objects))
        .collect();
    pruned
}

fn prune_definition(definition: &Definition, used: &HashSet<String>) -> Option<Definition> {
    match definition {
        Definition::ObjectTypeDefinition(object_def) => {
            if !used.contains(object_def.name.as_str()) {
                return None;
            }
            let fields = filter_fields(&object_def.name, &object_def.fields, used);
            if fields.is_empty() {
                return None;
            }
            Some(Definition::ObjectTypeDefinition(Node::new(
                ObjectTypeDefinition {
                    description: object_def.description.clone(),
                    name: object_def.name.clone(),
                    implements_interfaces: filter_interfaces(
                        &object_def.implements_interfaces,
                        used,
                    ),
                    directives: object_def.directives.clone(),
                    fields,
                },
            )))
        }
        Definition::ObjectTypeExtension(object_ext) => {
            if !used.contains(object_ext.name.as_str()) {
                return None;
            }
            let fields = filter_fields(&object_ext.name, &object_ext.fields, used);
            if fields.is_empty() {
                return None;
            }
            Some(Definition::ObjectTypeExtension(Node::new(
                ObjectTypeExtension {
                    name: object_ext.name.clone(),
                    implements_interfaces: filter_interfaces(
                        &object_ext.implements_interfaces,
                        used,
                    ),
                    directives: object_ext.directives.clone(),
                    fields,
                },
            )))
        }
        Definition::InterfaceTypeDefinition(interface_def) => {
            if !used.contains(interface_def.name.as_str()) {
                return None;
            }
            let fields = filter_fields(&interface_def.name, &interface_def.fields, used);
            if fields.is_empty() {
                return None;
            }
            Some(Definition::InterfaceTypeDefinition(Node::new(
                InterfaceTypeDefinition {
                    description: interface_def.description.clone(),
                    name: interface_def.name.clone(),
                    implements_interfaces: filter_interfaces(
                        &interface_def.implements_interfaces,
                        used,
                    ),
                    directives: interface_def.directives.clone(),
                    fields,
                },
            )))
        }
        Definition::InterfaceTypeExtension(interface_ext) => {
            if !used.contains(interface_ext.name.as_str()) {
                return None;
            }
            let fields = filter_fields(&interface_ext.name, &interface_ext.fields, used);
            if fields.is_empty() {
                return None;
            }
            Some(Definition::InterfaceTypeExtension(Node::new(
                InterfaceTypeExtension {
                    name: interface_ext.name.clone(),
                    implements_interfaces: filter_interfaces(
                        &interface_ext.implements_interfaces,
                        used,
                    ),
                    directives: interface_ext.directives.clone(),
                    fields,
                },
            )))
        }
        Definition::UnionTypeDefinition(union_def) => {
            if !used.contains(union_def.name.as_str()) {
                return None;
            }
            let members: Vec<_> = union_def
                .members
                .iter()
                .filter(|member| used.contains(member.as_str()))
                .cloned()
                .collect();
            if members.is_empty() {
                return None;
            }
            Some(Definition::UnionTypeDefinition(Node::new(
                UnionTypeDefinition {
                    description: union_def.description.clone(),
                    name: union_def.name.clone(),
                    directives: union_def.directives.clone(),
                    members,
                },
            )))
        }
        Definition::UnionTypeExtension(union_ext) => {
            if !used.contains(union_ext.name.as_str()) {
                return None;
            }
            let members: Vec<_> = union_ext
                .members
                .iter()
                .filter(|member| used.contains(member.as_str()))
                .cloned()
                .collect();
            if members.is_empty() {
                return None;
            }
            Some(Definition::UnionTypeExtension(Node::new(
                UnionTypeExtension {
                    name: union_ext.name.clone(),
                    directives: union_ext.directives.clone(),
                    members,
                },
            )))
        }
        Definition::ScalarTypeDefinition(scalar_def) => used
            .contains(scalar_def.name.as_str())
            .then(|| {
                Definition::ScalarTypeDefinition(Node::new(ScalarTypeDefinition {
                    description: scalar_def.description.clone(),
                    name: scalar_def.name.clone(),
                    directives: scalar_def.directives.clone(),
                }))
            }),
        Definition::ScalarTypeExtension(scalar_ext) => used
            .contains(scalar_ext.name.as_str())
            .then(|| {
                Definition::ScalarTypeExtension(Node::new(ScalarTypeExtension {
                    name: scalar_ext.name.clone(),
                    directives: scalar_ext.directives.clone(),
                }))
            }),
        Definition::EnumTypeDefinition(enum_def) => used
            .contains(enum_def.name.as_str())
            .then(|| {
                Definition::EnumTypeDefinition(Node::new(EnumTypeDefinition {
                    description: enum_def.description.clone(),
                    name: enum_def.name.clone(),
                    directives: enum_def.directives.clone(),
                    values: enum_def.values.clone(),
                }))
            }),
        Definition::EnumTypeExtension(enum_ext) => used
            .contains(enum_ext.name.as_str())
            .then(|| {
                Definition::EnumTypeExtension(Node::new(EnumTypeExtension {
                    name: enum_ext.name.clone(),
                    directives: enum_ext.directives.clone(),
                    values: enum_ext.values.clone(),
                }))
            }),
        Definition::InputObjectTypeDefinition(input_def) => {
            if !used.contains(input_def.name.as_str()) {
                return None;
            }
            let fields = filter_input_fields(&input_def.name, &input_def.fields, used);
            if fields.is_empty() {
                return None;
            }
            Some(Definition::InputObjectTypeDefinition(Node::new(
                InputObjectTypeDefinition {
                    description: input_def.description.clone(),
                    name: input_def.name.clone(),
                    directives: input_def.directives.clone(),
                    fields,
                },
            )))
        }
        Definition::InputObjectTypeExtension(input_ext) => {
            if !used.contains(input_ext.name.as_str()) {
                return None;
            }
            let fields = filter_input_fields(&input_ext.name, &input_ext.fields, used);
            if fields.is_empty() {
                return None;
            }
            Some(Definition::InputObjectTypeExtension(Node::new(
                InputObjectTypeExtension {
                    name: input_ext.name.clone(),
                    directives: input_ext.directives.clone(),
                    fields,
                },
            )))
        }
        // Directive definitions have no schema coordinate; their arguments
        // are kept as-is. Schema blocks are handled in the repair pass.
        other => Some(other.clone()),
    }
}

fn filter_fields(
    type_name: &Name,
    fields: &[Node<FieldDefinition>],
    used: &HashSet<String>,
) -> Vec<Node<FieldDefinition>> {
    fields
        .iter()
        .filter(|field| used.contains(&format!("{type_name}.{}", field.name)))
        .map(|field| {
            let arguments = field
                .arguments
                .iter()
                .filter(|argument| {
                    used.contains(&format!("{type_name}.{}({}:)", field.name, argument.name))
                })
                .cloned()
                .collect();
            Node::new(FieldDefinition {
                description: field.description.clone(),
                name: field.name.clone(),
                arguments,
                ty: field.ty.clone(),
                directives: field.directives.clone(),
            })
        })
        .collect()
}

fn filter_input_fields(
    type_name: &Name,
    fields: &[Node<InputValueDefinition>],
    used: &HashSet<String>,
) -> Vec<Node<InputValueDefinition>> {
    fields
        .iter()
        .filter(|field| used.contains(&format!("{type_name}.{}", field.name)))
        .cloned()
        .collect()
}

fn filter_interfaces(interfaces: &[Name], used: &HashSet<String>) -> Vec<Name> {
    interfaces
        .iter()
        .filter(|interface| used.contains(interface.as_str()))
        .cloned()
        .collect()
}

fn repair_schema_block(
    definition: Definition,
    surviving_objects: &HashSet<String>,
) -> Option<Definition> {
    match definition {
        Definition::SchemaDefinition(schema_def) => {
            let root_operations: Vec<_> = schema_def
                .root_operations
                .iter()
                .filter(|binding| surviving_objects.contains(binding.1.as_str()))
                .cloned()
                .collect();
            if root_operations.is_empty() {
                if schema_def.directives.is_empty() {
                    None
                } else {
                    // The block still carries directives but can no longer
                    // legally stand as a definition without a query root.
                    Some(Definition::SchemaExtension(Node::new(SchemaExtension {
                        directives: schema_def.directives.clone(),
                        root_operations,
                    })))
                }
            } else {
                Some(Definition::SchemaDefinition(Node::new(SchemaDefinition {
                    description: schema_def.description.clone(),
                    directives: schema_def.directives.clone(),
                    root_operations,
                })))
            }
        }
        Definition::SchemaExtension(schema_ext) => {
            let root_operations: Vec<_> = schema_ext
                .root_operations
                .iter()
                .filter(|binding| surviving_objects.contains(binding.1.as_str()))
                .cloned()
                .collect();
            if root_operations.is_empty() && schema_ext.directives.is_empty() {
                None
            } else {
                Some(Definition::SchemaExtension(Node::new(SchemaExtension {
                    directives: schema_ext.directives.clone(),
                    root_operations,
                })))
            }
        }
        other => Some(other),
    }
}
