//! The `requires` selections attached to fetch nodes, and their conversion
//! into fragment documents the coordinate collector can walk.

use crate::errors::ShakeError;
use apollo_compiler::ast::{self, Definition, Document};
use apollo_compiler::{Name, Node};
use serde::{Deserialize, Serialize};

/// A selection in a fetch node's `requires` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum Selection {
    Field(Field),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selections: Option<Vec<Selection>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragment {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_condition: Option<String>,
    pub selections: Vec<Selection>,
}

impl Selection {
    /// Convert this selection into a document holding a single fragment
    /// definition on the selection's type condition.
    ///
    /// Only an inline fragment works at the top level: a bare field has no
    /// type condition to hang the fragment on.
    pub fn to_fragment(&self) -> Result<Document, ShakeError> {
        match self {
            Selection::InlineFragment(inline) => {
                let type_condition = inline.type_condition.as_deref().ok_or(
                    ShakeError::UnsupportedRequiresShape(
                        "top-level inline fragment without a type condition",
                    ),
                )?;
                let fragment = ast::FragmentDefinition {
                    name: Name::new("f")?,
                    type_condition: Name::new(type_condition)?,
                    directives: ast::DirectiveList::default(),
                    selection_set: inline
                        .selections
                        .iter()
                        .map(to_ast_selection)
                        .collect::<Result<_, _>>()?,
                };
                let mut document = Document::new();
                document
                    .definitions
                    .push(Definition::FragmentDefinition(Node::new(fragment)));
                Ok(document)
            }
            Selection::Field(_) => Err(ShakeError::UnsupportedRequiresShape(
                "top-level field in requires",
            )),
        }
    }
}

fn to_ast_selection(selection: &Selection) -> Result<ast::Selection, ShakeError> {
    match selection {
        Selection::Field(field) => {
            let alias = match &field.alias {
                Some(alias) => Some(Name::new(alias)?),
                None => None,
            };
            Ok(ast::Selection::Field(Node::new(ast::Field {
                alias,
                name: Name::new(&field.name)?,
                arguments: Vec::new(),
                directives: ast::DirectiveList::default(),
                selection_set: field
                    .selections
                    .iter()
                    .flatten()
                    .map(to_ast_selection)
                    .collect::<Result<_, _>>()?,
            })))
        }
        Selection::InlineFragment(inline) => {
            let type_condition = match &inline.type_condition {
                Some(condition) => Some(Name::new(condition)?),
                None => None,
            };
            Ok(ast::Selection::InlineFragment(Node::new(
                ast::InlineFragment {
                    type_condition,
                    directives: ast::DirectiveList::default(),
                    selection_set: inline
                        .selections
                        .iter()
                        .map(to_ast_selection)
                        .collect::<Result<_, _>>()?,
                },
            )))
        }
    }
}
