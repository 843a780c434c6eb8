use apollo_compiler::ast::OperationType;
use apollo_compiler::{InvalidNameError, Schema, ast::Document, validation::WithErrors};
use apollo_federation::error::FederationError;

/// A single error reported by a composer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompositionIssue {
    pub message: String,
    pub code: Option<String>,
}

/// An error from an external query planner.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Query planning failed: {0}")]
    Backend(String),

    #[error("Invalid query plan JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An error in the tree-shaking pipeline
#[derive(Debug, thiserror::Error)]
pub enum ShakeError {
    #[error("Composition of the input services failed with {} error(s)", .0.len())]
    Composition(Vec<CompositionIssue>),

    #[error("Could not parse GraphQL document: {0}")]
    GraphQLDocument(Box<WithErrors<Document>>),

    #[error("Could not parse GraphQL schema: {0}")]
    GraphQLSchema(Box<WithErrors<Schema>>),

    #[error("Field {type_name}.{field_name} is not defined")]
    UnknownField {
        type_name: String,
        field_name: String,
    },

    #[error("Argument {type_name}.{field_name}({argument_name}:) is not defined")]
    UnknownArgument {
        type_name: String,
        field_name: String,
        argument_name: String,
    },

    #[error("Schema has no {0} root operation")]
    MissingRootOperation(OperationType),

    #[error("Unsupported requires selection: {0}")]
    UnsupportedRequiresShape(&'static str),

    #[error("Invalid field set on type {type_name}: {message}")]
    InvalidFieldSet { type_name: String, message: String },

    #[error("Invalid GraphQL name: {0}")]
    Name(#[from] InvalidNameError),

    #[error("Federation error: {0}")]
    Federation(#[from] FederationError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// An error in supergraph configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid supergraph config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Could not parse schema for subgraph {subgraph}: {errors}")]
    GraphQLDocument {
        subgraph: String,
        errors: Box<WithErrors<Document>>,
    },

    #[error("Could not read schema file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("Unsupported schema source for subgraph {subgraph}: {kind}")]
    UnsupportedSchemaSource {
        subgraph: String,
        kind: &'static str,
    },
}
