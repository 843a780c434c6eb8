//! The supergraph YAML configuration model and its conversions to and from
//! service definitions.

use crate::errors::ConfigError;
use crate::shake::ServiceDefinition;
use apollo_compiler::parser::Parser;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A supergraph configuration file: an ordered map of subgraphs plus the
/// federation major version to compose with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupergraphConfig {
    pub subgraphs: IndexMap<String, SubgraphConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_version: Option<FederationVersion>,
}

/// Selects which external composition and planning backend the embedding
/// application should supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederationVersion {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_url: Option<String>,
    pub schema: SchemaSource,
}

/// Where a subgraph's SDL comes from. Introspection and graph-ref sources
/// exist in the wild but are not resolvable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaSource {
    File { file: PathBuf },
    Sdl { sdl: String },
    Introspection { subgraph_url: String },
    GraphRef { graphref: String, subgraph: String },
}

impl SupergraphConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Resolve every subgraph to a [`ServiceDefinition`], reading `file:`
    /// sources relative to `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> Result<Vec<ServiceDefinition>, ConfigError> {
        let mut services = Vec::with_capacity(self.subgraphs.len());
        for (name, subgraph) in &self.subgraphs {
            let sdl = match &subgraph.schema {
                SchemaSource::Sdl { sdl } => sdl.clone(),
                SchemaSource::File { file } => std::fs::read_to_string(base_dir.join(file))?,
                SchemaSource::Introspection { .. } => {
                    return Err(ConfigError::UnsupportedSchemaSource {
                        subgraph: name.clone(),
                        kind: "introspection",
                    });
                }
                SchemaSource::GraphRef { .. } => {
                    return Err(ConfigError::UnsupportedSchemaSource {
                        subgraph: name.clone(),
                        kind: "graph ref",
                    });
                }
            };
            let type_defs = Parser::new()
                .parse_ast(&sdl, format!("{name}.graphql"))
                .map_err(|e| ConfigError::GraphQLDocument {
                    subgraph: name.clone(),
                    errors: Box::new(e),
                })?;
            services.push(ServiceDefinition {
                name: name.clone(),
                routing_url: subgraph.routing_url.clone(),
                type_defs,
            });
        }
        Ok(services)
    }

    /// Build a config with inline SDL entries from a set of services,
    /// typically the pruned output of a shake.
    pub fn from_services(
        services: &[ServiceDefinition],
        federation_version: Option<FederationVersion>,
    ) -> Self {
        Self::build(services, federation_version, |service| SchemaSource::Sdl {
            sdl: service.type_defs.to_string(),
        })
    }

    /// Build a config whose subgraphs reference one `./<name>.graphql` file
    /// each, for callers that write the pruned SDL out to a directory
    /// alongside the config.
    pub fn from_services_as_files(
        services: &[ServiceDefinition],
        federation_version: Option<FederationVersion>,
    ) -> Self {
        Self::build(services, federation_version, |service| SchemaSource::File {
            file: PathBuf::from(format!("./{}.graphql", service.name)),
        })
    }

    fn build(
        services: &[ServiceDefinition],
        federation_version: Option<FederationVersion>,
        schema_source: impl Fn(&ServiceDefinition) -> SchemaSource,
    ) -> Self {
        Self {
            subgraphs: services
                .iter()
                .map(|service| {
                    (
                        service.name.clone(),
                        SubgraphConfig {
                            routing_url: service.routing_url.clone(),
                            schema: schema_source(service),
                        },
                    )
                })
                .collect(),
            federation_version,
        }
    }
}
