//! Tree shaking for federated GraphQL schemas: reduce a set of subgraph
//! schemas to the minimal subset needed to serve a known set of client
//! operations, keeping entity keys and field dependencies intact.

pub mod collect;
pub mod config;
pub mod errors;
pub mod federation;
pub mod plan;
pub mod prune;
pub mod shake;
pub mod subgraph;

pub use config::{FederationVersion, SupergraphConfig};
pub use errors::{CompositionIssue, ConfigError, PlanError, ShakeError};
pub use plan::QueryPlan;
pub use shake::{
    Composer, ComposedSupergraph, OperationValidator, Planner, ServiceDefinition, ShakeResult,
    SpecValidator, TreeShaker,
};
