//! The tree-shaking pipeline: compose, plan, collect, prune, recompose,
//! validate.

use crate::collect;
use crate::errors::{CompositionIssue, PlanError, ShakeError};
use crate::federation;
use crate::plan::QueryPlan;
use crate::prune;
use crate::subgraph;
use apollo_compiler::ast::Document;
use apollo_compiler::parser::Parser;
use apollo_compiler::validation::Valid;
use apollo_compiler::{ExecutableDocument, Schema};
use apollo_federation::{ApiSchemaOptions, Supergraph};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A single federated service: its name, optional routing URL, and SDL.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub routing_url: Option<String>,
    pub type_defs: Document,
}

/// The output of a composer: the supergraph schema and its SDL rendering.
#[derive(Debug, Clone)]
pub struct ComposedSupergraph {
    pub schema: Valid<Schema>,
    pub supergraph_sdl: String,
}

/// Composes a set of services into a supergraph.
///
/// The two external composition backends (one per federation major version)
/// both fit behind this contract; `config::FederationVersion` tells the
/// embedding application which one to supply.
pub trait Composer {
    fn compose(
        &self,
        services: &[ServiceDefinition],
    ) -> Result<ComposedSupergraph, Vec<CompositionIssue>>;
}

/// Plans an operation against a composed supergraph.
pub trait Planner {
    fn plan(
        &self,
        supergraph: &ComposedSupergraph,
        operation: &str,
    ) -> Result<QueryPlan, PlanError>;
}

/// Validates an operation against a schema, returning rendered error
/// messages (empty when valid).
pub trait OperationValidator {
    fn validate(&self, schema: &Valid<Schema>, operation: &str) -> Vec<String>;
}

/// The default validator, backed by executable-document validation.
pub struct SpecValidator;

impl OperationValidator for SpecValidator {
    fn validate(&self, schema: &Valid<Schema>, operation: &str) -> Vec<String> {
        match ExecutableDocument::parse_and_validate(schema, operation, "operation.graphql") {
            Ok(_) => Vec::new(),
            Err(e) => e.errors.iter().map(|diagnostic| diagnostic.to_string()).collect(),
        }
    }
}

/// The outcome of a shake. Post-pruning composition and validation failures
/// are outcomes, not errors: the pruned services are still returned for
/// inspection.
#[derive(Debug)]
pub enum ShakeResult {
    Success {
        services: Vec<ServiceDefinition>,
    },
    CompositionFailure {
        services: Vec<ServiceDefinition>,
        issues: Vec<CompositionIssue>,
    },
    OperationValidationFailure {
        services: Vec<ServiceDefinition>,
        errors: IndexMap<String, Vec<String>>,
    },
}

pub struct TreeShaker {
    composer: Box<dyn Composer>,
    planner: Box<dyn Planner>,
    validator: Box<dyn OperationValidator>,
}

impl TreeShaker {
    pub fn new(composer: Box<dyn Composer>, planner: Box<dyn Planner>) -> Self {
        Self {
            composer,
            planner,
            validator: Box::new(SpecValidator),
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn OperationValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Shake `services` down to what `operations` need.
    ///
    /// Composition of the unmodified inputs must succeed; everything after
    /// that reports through [`ShakeResult`].
    pub fn shake(
        &self,
        services: &[ServiceDefinition],
        operations: &[String],
    ) -> Result<ShakeResult, ShakeError> {
        let composed = self
            .composer
            .compose(services)
            .map_err(ShakeError::Composition)?;

        let mut fetch_documents: HashMap<String, Vec<Document>> = HashMap::new();
        for operation in operations {
            let plan = self.planner.plan(&composed, operation)?;
            for fetch in plan.fetch_nodes() {
                let documents = fetch_documents
                    .entry(fetch.service_name.clone())
                    .or_default();
                documents.push(
                    Parser::new()
                        .parse_ast(&fetch.operation, "fetch.graphql")
                        .map_err(|e| ShakeError::GraphQLDocument(Box::new(e)))?,
                );
                if let Some(requires) = &fetch.requires {
                    for selection in requires {
                        documents.push(selection.to_fragment()?);
                    }
                }
            }
        }

        let mut shaken = Vec::new();
        for service in services {
            let Some(documents) = fetch_documents.get(&service.name) else {
                tracing::debug!(service = %service.name, "no fetches address this service");
                continue;
            };
            let expanded = subgraph::expand_service(&service.type_defs)?;
            let mut used = HashSet::new();
            for document in documents {
                used.extend(collect::collect_used_coordinates(document, &expanded)?);
            }
            used.extend(federation::collect_from_federation_directives(
                &expanded, &used,
            )?);
            if used.is_empty() {
                tracing::debug!(service = %service.name, "no coordinates used");
                continue;
            }
            shaken.push(ServiceDefinition {
                name: service.name.clone(),
                routing_url: service.routing_url.clone(),
                type_defs: prune::remove_unused_elements(&used, &service.type_defs),
            });
        }

        let recomposed = match self.composer.compose(&shaken) {
            Ok(recomposed) => recomposed,
            Err(issues) => {
                return Ok(ShakeResult::CompositionFailure {
                    services: shaken,
                    issues,
                });
            }
        };

        let api_schema = api_schema_from_sdl(&recomposed.supergraph_sdl)?;
        let mut errors: IndexMap<String, Vec<String>> = IndexMap::new();
        for operation in operations {
            let messages = self.validator.validate(&api_schema, operation);
            if !messages.is_empty() {
                errors.insert(operation.clone(), messages);
            }
        }
        if errors.is_empty() {
            Ok(ShakeResult::Success { services: shaken })
        } else {
            Ok(ShakeResult::OperationValidationFailure {
                services: shaken,
                errors,
            })
        }
    }
}

/// Derive the client-facing API schema from a supergraph SDL. Falls back to
/// treating the SDL as a plain schema when it carries no federation
/// metadata.
pub fn api_schema_from_sdl(supergraph_sdl: &str) -> Result<Valid<Schema>, ShakeError> {
    match Supergraph::new(supergraph_sdl) {
        Ok(supergraph) => Ok(supergraph
            .to_api_schema(ApiSchemaOptions::default())
            .map_err(ShakeError::Federation)?
            .schema()
            .clone()),
        Err(_) => Schema::parse_and_validate(supergraph_sdl, "supergraph.graphql")
            .map_err(|e| ShakeError::GraphQLSchema(Box::new(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::requires;
    use crate::plan::{FetchNode, FlattenNode, PlanNode};
    use apollo_compiler::{Name, Node};
    use apollo_compiler::ast::{
        Definition, DirectiveList, FieldDefinition, ObjectTypeDefinition,
    };
    use std::cell::Cell;

    const FEDERATION_DIRECTIVES: &[&str] = &[
        "key",
        "requires",
        "provides",
        "external",
        "shareable",
        "override",
        "extends",
        "tag",
        "link",
    ];

    fn strip_federation_directives(directives: &DirectiveList) -> DirectiveList {
        DirectiveList(
            directives
                .iter()
                .filter(|d| !FEDERATION_DIRECTIVES.contains(&d.name.as_str()))
                .cloned()
                .collect(),
        )
    }

    /// Merges service documents into one plain schema: same-named object
    /// types have their fields unioned and all federation directives
    /// dropped. Close enough to real composition for pipeline tests.
    struct NaiveComposer;

    impl Composer for NaiveComposer {
        fn compose(
            &self,
            services: &[ServiceDefinition],
        ) -> Result<ComposedSupergraph, Vec<CompositionIssue>> {
            let mut objects: IndexMap<String, (Name, Vec<Name>, Vec<Node<FieldDefinition>>)> =
                IndexMap::new();
            let mut others: IndexMap<String, Definition> = IndexMap::new();

            for service in services {
                for definition in &service.type_defs.definitions {
                    match definition {
                        Definition::ObjectTypeDefinition(object_def) => {
                            let entry = objects
                                .entry(object_def.name.to_string())
                                .or_insert_with(|| {
                                    (object_def.name.clone(), Vec::new(), Vec::new())
                                });
                            for interface in &object_def.implements_interfaces {
                                if !entry.1.contains(interface) {
                                    entry.1.push(interface.clone());
                                }
                            }
                            for field in &object_def.fields {
                                if entry.2.iter().any(|f| f.name == field.name) {
                                    continue;
                                }
                                entry.2.push(Node::new(FieldDefinition {
                                    description: field.description.clone(),
                                    name: field.name.clone(),
                                    arguments: field.arguments.clone(),
                                    ty: field.ty.clone(),
                                    directives: strip_federation_directives(&field.directives),
                                }));
                            }
                        }
                        Definition::DirectiveDefinition(directive_def)
                            if FEDERATION_DIRECTIVES
                                .contains(&directive_def.name.as_str()) => {}
                        other => {
                            let name = match other {
                                Definition::InterfaceTypeDefinition(d) => d.name.to_string(),
                                Definition::UnionTypeDefinition(d) => d.name.to_string(),
                                Definition::ScalarTypeDefinition(d) => d.name.to_string(),
                                Definition::EnumTypeDefinition(d) => d.name.to_string(),
                                Definition::InputObjectTypeDefinition(d) => d.name.to_string(),
                                _ => continue,
                            };
                            others.entry(name).or_insert_with(|| other.clone());
                        }
                    }
                }
            }

            let mut document = Document::new();
            for (_, (name, implements, fields)) in objects {
                document
                    .definitions
                    .push(Definition::ObjectTypeDefinition(Node::new(
                        ObjectTypeDefinition {
                            description: None,
                            name,
                            implements_interfaces: implements,
                            directives: DirectiveList::default(),
                            fields,
                        },
                    )));
            }
            document.definitions.extend(others.into_values());

            match document.to_schema_validate() {
                Ok(schema) => {
                    let supergraph_sdl = schema.to_string();
                    Ok(ComposedSupergraph {
                        schema,
                        supergraph_sdl,
                    })
                }
                Err(e) => Err(vec![CompositionIssue {
                    message: e.to_string(),
                    code: None,
                }]),
            }
        }
    }

    /// Fails composition on the nth call; delegates otherwise.
    struct FailingComposer {
        fail_on_call: usize,
        calls: Cell<usize>,
    }

    impl Composer for FailingComposer {
        fn compose(
            &self,
            services: &[ServiceDefinition],
        ) -> Result<ComposedSupergraph, Vec<CompositionIssue>> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call == self.fail_on_call {
                return Err(vec![CompositionIssue {
                    message: "types conflict".to_string(),
                    code: Some("TYPE_CONFLICT".to_string()),
                }]);
            }
            NaiveComposer.compose(services)
        }
    }

    /// Returns canned plans keyed by operation text.
    struct StubPlanner(HashMap<String, QueryPlan>);

    impl Planner for StubPlanner {
        fn plan(
            &self,
            _supergraph: &ComposedSupergraph,
            operation: &str,
        ) -> Result<QueryPlan, PlanError> {
            self.0
                .get(operation)
                .cloned()
                .ok_or_else(|| PlanError::Backend(format!("no plan for {operation}")))
        }
    }

    fn service(name: &str, sdl: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            routing_url: Some(format!("https://{name}.example.com/graphql")),
            type_defs: Parser::new().parse_ast(sdl, "service.graphql").unwrap(),
        }
    }

    fn fetch(service_name: &str, operation: &str) -> PlanNode {
        PlanNode::Fetch(FetchNode {
            service_name: service_name.to_string(),
            operation: operation.to_string(),
            operation_name: None,
            operation_kind: None,
            variable_usages: Vec::new(),
            requires: None,
        })
    }

    fn assert_sdl(actual: &Document, expected: &str) {
        let expected = Parser::new()
            .parse_ast(expected, "expected.graphql")
            .unwrap();
        assert_eq!(actual.to_string(), expected.to_string());
    }

    #[test]
    fn shakes_unused_elements_from_a_service() {
        let services = vec![service(
            "catalog",
            r#"
            type Query { foo: Foo, unusedRoot: Unused }
            type Foo { bar: String, baz: Int }
            type Unused { id: ID }
            "#,
        )];
        let operation = "{ foo { bar } }".to_string();
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(fetch("catalog", "{ foo { bar } }")),
            },
        )]);

        let shaker = TreeShaker::new(Box::new(NaiveComposer), Box::new(StubPlanner(plans)));
        let result = shaker.shake(&services, &[operation]).unwrap();

        let ShakeResult::Success { services } = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(services.len(), 1);
        assert_sdl(
            &services[0].type_defs,
            "type Query { foo: Foo } type Foo { bar: String }",
        );
    }

    #[test]
    fn requires_closure_retains_dependency_fields() {
        let services = vec![
            service(
                "products",
                r#"
                type Query { product: Product }
                type Product @key(fields: "sku") { sku: ID, weight: Int, price: Int }
                "#,
            ),
            service(
                "shipping",
                r#"
                type Product @key(fields: "sku") {
                  sku: ID @external
                  weight: Int @external
                  shippingEstimate: Int @requires(fields: "weight")
                }
                "#,
            ),
        ];
        let operation = "{ product { shippingEstimate } }".to_string();
        let entities_operation = "query($representations: [_Any!]!) { _entities(representations: $representations) { ... on Product { shippingEstimate } } }";
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(PlanNode::Sequence {
                    nodes: vec![
                        fetch("products", "{ product { sku } }"),
                        PlanNode::Flatten(FlattenNode {
                            path: vec!["product".to_string()],
                            node: Box::new(PlanNode::Fetch(FetchNode {
                                service_name: "shipping".to_string(),
                                operation: entities_operation.to_string(),
                                operation_name: None,
                                operation_kind: None,
                                variable_usages: vec!["representations".to_string()],
                                requires: Some(vec![requires::Selection::InlineFragment(
                                    requires::InlineFragment {
                                        type_condition: Some("Product".to_string()),
                                        selections: vec![requires::Selection::Field(
                                            requires::Field {
                                                alias: None,
                                                name: "sku".to_string(),
                                                selections: None,
                                            },
                                        )],
                                    },
                                )]),
                            })),
                        }),
                    ],
                }),
            },
        )]);

        let shaker = TreeShaker::new(Box::new(NaiveComposer), Box::new(StubPlanner(plans)));
        let result = shaker.shake(&services, &[operation]).unwrap();

        let ShakeResult::Success { services } = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(services.len(), 2);
        // products keeps only what its fetch and its key need
        assert_sdl(
            &services[0].type_defs,
            r#"
            type Query { product: Product }
            type Product @key(fields: "sku") { sku: ID }
            "#,
        );
        // shipping keeps the requires dependency even though no fetch
        // selects weight
        assert_sdl(
            &services[1].type_defs,
            r#"
            type Product @key(fields: "sku") {
              sku: ID @external
              weight: Int @external
              shippingEstimate: Int @requires(fields: "weight")
            }
            "#,
        );
    }

    #[test]
    fn service_without_fetches_is_dropped() {
        let services = vec![
            service("catalog", "type Query { foo: String, bar: Int }"),
            service("extras", "type Extra { id: ID }"),
        ];
        let operation = "{ foo }".to_string();
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(fetch("catalog", "{ foo }")),
            },
        )]);

        let shaker = TreeShaker::new(Box::new(NaiveComposer), Box::new(StubPlanner(plans)));
        let result = shaker.shake(&services, &[operation]).unwrap();

        let ShakeResult::Success { services } = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "catalog");
    }

    #[test]
    fn initial_composition_failure_is_fatal() {
        let shaker = TreeShaker::new(
            Box::new(FailingComposer {
                fail_on_call: 1,
                calls: Cell::new(0),
            }),
            Box::new(StubPlanner(HashMap::new())),
        );
        let services = vec![service("catalog", "type Query { foo: String }")];
        let result = shaker.shake(&services, &["{ foo }".to_string()]);
        assert!(matches!(result, Err(ShakeError::Composition(_))));
    }

    #[test]
    fn recomposition_failure_is_an_outcome() {
        let operation = "{ foo }".to_string();
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(fetch("catalog", "{ foo }")),
            },
        )]);
        let shaker = TreeShaker::new(
            Box::new(FailingComposer {
                fail_on_call: 2,
                calls: Cell::new(0),
            }),
            Box::new(StubPlanner(plans)),
        );
        let services = vec![service("catalog", "type Query { foo: String }")];
        let result = shaker.shake(&services, &[operation]).unwrap();
        let ShakeResult::CompositionFailure { services, issues } = result else {
            panic!("expected composition failure, got {result:?}");
        };
        assert_eq!(services.len(), 1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code.as_deref(), Some("TYPE_CONFLICT"));
    }

    #[test]
    fn operations_invalid_after_pruning_are_reported() {
        // The plan only fetches `bar`, so `foo` is shaken away and the
        // original operation no longer validates.
        let services = vec![service("catalog", "type Query { foo: String, bar: Int }")];
        let operation = "{ foo bar }".to_string();
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(fetch("catalog", "{ bar }")),
            },
        )]);

        let shaker = TreeShaker::new(Box::new(NaiveComposer), Box::new(StubPlanner(plans)));
        let result = shaker.shake(&services, &[operation.clone()]).unwrap();

        let ShakeResult::OperationValidationFailure { errors, .. } = result else {
            panic!("expected validation failure, got {result:?}");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key(&operation));
        assert!(!errors[&operation].is_empty());
    }

    #[test]
    fn union_members_are_pruned_through_inline_fragments() {
        let services = vec![service(
            "search",
            r#"
            type Query { result: Result }
            union Result = Success | Warning | Error
            type Success { ok: Boolean }
            type Warning { note: String }
            type Error { reason: String }
            "#,
        )];
        let operation = "{ result { ... on Success { ok } } }".to_string();
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(fetch("search", "{ result { ... on Success { ok } } }")),
            },
        )]);

        let shaker = TreeShaker::new(Box::new(NaiveComposer), Box::new(StubPlanner(plans)));
        let result = shaker.shake(&services, &[operation]).unwrap();

        let ShakeResult::Success { services } = result else {
            panic!("expected success, got {result:?}");
        };
        assert_sdl(
            &services[0].type_defs,
            r#"
            type Query { result: Result }
            union Result = Success
            type Success { ok: Boolean }
            "#,
        );
    }

    #[test]
    fn shaking_twice_is_idempotent() {
        let services = vec![service(
            "catalog",
            "type Query { foo: Foo } type Foo { bar: String, baz: Int }",
        )];
        let operation = "{ foo { bar } }".to_string();
        let plans = HashMap::from([(
            operation.clone(),
            QueryPlan {
                node: Some(fetch("catalog", "{ foo { bar } }")),
            },
        )]);

        let shaker = TreeShaker::new(
            Box::new(NaiveComposer),
            Box::new(StubPlanner(plans.clone())),
        );
        let ShakeResult::Success { services: once } =
            shaker.shake(&services, &[operation.clone()]).unwrap()
        else {
            panic!("expected success");
        };
        let shaker = TreeShaker::new(Box::new(NaiveComposer), Box::new(StubPlanner(plans)));
        let ShakeResult::Success { services: twice } =
            shaker.shake(&once, &[operation]).unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(
            once[0].type_defs.to_string(),
            twice[0].type_defs.to_string()
        );
    }
}
