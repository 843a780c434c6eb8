//! A deserializable model of the query plan trees produced by federation
//! query planners, and extraction of the fetch steps they contain.

pub mod requires;

use serde::{Deserialize, Serialize};

/// A query plan for a single operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<PlanNode>,
}

/// One node of a query plan tree, tagged the way planners emit them on the
/// wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", tag = "kind")]
pub enum PlanNode {
    Fetch(FetchNode),
    Sequence { nodes: Vec<PlanNode> },
    Parallel { nodes: Vec<PlanNode> },
    Flatten(FlattenNode),
    Subscription(SubscriptionNode),
}

/// A single fetch against one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchNode {
    pub service_name: String,
    /// The operation document sent to the service.
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_usages: Vec<String>,
    /// Entity representation selections this fetch depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<requires::Selection>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenNode {
    #[serde(default)]
    pub path: Vec<String>,
    pub node: Box<PlanNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionNode {
    pub primary: FetchNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<Box<PlanNode>>,
}

impl QueryPlan {
    /// All fetch steps of the plan, in plan order. Subscription nodes are
    /// not descended into; subscription operations contribute no usage.
    pub fn fetch_nodes(&self) -> Vec<&FetchNode> {
        let mut nodes = Vec::new();
        if let Some(node) = &self.node {
            node.collect_fetch_nodes(&mut nodes);
        }
        nodes
    }
}

impl PlanNode {
    fn collect_fetch_nodes<'plan>(&'plan self, nodes: &mut Vec<&'plan FetchNode>) {
        match self {
            PlanNode::Fetch(fetch) => nodes.push(fetch),
            PlanNode::Flatten(flatten) => flatten.node.collect_fetch_nodes(nodes),
            PlanNode::Sequence { nodes: children } | PlanNode::Parallel { nodes: children } => {
                for child in children {
                    child.collect_fetch_nodes(nodes);
                }
            }
            PlanNode::Subscription(_) => {}
        }
    }
}
