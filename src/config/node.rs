//! Immutable configuration nodes
//!
//! A [`ConfigNode`] is a declarative description of a runtime object to be
//! built later: a kind plus named fields. Nodes are handled through
//! [`NodeRef`] (`Arc`) and never mutated after construction; two fields in
//! different nodes may hold the identical reference, which is a sharing
//! relationship the resolver and override engine both honor by pointer
//! identity.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use super::value::ConfigValue;

/// Shared handle to an immutable configuration node
pub type NodeRef = Arc<ConfigNode>;

/// Identity of a node within a tree (pointer identity)
#[must_use]
pub fn node_id(node: &NodeRef) -> usize {
    Arc::as_ptr(node) as usize
}

/// What kind of runtime object a node describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Sequence model + tokenizer
    Model,
    /// Fixed evaluation dataset loaded from a TSV file
    SeqPairData,
    /// Settings-driven synthetic training data generator
    SeqPairGenerator,
    /// AdamW optimizer
    AdamW,
    /// AdaFactor optimizer
    AdaFactor,
    /// Trainer binding a model to an optimizer
    Trainer,
    /// Held-out loss evaluation
    LossEval,
    /// Greedy-generation evaluation
    GenerationEval,
    /// Training-loop entry point
    TrainLoop,
}

impl NodeKind {
    /// Stable name used in errors and serialized output
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Model => "model",
            NodeKind::SeqPairData => "seq_pair_data",
            NodeKind::SeqPairGenerator => "seq_pair_generator",
            NodeKind::AdamW => "adamw",
            NodeKind::AdaFactor => "adafactor",
            NodeKind::Trainer => "trainer",
            NodeKind::LossEval => "loss_eval",
            NodeKind::GenerationEval => "generation_eval",
            NodeKind::TrainLoop => "train_loop",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable, declaratively-constructed configuration node
#[derive(Debug)]
pub struct ConfigNode {
    kind: NodeKind,
    fields: Vec<(String, ConfigValue)>,
}

impl ConfigNode {
    /// Start building a node of the given kind
    #[must_use]
    pub fn builder(kind: NodeKind) -> NodeBuilder {
        NodeBuilder {
            kind,
            fields: Vec::new(),
        }
    }

    /// The node's kind
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Look up a field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// All fields in declaration order
    #[must_use]
    pub fn fields(&self) -> &[(String, ConfigValue)] {
        &self.fields
    }

    /// Clone this node with one existing field replaced.
    ///
    /// The caller is expected to have checked that `name` exists; a missing
    /// name leaves the clone identical to the original.
    #[must_use]
    pub fn with_field(&self, name: &str, value: ConfigValue) -> ConfigNode {
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| {
                if k == name {
                    (k.clone(), value.clone())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        ConfigNode {
            kind: self.kind,
            fields,
        }
    }

    /// Rebuild with an entirely new field list (used by the override engine)
    #[must_use]
    pub fn with_fields(&self, fields: Vec<(String, ConfigValue)>) -> ConfigNode {
        ConfigNode {
            kind: self.kind,
            fields,
        }
    }

    /// Render the node (and everything below it) as JSON
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut map = Map::new();
        map.insert("kind".to_string(), Json::String(self.kind.name().to_string()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.to_json());
        }
        Json::Object(map)
    }
}

// Structural equality, recursing through shared references.
impl PartialEq for ConfigNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.fields == other.fields
    }
}

/// Builder for [`ConfigNode`]
#[derive(Debug)]
pub struct NodeBuilder {
    kind: NodeKind,
    fields: Vec<(String, ConfigValue)>,
}

impl NodeBuilder {
    /// Declare a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Finish, producing a shared reference
    #[must_use]
    pub fn build(self) -> NodeRef {
        Arc::new(ConfigNode {
            kind: self.kind,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_node() -> NodeRef {
        ConfigNode::builder(NodeKind::Model)
            .field("model_str", "seq2seq-base")
            .field("use_fp16", true)
            .field("vocab_size", 512usize)
            .build()
    }

    #[test]
    fn test_builder_preserves_declaration_order() {
        let node = model_node();
        let names: Vec<&str> = node.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["model_str", "use_fp16", "vocab_size"]);
    }

    #[test]
    fn test_get_field() {
        let node = model_node();
        assert_eq!(
            node.get("model_str").and_then(ConfigValue::as_str),
            Some("seq2seq-base")
        );
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn test_with_field_replaces_only_target() {
        let node = model_node();
        let updated = node.with_field("use_fp16", ConfigValue::Bool(false));
        assert_eq!(updated.get("use_fp16").and_then(ConfigValue::as_bool), Some(false));
        assert_eq!(
            updated.get("model_str").and_then(ConfigValue::as_str),
            Some("seq2seq-base")
        );
        // original untouched
        assert_eq!(node.get("use_fp16").and_then(ConfigValue::as_bool), Some(true));
    }

    #[test]
    fn test_shared_reference_compares_structurally() {
        let shared = model_node();
        let a = ConfigNode::builder(NodeKind::Trainer)
            .field("model", shared.clone())
            .build();
        let b = ConfigNode::builder(NodeKind::Trainer)
            .field("model", shared)
            .build();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_node_identity_distinguishes_equal_nodes() {
        let a = model_node();
        let b = model_node();
        assert_eq!(*a, *b);
        assert_ne!(node_id(&a), node_id(&b));
        let a2 = a.clone();
        assert_eq!(node_id(&a), node_id(&a2));
    }

    #[test]
    fn test_to_json_includes_kind() {
        let json = model_node().to_json();
        assert_eq!(json["kind"], "model");
        assert_eq!(json["vocab_size"], 512);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(NodeKind::SeqPairGenerator.to_string(), "seq_pair_generator");
        assert_eq!(NodeKind::TrainLoop.name(), "train_loop");
    }
}
