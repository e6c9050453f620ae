//! Declarative configuration trees
//!
//! This module provides the description half of the two-phase
//! configuration pattern: immutable [`ConfigNode`] trees built from
//! literal values, combinatorial [`SettingGrid`] expansion, path-addressed
//! [`deep_replace`] overrides, and the read-only [`MetaConfig`] execution
//! context. The resolution half lives in [`crate::resolve`].

pub mod meta;
pub mod node;
pub mod overrides;
pub mod settings;
pub mod value;

pub use meta::MetaConfig;
pub use node::{node_id, ConfigNode, NodeBuilder, NodeKind, NodeRef};
pub use overrides::{deep_replace, parse_overrides, OverrideError, OverrideMap};
pub use settings::{Setting, SettingGrid};
pub use value::ConfigValue;
