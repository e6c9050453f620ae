//! Dynamic configuration values
//!
//! Configuration trees hold `ConfigValue` leaves so that path-addressed
//! overrides work uniformly over scalars, lists, setting lists, and nested
//! nodes. Scalars coerce leniently (an `Int` reads as a float, `"true"`
//! parses as a bool) in the same spirit as the YAML schema coercions used
//! elsewhere in the ecosystem.

use serde_json::{json, Value as Json};

use super::node::NodeRef;
use super::settings::Setting;

/// A single configuration value
#[derive(Debug, Clone)]
pub enum ConfigValue {
    /// Absent / "use the default" marker (`None` in override syntax)
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String (also used for filesystem paths)
    Str(String),
    /// Homogeneous or mixed list of values
    List(Vec<ConfigValue>),
    /// List of concrete dataset settings (cross-product output)
    Settings(Vec<Setting>),
    /// Nested configuration node (may be shared between fields)
    Node(NodeRef),
}

impl ConfigValue {
    /// Parse a raw override string into a value.
    ///
    /// Coercion order: null markers, booleans, integers, floats; anything
    /// else stays a string.
    #[must_use]
    pub fn parse(raw: &str) -> ConfigValue {
        match raw {
            "null" | "none" | "None" => return ConfigValue::Null,
            "true" | "True" => return ConfigValue::Bool(true),
            "false" | "False" => return ConfigValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ConfigValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return ConfigValue::Float(f);
        }
        ConfigValue::Str(raw.to_string())
    }

    /// Human-readable name of the value's type, for error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Settings(_) => "settings",
            ConfigValue::Node(_) => "node",
        }
    }

    /// Read as bool
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as i64
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as f64 (ints widen)
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Read as a non-negative count
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ConfigValue::Int(i) if *i >= 0 => Some(*i as usize),
            _ => None,
        }
    }

    /// Read as &str
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a nested node reference
    #[must_use]
    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            ConfigValue::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Read as a settings list
    #[must_use]
    pub fn as_settings(&self) -> Option<&[Setting]> {
        match self {
            ConfigValue::Settings(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the null marker
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Project into a `serde_json::Value` for display and tracking.
    ///
    /// Nested nodes render as `{"kind": ..., fields...}` maps; sharing is
    /// not preserved in the projection (each reference renders in full).
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            ConfigValue::Null => Json::Null,
            ConfigValue::Bool(b) => json!(b),
            ConfigValue::Int(i) => json!(i),
            ConfigValue::Float(f) => json!(f),
            ConfigValue::Str(s) => json!(s),
            ConfigValue::List(items) => Json::Array(items.iter().map(ConfigValue::to_json).collect()),
            ConfigValue::Settings(settings) => {
                Json::Array(settings.iter().map(Setting::to_json).collect())
            }
            ConfigValue::Node(node) => node.to_json(),
        }
    }
}

// Structural equality; shared nodes compare by content, so two trees built
// from the same literals are equal even when their sharing differs.
impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConfigValue::Null, ConfigValue::Null) => true,
            (ConfigValue::Bool(a), ConfigValue::Bool(b)) => a == b,
            (ConfigValue::Int(a), ConfigValue::Int(b)) => a == b,
            (ConfigValue::Float(a), ConfigValue::Float(b)) => a == b,
            (ConfigValue::Str(a), ConfigValue::Str(b)) => a == b,
            (ConfigValue::List(a), ConfigValue::List(b)) => a == b,
            (ConfigValue::Settings(a), ConfigValue::Settings(b)) => a == b,
            (ConfigValue::Node(a), ConfigValue::Node(b)) => **a == **b,
            _ => false,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<i32> for ConfigValue {
    fn from(i: i32) -> Self {
        ConfigValue::Int(i64::from(i))
    }
}

impl From<usize> for ConfigValue {
    fn from(i: usize) -> Self {
        ConfigValue::Int(i as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Str(s)
    }
}

impl From<NodeRef> for ConfigValue {
    fn from(n: NodeRef) -> Self {
        ConfigValue::Node(n)
    }
}

impl From<Vec<Setting>> for ConfigValue {
    fn from(s: Vec<Setting>) -> Self {
        ConfigValue::Settings(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(ConfigValue::parse("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse("False"), ConfigValue::Bool(false));
        assert_eq!(ConfigValue::parse("42"), ConfigValue::Int(42));
        assert_eq!(ConfigValue::parse("-3"), ConfigValue::Int(-3));
        assert_eq!(ConfigValue::parse("1e-5"), ConfigValue::Float(1e-5));
        assert_eq!(ConfigValue::parse("none"), ConfigValue::Null);
        assert_eq!(
            ConfigValue::parse("outputs/run1"),
            ConfigValue::Str("outputs/run1".to_string())
        );
    }

    #[test]
    fn test_int_widens_to_float() {
        assert_eq!(ConfigValue::Int(7).as_float(), Some(7.0));
        assert_eq!(ConfigValue::Float(0.5).as_float(), Some(0.5));
        assert_eq!(ConfigValue::Str("x".into()).as_float(), None);
    }

    #[test]
    fn test_as_usize_rejects_negative() {
        assert_eq!(ConfigValue::Int(8).as_usize(), Some(8));
        assert_eq!(ConfigValue::Int(-1).as_usize(), None);
    }

    #[test]
    fn test_to_json_scalars() {
        assert_eq!(ConfigValue::Bool(true).to_json(), json!(true));
        assert_eq!(ConfigValue::Null.to_json(), Json::Null);
        assert_eq!(
            ConfigValue::List(vec![1i64.into(), 2i64.into()]).to_json(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_type_name() {
        assert_eq!(ConfigValue::Null.type_name(), "null");
        assert_eq!(ConfigValue::Float(1.0).type_name(), "float");
        assert_eq!(ConfigValue::List(vec![]).type_name(), "list");
    }
}
