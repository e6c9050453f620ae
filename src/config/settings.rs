//! Combinatorial generation of dataset settings
//!
//! A [`SettingGrid`] maps option names to candidate value lists; expanding
//! it yields every concrete combination as a [`Setting`]. Axis order is
//! declaration order and the first axis varies slowest, so the output
//! sequence is reproducible for a fixed grid and downstream per-setting
//! seeding stays deterministic across runs.

use serde_json::{Map, Value as Json};

use super::value::ConfigValue;

/// One concrete combination of option values
///
/// Entries keep the grid's axis order; every axis of the originating grid
/// is present exactly once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Setting {
    entries: Vec<(String, ConfigValue)>,
}

impl Setting {
    /// Look up an option by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// All entries in axis order
    #[must_use]
    pub fn entries(&self) -> &[(String, ConfigValue)] {
        &self.entries
    }

    /// Number of options
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the setting has no options
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a JSON object (axis order preserved by insertion)
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut map = Map::new();
        for (k, v) in &self.entries {
            map.insert(k.clone(), v.to_json());
        }
        Json::Object(map)
    }
}

/// An ordered option grid
///
/// # Example
///
/// ```
/// use ajustar::config::SettingGrid;
///
/// let settings = SettingGrid::new()
///     .axis("add_task_definition", [true, false])
///     .axis("num_pos_examples", [0usize, 1, 2, 3])
///     .expand();
/// assert_eq!(settings.len(), 8);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingGrid {
    axes: Vec<(String, Vec<ConfigValue>)>,
}

impl SettingGrid {
    /// Create an empty grid
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis; declaration order is enumeration order
    #[must_use]
    pub fn axis<N, I, V>(mut self, name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<ConfigValue>,
    {
        self.axes
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Axis names in declaration order
    #[must_use]
    pub fn axis_names(&self) -> Vec<&str> {
        self.axes.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Number of settings `expand` will produce
    #[must_use]
    pub fn combinations(&self) -> usize {
        self.axes.iter().map(|(_, vs)| vs.len()).product()
    }

    /// Expand into the full cross product.
    ///
    /// The first axis varies slowest. An empty grid yields exactly one
    /// empty setting; an axis with no values yields no settings at all.
    #[must_use]
    pub fn expand(&self) -> Vec<Setting> {
        let mut out = vec![Setting::default()];
        for (name, values) in &self.axes {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for partial in &out {
                for value in values {
                    let mut entries = partial.entries.clone();
                    entries.push((name.clone(), value.clone()));
                    next.push(Setting { entries });
                }
            }
            out = next;
        }
        out
    }
}
