//! Node params and channel bindings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use tickgraph_telem::{ChannelKey, DataType};

/// One named, typed param with an optional literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Param name, unique within its param list.
    pub name: String,
    /// Element type of the values flowing through this param.
    pub data_type: DataType,
    /// Literal payload for config params; `Null` when absent.
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Param {
    /// A param with no literal value.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            value: serde_json::Value::Null,
        }
    }

    /// A config param carrying a literal value.
    pub fn with_value(
        name: impl Into<String>,
        data_type: DataType,
        value: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            value,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.data_type)?;
        if !self.value.is_null() {
            write!(f, " = {}", self.value)?;
        }
        Ok(())
    }
}

/// An ordered list of params.
///
/// Position is the stable identifier node implementations index by; names
/// are used when resolving edges and config fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(pub Vec<Param>);

impl Params {
    /// An empty param list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a param by name.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Position of the named param, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|p| p.name == name)
    }

    /// Param names in declaration order.
    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.name.as_str()).collect()
    }

    /// Number of params.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no params are declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate params in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }
}

impl Index<usize> for Params {
    type Output = Param;

    fn index(&self, index: usize) -> &Param {
        &self.0[index]
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Self(params)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "]")
    }
}

/// Physical channels referenced by a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Channels {
    /// Channels the node reads, keyed by channel, valued by local name.
    #[serde(default)]
    pub read: BTreeMap<ChannelKey, String>,
    /// Channels the node writes, keyed by channel, valued by local name.
    #[serde(default)]
    pub write: BTreeMap<ChannelKey, String>,
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read: {{")?;
        for (i, (key, name)) in self.read.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, name)?;
        }
        write!(f, "}}, write: {{")?;
        for (i, (key, name)) in self.write.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, name)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> Params {
        Params(vec![
            Param::new("a", DataType::F32),
            Param::new("b", DataType::U8),
        ])
    }

    #[test]
    fn test_get_and_index_of() {
        let params = sample_params();
        assert_eq!(params.get("b").map(|p| p.data_type), Some(DataType::U8));
        assert_eq!(params.index_of("b"), Some(1));
        assert_eq!(params.index_of("missing"), None);
    }

    #[test]
    fn test_param_display_includes_value() {
        let p = Param::with_value("period", DataType::I64, serde_json::json!(1000));
        assert_eq!(p.to_string(), "period (i64) = 1000");
        let p = Param::new("output", DataType::F32);
        assert_eq!(p.to_string(), "output (f32)");
    }
}
