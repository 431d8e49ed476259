//! Generic configuration values and records.

use std::fmt;

/// A single configuration value.
///
/// Values are intentionally loose at this level; a [`ConfigReader`](super::ConfigReader)
/// enforces the expected kind and range for every recognized key.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Named member of a closed enumeration (e.g. `"Aces"`).
    Enum(String),
    /// Pair of unsigned integers (e.g. a fixed output size).
    Uint2([u32; 2]),
}

impl ConfigValue {
    /// Create an enumeration value from its variant name.
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::Enum(name.into())
    }

    /// Short name of the value kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Enum(_) => "enum",
            Self::Uint2(_) => "uint2",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Enum(v) => write!(f, "{v}"),
            Self::Uint2([x, y]) => write!(f, "({x}, {y})"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<[u32; 2]> for ConfigValue {
    fn from(value: [u32; 2]) -> Self {
        Self::Uint2(value)
    }
}

/// An ordered set of `key -> value` options.
///
/// Insertion order is preserved so that diagnostics (e.g. the first unknown
/// key) are reported deterministically. Setting an existing key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRecord {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace an option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up an option.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Check whether an option is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.set(key, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = ConfigRecord::new().with("a", 1).with("b", true);
        record.set("a", 2.5);

        let keys: Vec<_> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&ConfigValue::Float(2.5)));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_from_iterator() {
        let record: ConfigRecord = [("sampleCount", 16), ("subFrameCount", 0)]
            .into_iter()
            .collect();
        assert_eq!(record.get("sampleCount"), Some(&ConfigValue::Int(16)));
        assert!(record.contains("subFrameCount"));
        assert!(!record.contains("missing"));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ConfigValue::from(3u32), ConfigValue::Int(3));
        assert_eq!(ConfigValue::from(0.5f32), ConfigValue::Float(0.5));
        assert_eq!(ConfigValue::from([4, 2]), ConfigValue::Uint2([4, 2]));
        assert_eq!(ConfigValue::enumeration("Aces").to_string(), "Aces");
        assert_eq!(ConfigValue::Uint2([4, 2]).kind_name(), "uint2");
    }

    #[test]
    fn test_empty_record() {
        let record = ConfigRecord::default();
        assert!(record.is_empty());
        assert_eq!(record.get("enabled"), None);
    }
}
