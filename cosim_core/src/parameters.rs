//! Initial parameter values.
//!
//! A flat `key=value` mapping in properties-file form:
//!
//! ```text
//! # comment
//! ! also a comment
//! v_ref = 12.5
//! robot.toolMass: 10.0
//! ```
//!
//! Keys and values are trimmed. Line continuations and escapes are not
//! interpreted.

use crate::error::CoreError;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Name → raw text mapping of initial parameter values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses properties-style text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CoreError> {
        let mut values = BTreeMap::new();

        for (i, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = match line.find(['=', ':']) {
                Some(pos) => (line[..pos].trim(), line[pos + 1..].trim()),
                None => (line, ""),
            };
            if key.is_empty() {
                return Err(CoreError::configuration(format!(
                    "parameters line {}: empty key",
                    i + 1
                )));
            }

            values.insert(key.to_string(), value.to_string());
        }

        Ok(Self { values })
    }

    /// Reads a parameters file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Self::from_reader(File::open(path)?)
    }

    /// Builds a set from in-memory pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties() {
        let text = "\
# electric model
! legacy comment
v_ref = 12.5
robot.toolMass: 10.0
url=http://host:80

use_electric
";
        let params = ParameterSet::from_reader(text.as_bytes()).unwrap();

        assert_eq!(params.len(), 4);
        assert_eq!(params.get("v_ref"), Some("12.5"));
        assert_eq!(params.get("robot.toolMass"), Some("10.0"));
        assert_eq!(params.get("url"), Some("http://host:80"));
        assert_eq!(params.get("use_electric"), Some(""));
    }

    #[test]
    fn test_keys_are_sorted() {
        let params = ParameterSet::from_pairs([("b", "1"), ("a", "2")]);
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = ParameterSet::from_reader("= 3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_later_value_wins() {
        let params = ParameterSet::from_reader("a=1\na=2\n".as_bytes()).unwrap();
        assert_eq!(params.get("a"), Some("2"));
    }
}
