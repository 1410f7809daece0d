use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use icn_common::MAX_NAME_COMPONENTS;

use crate::error::{Error, Result};

/// Accepted URI schemes in front of the path
const SCHEMES: [&str; 2] = ["ccnx:", "lci:"];

/// A single name segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameComponent(Vec<u8>);

impl NameComponent {
    pub fn new(value: Vec<u8>) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => {
                for byte in &self.0 {
                    write!(f, "%{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Hierarchical content name, the key of every forwarding table.
///
/// Ordering is component-wise, which gives FIB listings a stable order
/// where a prefix sorts before the names under it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// The root name `/`
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_components(components: Vec<NameComponent>) -> Result<Self> {
        if components.len() > MAX_NAME_COMPONENTS {
            return Err(Error::TooManyComponents {
                count: components.len(),
                limit: MAX_NAME_COMPONENTS,
            });
        }
        Ok(Self { components })
    }

    /// Parse `/a/b`, `ccnx:/a/b` or `lci:/a/b`
    pub fn parse(uri: &str) -> Result<Self> {
        let path = SCHEMES
            .iter()
            .find_map(|scheme| uri.strip_prefix(scheme))
            .unwrap_or(uri);

        let Some(path) = path.strip_prefix('/') else {
            return Err(Error::InvalidName(uri.to_string()));
        };

        let components = path
            .split('/')
            .filter(|part| !part.is_empty())
            .map(NameComponent::from)
            .collect();
        Self::from_components(components)
    }

    pub fn push(&mut self, component: impl Into<NameComponent>) -> Result<()> {
        if self.components.len() >= MAX_NAME_COMPONENTS {
            return Err(Error::TooManyComponents {
                count: self.components.len() + 1,
                limit: MAX_NAME_COMPONENTS,
            });
        }
        self.components.push(component.into());
        Ok(())
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The first `len` components (the whole name if `len` exceeds it)
    pub fn prefix(&self, len: usize) -> Name {
        let len = len.min(self.components.len());
        Name {
            components: self.components[..len].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Name::parse(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri_forms() {
        let plain = Name::parse("/a/b").unwrap();
        let ccnx = Name::parse("ccnx:/a/b").unwrap();
        let lci = Name::parse("lci:/a/b/").unwrap();
        assert_eq!(plain, ccnx);
        assert_eq!(plain, lci);
        assert_eq!(plain.len(), 2);
        assert_eq!(plain.to_string(), "/a/b");
        assert_eq!(Name::parse("/").unwrap(), Name::root());
    }

    #[test]
    fn test_parse_rejects_relative_names() {
        assert_eq!(
            Name::parse("a/b"),
            Err(Error::InvalidName("a/b".to_string()))
        );
    }

    #[test]
    fn test_component_limit() {
        let long: String = (0..=MAX_NAME_COMPONENTS).map(|i| format!("/{}", i)).collect();
        assert!(matches!(
            Name::parse(&long),
            Err(Error::TooManyComponents { .. })
        ));
    }

    #[test]
    fn test_prefixes() {
        let name: Name = "/video/seg/7".parse().unwrap();
        let prefix = name.prefix(2);
        assert_eq!(prefix.to_string(), "/video/seg");
        assert!(prefix.is_prefix_of(&name));
        assert!(!name.is_prefix_of(&prefix));
        assert!(Name::root().is_prefix_of(&name));
        assert_eq!(name.prefix(10), name);
    }

    #[test]
    fn test_ordering_puts_prefix_first() {
        let a: Name = "/a".parse().unwrap();
        let ab: Name = "/a/b".parse().unwrap();
        let b: Name = "/b".parse().unwrap();
        let mut names = vec![b.clone(), ab.clone(), a.clone()];
        names.sort();
        assert_eq!(names, vec![a, ab, b]);
    }
}
