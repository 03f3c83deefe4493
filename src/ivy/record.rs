use crate::ivy::document::Element;
use std::collections::BTreeMap;
use std::fmt;

pub const ORGANIZATION: &str = "org";
pub const NAME: &str = "name";
pub const REVISION: &str = "rev";
pub const CONFIGURATION: &str = "conf";

/// One `<dependency>` declaration, captured as a flat attribute map.
///
/// Attributes the bot does not interpret are kept as-is; nested
/// `artifact`/`exclude` children stay in the document and are never copied
/// into the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRecord {
    attributes: BTreeMap<String, String>,
}

impl DependencyRecord {
    pub fn from_element(element: &Element) -> Self {
        element.attributes().into_iter().collect()
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn organization(&self) -> Option<&str> {
        self.get(ORGANIZATION)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME)
    }

    pub fn revision(&self) -> Option<&str> {
        self.get(REVISION)
    }

    pub fn configuration(&self) -> Option<&str> {
        self.get(CONFIGURATION)
    }

    /// `None` when either half of the identity is missing; such records
    /// never take part in staleness or duplicate matching.
    pub fn identity(&self) -> Option<Identity> {
        Some(Identity::new(self.organization()?, self.name()?))
    }
}

impl<K, V> FromIterator<(K, V)> for DependencyRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The `(organization, name)` pair. Revision is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub organization: String,
    pub name: String,
}

impl Identity {
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.organization, self.name)
    }
}
