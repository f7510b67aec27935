//! Entity identifiers and kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-insensitive entity identifier, stored lower-case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create a new entity ID, folding it to lower case
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        EntityId(id.as_ref().to_lowercase())
    }

    /// Get the entity ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::new(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::new(s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EntityId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for EntityId {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// The four fixed kinds of directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Root domain entry (`dc=...`)
    Domain,
    /// Organizational unit holding groups or users (`ou=...`)
    OrganizationalUnit,
    /// Group entry
    Group,
    /// User entry
    User,
}

impl EntityKind {
    /// All kinds, in tree order
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Domain,
        EntityKind::OrganizationalUnit,
        EntityKind::Group,
        EntityKind::User,
    ];

    /// Stable lower-case name, also used as the SQL discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::OrganizationalUnit => "organizational_unit",
            EntityKind::Group => "group",
            EntityKind::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "domain" => Ok(EntityKind::Domain),
            "organizational_unit" | "unit" | "ou" => Ok(EntityKind::OrganizationalUnit),
            "group" => Ok(EntityKind::Group),
            "user" => Ok(EntityKind::User),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}
