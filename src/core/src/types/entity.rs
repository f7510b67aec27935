//! Directory entity records

use super::id::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// Domain root entry
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: EntityId,
}

/// Organizational unit entry
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub id: EntityId,
}

/// Group entry
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,

    /// Display form of the group name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Group {
    /// Create a group whose id is the lower-cased name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: EntityId::new(&name),
            name,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// User entry
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,

    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Create an active user whose id is the lower-cased username
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: EntityId::new(&username),
            username,
            last_name: None,
            first_name: None,
            display_name: None,
            email: None,
            active: true,
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let first_name = first_name.into();
        let last_name = last_name.into();
        self.display_name = Some(format!("{} {}", first_name, last_name));
        self.first_name = Some(first_name);
        self.last_name = Some(last_name);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

macro_rules! identity_by_id {
    ($($ty:ty),*) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.id == other.id
                }
            }

            impl std::hash::Hash for $ty {
                fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                    self.id.hash(state);
                }
            }
        )*
    };
}

identity_by_id!(Domain, OrganizationalUnit, Group, User);

/// Any directory entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Domain(Domain),
    OrganizationalUnit(OrganizationalUnit),
    Group(Group),
    User(User),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Domain(d) => &d.id,
            Entity::OrganizationalUnit(u) => &u.id,
            Entity::Group(g) => &g.id,
            Entity::User(u) => &u.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Domain(_) => EntityKind::Domain,
            Entity::OrganizationalUnit(_) => EntityKind::OrganizationalUnit,
            Entity::Group(_) => EntityKind::Group,
            Entity::User(_) => EntityKind::User,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Entity::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Entity::User(u) => Some(u),
            _ => None,
        }
    }
}

impl From<Domain> for Entity {
    fn from(domain: Domain) -> Self {
        Entity::Domain(domain)
    }
}

impl From<OrganizationalUnit> for Entity {
    fn from(unit: OrganizationalUnit) -> Self {
        Entity::OrganizationalUnit(unit)
    }
}

impl From<Group> for Entity {
    fn from(group: Group) -> Self {
        Entity::Group(group)
    }
}

impl From<User> for Entity {
    fn from(user: User) -> Self {
        Entity::User(user)
    }
}
