//! Distinguished names of directory entries
//!
//! The tree is fixed: one domain root, one unit holding groups and one unit
//! holding users.
//!
//! ```text
//! dc=example,dc=com
//! ├── ou=groups   cn=<group name>,ou=groups,dc=example,dc=com
//! └── ou=users    uid=<username>,ou=users,dc=example,dc=com
//! ```

use crate::config::DirectoryConfig;
use dirgate_core::{Domain, Entity, EntityId, EntityKind, OrganizationalUnit};
use serde::{Deserialize, Serialize};

/// Target of a `member`/`memberOf` literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MemberRef {
    Group(EntityId),
    User(EntityId),
}

impl MemberRef {
    pub fn id(&self) -> &EntityId {
        match self {
            MemberRef::Group(id) | MemberRef::User(id) => id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            MemberRef::Group(_) => EntityKind::Group,
            MemberRef::User(_) => EntityKind::User,
        }
    }
}

/// One `attr=value` component, folded for comparison
fn split_rdn(rdn: &str) -> Option<(String, &str)> {
    let (attribute, value) = rdn.split_once('=')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((attribute.trim().to_ascii_lowercase(), value))
}

/// Comparable form of a DN suffix: lower-case, no whitespace around separators
fn fold_dn(dn: &str) -> Option<String> {
    let mut folded = Vec::new();
    for rdn in dn.split(',') {
        let (attribute, value) = split_rdn(rdn)?;
        folded.push(format!("{}={}", attribute, value.to_lowercase()));
    }
    Some(folded.join(","))
}

/// Maps entries to DNs and DNs back to member references
#[derive(Debug, Clone)]
pub struct DnResolver {
    base_dn: String,
    groups_ou: String,
    users_ou: String,
    groups_suffix: String,
    users_suffix: String,
}

impl DnResolver {
    pub fn new(config: &DirectoryConfig) -> Self {
        let base_dn = config.base_dn.trim().to_string();
        let groups_suffix = fold_dn(&format!("ou={},{}", config.groups_ou, base_dn)).unwrap_or_default();
        let users_suffix = fold_dn(&format!("ou={},{}", config.users_ou, base_dn)).unwrap_or_default();
        Self {
            base_dn,
            groups_ou: config.groups_ou.clone(),
            users_ou: config.users_ou.clone(),
            groups_suffix,
            users_suffix,
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// Resolve a DN to the group or user it names
    ///
    /// Returns `None` for anything outside the two entity units.
    pub fn resolve(&self, dn: &str) -> Option<MemberRef> {
        let (first, suffix) = dn.split_once(',')?;
        let (attribute, value) = split_rdn(first)?;
        let suffix = fold_dn(suffix)?;

        match attribute.as_str() {
            "cn" if suffix == self.groups_suffix => Some(MemberRef::Group(EntityId::new(value))),
            "uid" if suffix == self.users_suffix => Some(MemberRef::User(EntityId::new(value))),
            _ => None,
        }
    }

    /// DN of a group by name
    pub fn group_dn(&self, name: &str) -> String {
        format!("cn={},ou={},{}", name, self.groups_ou, self.base_dn)
    }

    /// DN of a user by username
    pub fn user_dn(&self, username: &str) -> String {
        format!("uid={},ou={},{}", username, self.users_ou, self.base_dn)
    }

    /// DN of a member reference, rendered from its id
    pub fn member_dn(&self, member: &MemberRef) -> String {
        match member {
            MemberRef::Group(id) => self.group_dn(id.as_str()),
            MemberRef::User(id) => self.user_dn(id.as_str()),
        }
    }

    /// DN of any entry
    ///
    /// Groups and users are named by `name`/`username`, whose case-folded
    /// form is their id, so `resolve` maps the DN back to the same entry.
    pub fn dn_of(&self, entity: &Entity) -> String {
        match entity {
            Entity::Domain(_) => self.base_dn.clone(),
            Entity::OrganizationalUnit(unit) => format!("ou={},{}", unit.id, self.base_dn),
            Entity::Group(group) => self.group_dn(&group.name),
            Entity::User(user) => self.user_dn(&user.username),
        }
    }

    /// The fixed structural entries of the tree
    pub fn layout(&self) -> DirectoryLayout {
        let domain = self
            .base_dn
            .split(',')
            .filter_map(split_rdn)
            .find(|(attribute, _)| attribute == "dc")
            .map(|(_, value)| value.to_string())
            .unwrap_or_else(|| self.base_dn.clone());

        DirectoryLayout {
            domain: Domain {
                id: EntityId::new(domain),
            },
            units: vec![
                OrganizationalUnit {
                    id: EntityId::new(&self.groups_ou),
                },
                OrganizationalUnit {
                    id: EntityId::new(&self.users_ou),
                },
            ],
        }
    }
}

/// Structural entries synthesized from configuration
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    pub domain: Domain,
    pub units: Vec<OrganizationalUnit>,
}

impl DirectoryLayout {
    /// Structural entries of `kind`, empty for groups and users
    pub fn entries(&self, kind: EntityKind) -> Vec<Entity> {
        match kind {
            EntityKind::Domain => vec![self.domain.clone().into()],
            EntityKind::OrganizationalUnit => self.units.iter().cloned().map(Entity::from).collect(),
            EntityKind::Group | EntityKind::User => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirgate_core::{DirectoryBackend, Group, InMemoryDirectory, User};

    fn resolver() -> DnResolver {
        DnResolver::new(&DirectoryConfig::default())
    }

    #[test]
    fn test_resolve_group_and_user() {
        let dn = resolver();
        assert_eq!(
            dn.resolve("cn=GroupA,ou=groups,dc=example,dc=com"),
            Some(MemberRef::Group(EntityId::new("groupa")))
        );
        assert_eq!(
            dn.resolve("UID=UserB, OU=Users, DC=Example, DC=com"),
            Some(MemberRef::User(EntityId::new("userb")))
        );
    }

    #[test]
    fn test_unresolvable_references() {
        let dn = resolver();
        assert_eq!(dn.resolve("cn=GroupA,ou=users,dc=example,dc=com"), None);
        assert_eq!(dn.resolve("uid=UserA,ou=groups,dc=example,dc=com"), None);
        assert_eq!(dn.resolve("cn=GroupA,ou=groups,dc=other,dc=com"), None);
        assert_eq!(dn.resolve("GroupA"), None);
        assert_eq!(dn.resolve("cn=,ou=groups,dc=example,dc=com"), None);
    }

    #[test]
    fn test_dn_round_trip() {
        let dn = resolver();
        let group = Entity::from(Group::new("GroupA"));
        let user = Entity::from(User::new("UserA"));
        assert_eq!(dn.dn_of(&group), "cn=GroupA,ou=groups,dc=example,dc=com");
        assert_eq!(dn.resolve(&dn.dn_of(&group)).map(|r| r.kind()), Some(EntityKind::Group));
        assert_eq!(dn.resolve(&dn.dn_of(&user)).map(|r| r.id().clone()), Some(EntityId::new("usera")));
    }

    #[tokio::test]
    async fn test_loaded_entries_resolve_to_themselves() {
        let json = r#"{
            "groups": [{"id": "Domain Admins", "name": "Domain Admins"}],
            "users": [{"id": "JDoe", "username": "JDoe"}]
        }"#;
        let directory = InMemoryDirectory::from_json(json).unwrap();
        let dn = resolver();

        let group = directory.require_group(&"domain admins".into()).await.unwrap();
        let rendered = dn.dn_of(&Entity::from(group.clone()));
        assert_eq!(rendered, "cn=Domain Admins,ou=groups,dc=example,dc=com");
        let reference = MemberRef::Group(group.id);
        assert_eq!(dn.resolve(&rendered), Some(reference.clone()));
        assert_eq!(dn.resolve(&dn.member_dn(&reference)), Some(reference));

        let user = directory.require_user(&"jdoe".into()).await.unwrap();
        let rendered = dn.dn_of(&Entity::from(user.clone()));
        assert_eq!(dn.resolve(&rendered), Some(MemberRef::User(user.id)));
    }

    #[test]
    fn test_layout_entries() {
        let layout = resolver().layout();
        assert_eq!(layout.domain.id.as_str(), "example");
        let units = layout.entries(EntityKind::OrganizationalUnit);
        assert_eq!(units.len(), 2);
        assert_eq!(resolver().dn_of(&units[0]), "ou=groups,dc=example,dc=com");
        assert!(layout.entries(EntityKind::User).is_empty());
    }
}
