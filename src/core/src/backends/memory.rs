//! Fixture-backed in-memory directory

use crate::error::{CoreError, Result};
use crate::traits::DirectoryBackend;
use crate::types::{EntityId, Group, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One membership edge `parent -> member`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEdge {
    pub parent: EntityId,
    pub member: EntityId,
}

/// Serializable snapshot of a directory, the fixture file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub users: Vec<User>,
    /// Group-in-group edges, in insertion order
    #[serde(default)]
    pub group_members: Vec<MembershipEdge>,
    /// User-in-group edges, in insertion order
    #[serde(default)]
    pub user_members: Vec<MembershipEdge>,
}

/// In-memory directory built from fixtures
///
/// Entities are kept sorted by id; membership edges keep insertion order,
/// which is the order one-hop lookups return them in.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    groups: BTreeMap<EntityId, Group>,
    users: BTreeMap<EntityId, User>,
    group_members: Vec<MembershipEdge>,
    user_members: Vec<MembershipEdge>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a snapshot
    ///
    /// Every group id must be its case-folded name and every user id its
    /// case-folded username; entries are addressed by those names.
    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Result<Self> {
        for group in &snapshot.groups {
            check_id(&group.id, &group.name)?;
        }
        for user in &snapshot.users {
            check_id(&user.id, &user.username)?;
        }

        let mut directory = Self::new();
        for group in snapshot.groups {
            directory.add_group(group);
        }
        for user in snapshot.users {
            directory.add_user(user);
        }
        for edge in snapshot.group_members {
            directory.add_group_member(edge.parent, edge.member);
        }
        for edge in snapshot.user_members {
            directory.add_user_member(edge.parent, edge.member);
        }
        Ok(directory)
    }

    /// Parse a JSON fixture
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: DirectorySnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    /// Load a JSON fixture file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let path = path.as_ref().display();
        Self::from_json(&contents).map_err(|e| match e {
            CoreError::Invalid(msg) => CoreError::invalid(format!("{}: {}", path, msg)),
            other => CoreError::serialization(format!("{}: {}", path, other)),
        })
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot {
            groups: self.groups.values().cloned().collect(),
            users: self.users.values().cloned().collect(),
            group_members: self.group_members.clone(),
            user_members: self.user_members.clone(),
        }
    }

    pub fn add_group(&mut self, group: Group) -> &mut Self {
        self.groups.insert(group.id.clone(), group);
        self
    }

    pub fn add_user(&mut self, user: User) -> &mut Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    /// Record `member` as a direct member group of `parent`; duplicates are ignored
    pub fn add_group_member(&mut self, parent: impl Into<EntityId>, member: impl Into<EntityId>) -> &mut Self {
        push_edge(&mut self.group_members, parent.into(), member.into());
        self
    }

    /// Record `member` as a direct member user of `parent`; duplicates are ignored
    pub fn add_user_member(&mut self, parent: impl Into<EntityId>, member: impl Into<EntityId>) -> &mut Self {
        push_edge(&mut self.user_members, parent.into(), member.into());
        self
    }
}

fn check_id(id: &EntityId, name: &str) -> Result<()> {
    if *id != EntityId::new(name) {
        return Err(CoreError::invalid(format!(
            "entry id {} does not match its name {}",
            id, name
        )));
    }
    Ok(())
}

fn push_edge(edges: &mut Vec<MembershipEdge>, parent: EntityId, member: EntityId) {
    let edge = MembershipEdge { parent, member };
    if !edges.contains(&edge) {
        edges.push(edge);
    }
}

fn members_of(edges: &[MembershipEdge], parent: &EntityId) -> Vec<EntityId> {
    edges
        .iter()
        .filter(|e| &e.parent == parent)
        .map(|e| e.member.clone())
        .collect()
}

fn parents_of(edges: &[MembershipEdge], member: &EntityId) -> Vec<EntityId> {
    edges
        .iter()
        .filter(|e| &e.member == member)
        .map(|e| e.parent.clone())
        .collect()
}

#[async_trait]
impl DirectoryBackend for InMemoryDirectory {
    async fn group(&self, id: &EntityId) -> Result<Option<Group>> {
        Ok(self.groups.get(id).cloned())
    }

    async fn user(&self, id: &EntityId) -> Result<Option<User>> {
        Ok(self.users.get(id).cloned())
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.values().cloned().collect())
    }

    async fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.values().cloned().collect())
    }

    async fn member_groups_of(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        Ok(members_of(&self.group_members, group))
    }

    async fn member_users_of(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        Ok(members_of(&self.user_members, group))
    }

    async fn parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        Ok(parents_of(&self.group_members, group))
    }

    async fn parent_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>> {
        Ok(parents_of(&self.user_members, user))
    }
}
