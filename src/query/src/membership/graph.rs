//! Breadth-first membership walk over one-hop backend edges

use super::MembershipResolver;
use crate::error::Result;
use async_trait::async_trait;
use dirgate_core::{DirectoryBackend, EntityId, EntityKind};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
enum Direction {
    /// Towards containing groups
    Up,
    /// Towards nested groups
    Down,
}

/// Visited set keyed by `(kind, id)`
#[derive(Default)]
struct Visited(HashSet<(EntityKind, EntityId)>);

impl Visited {
    /// Mark a node, returning `true` the first time it is seen
    fn insert(&mut self, kind: EntityKind, id: &EntityId) -> bool {
        self.0.insert((kind, id.clone()))
    }
}

/// Membership resolver that walks the backend graph
///
/// Each walk is O(V + E) in backend lookups and holds no state between
/// calls; put a `CachedDirectory` underneath to reuse one-hop results.
pub struct GraphMembership {
    backend: Arc<dyn DirectoryBackend>,
}

impl GraphMembership {
    pub fn new(backend: Arc<dyn DirectoryBackend>) -> Self {
        Self { backend }
    }

    async fn step(&self, direction: Direction, group: &EntityId) -> Result<Vec<EntityId>> {
        let next = match direction {
            Direction::Up => self.backend.parent_groups_of_group(group).await?,
            Direction::Down => self.backend.member_groups_of(group).await?,
        };
        Ok(next)
    }

    /// Groups reachable from `roots`, in first-discovery order
    ///
    /// `roots` come first, then each level in turn. Nodes already in
    /// `visited` are skipped.
    async fn walk(
        &self,
        direction: Direction,
        roots: Vec<EntityId>,
        visited: &mut Visited,
    ) -> Result<Vec<EntityId>> {
        let mut found = Vec::new();
        let mut queue = VecDeque::new();

        for root in roots {
            if visited.insert(EntityKind::Group, &root) {
                found.push(root.clone());
                queue.push_back(root);
            }
        }

        while let Some(current) = queue.pop_front() {
            for next in self.step(direction, &current).await? {
                if visited.insert(EntityKind::Group, &next) {
                    found.push(next.clone());
                    queue.push_back(next);
                }
            }
        }

        trace!(?direction, discovered = found.len(), "membership walk finished");
        Ok(found)
    }

    /// Closure of `group` along `direction`, excluding `group` itself
    async fn group_closure(&self, group: &EntityId, direction: Direction) -> Result<Vec<EntityId>> {
        self.backend.require_group(group).await?;
        let mut visited = Visited::default();
        visited.insert(EntityKind::Group, group);
        let roots = self.step(direction, group).await?;
        self.walk(direction, roots, &mut visited).await
    }
}

#[async_trait]
impl MembershipResolver for GraphMembership {
    async fn direct_parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.backend.require_group(group).await?;
        Ok(dedup_excluding(self.backend.parent_groups_of_group(group).await?, group))
    }

    async fn transitive_parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.group_closure(group, Direction::Up).await
    }

    async fn direct_child_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.backend.require_group(group).await?;
        Ok(dedup_excluding(self.backend.member_groups_of(group).await?, group))
    }

    async fn transitive_child_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.group_closure(group, Direction::Down).await
    }

    async fn direct_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>> {
        self.backend.require_user(user).await?;
        let mut visited = Visited::default();
        Ok(self
            .backend
            .parent_groups_of_user(user)
            .await?
            .into_iter()
            .filter(|group| visited.insert(EntityKind::Group, group))
            .collect())
    }

    async fn transitive_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>> {
        self.backend.require_user(user).await?;
        let mut visited = Visited::default();
        visited.insert(EntityKind::User, user);
        let roots = self.backend.parent_groups_of_user(user).await?;
        self.walk(Direction::Up, roots, &mut visited).await
    }

    async fn direct_users_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        self.backend.require_group(group).await?;
        let mut visited = Visited::default();
        Ok(self
            .backend
            .member_users_of(group)
            .await?
            .into_iter()
            .filter(|user| visited.insert(EntityKind::User, user))
            .collect())
    }

    async fn transitive_users_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let nested = self.group_closure(group, Direction::Down).await?;

        let mut visited = Visited::default();
        let mut users = Vec::new();
        for current in std::iter::once(group).chain(nested.iter()) {
            for user in self.backend.member_users_of(current).await? {
                if visited.insert(EntityKind::User, &user) {
                    users.push(user);
                }
            }
        }
        Ok(users)
    }
}

/// Drop duplicates and self-loops from a one-hop edge list
fn dedup_excluding(ids: Vec<EntityId>, start: &EntityId) -> Vec<EntityId> {
    let mut visited = Visited::default();
    visited.insert(EntityKind::Group, start);
    ids.into_iter()
        .filter(|id| visited.insert(EntityKind::Group, id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::MemberRef;
    use dirgate_core::{Group, InMemoryDirectory, User};

    fn ids(names: &[&str]) -> Vec<EntityId> {
        names.iter().map(EntityId::new).collect()
    }

    fn diamond() -> GraphMembership {
        let mut directory = InMemoryDirectory::new();
        for name in ["Top", "Left", "Right", "Bottom"] {
            directory.add_group(Group::new(name));
        }
        directory
            .add_user(User::new("u1"))
            .add_user(User::new("u2"))
            .add_group_member("Top", "Left")
            .add_group_member("Top", "Right")
            .add_group_member("Left", "Bottom")
            .add_group_member("Right", "Bottom")
            .add_group_member("Bottom", "Bottom")
            .add_user_member("Bottom", "u1")
            .add_user_member("Right", "u2")
            .add_user_member("Left", "u1");
        GraphMembership::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn test_diamond_is_discovered_once() {
        let graph = diamond();
        let nested = graph.transitive_child_groups_of_group(&"top".into()).await.unwrap();
        assert_eq!(nested, ids(&["left", "right", "bottom"]));

        let parents = graph.transitive_parent_groups_of_group(&"bottom".into()).await.unwrap();
        assert_eq!(parents, ids(&["left", "right", "top"]));
    }

    #[tokio::test]
    async fn test_self_loop_excluded() {
        let graph = diamond();
        let direct = graph.direct_child_groups_of_group(&"bottom".into()).await.unwrap();
        assert!(direct.is_empty());
    }

    #[tokio::test]
    async fn test_users_follow_group_discovery_order() {
        let graph = diamond();
        let users = graph.transitive_users_of_group(&"top".into()).await.unwrap();
        // Left is discovered first and contains u1
        assert_eq!(users, ids(&["u1", "u2"]));

        let groups = graph.transitive_groups_of_user(&"u1".into()).await.unwrap();
        assert_eq!(groups, ids(&["bottom", "left", "right", "top"]));
    }

    #[tokio::test]
    async fn test_membership_tests() {
        let graph = diamond();
        let top = EntityId::new("top");
        let u1 = MemberRef::User(EntityId::new("u1"));
        assert!(!graph.is_direct_member(&top, &u1).await.unwrap());
        assert!(graph.is_transitive_member(&top, &u1).await.unwrap());

        let bottom = MemberRef::Group(EntityId::new("bottom"));
        assert!(graph.is_transitive_member(&top, &bottom).await.unwrap());
        assert!(!graph.is_transitive_member(&EntityId::new("bottom"), &bottom).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_start_is_not_found() {
        let graph = diamond();
        let err = graph.transitive_users_of_group(&"nobody".into()).await.unwrap_err();
        assert!(err.is_not_found());
        let err = graph.direct_groups_of_user(&"nobody".into()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
