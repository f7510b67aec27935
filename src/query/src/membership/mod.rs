//! Group membership resolution
//!
//! Direct lookups follow one hop of the membership graph; transitive lookups
//! return the closure in breadth-first discovery order:
//!
//! - start from the root's direct edges, in backend storage order
//! - visit each discovered node's own edges in storage order before moving
//!   one level deeper
//! - never revisit a `(kind, id)` node, so cycles terminate
//! - the start node is never part of its own closure
//!
//! [`GraphMembership`] walks any [`DirectoryBackend`]; [`SqlMembership`]
//! reads the closure tables of the relational cache. Both return identical
//! sequences for the same data.
//!
//! [`DirectoryBackend`]: dirgate_core::DirectoryBackend

mod graph;
mod sql;

pub use graph::GraphMembership;
pub use sql::SqlMembership;

use crate::dn::MemberRef;
use crate::error::Result;
use async_trait::async_trait;
use dirgate_core::EntityId;

/// Direct and transitive membership lookups
///
/// Unknown start ids fail with `EntityNotFound`; an isolated entity yields
/// an empty list.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    /// Groups that directly contain `group`
    async fn direct_parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Every group that contains `group`, at any depth
    async fn transitive_parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Groups that are direct members of `group`
    async fn direct_child_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Every group nested in `group`, at any depth
    async fn transitive_child_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Groups that directly contain `user`
    async fn direct_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>>;

    /// Every group containing `user`, at any depth
    async fn transitive_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>>;

    /// Users that are direct members of `group`
    async fn direct_users_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Users of `group` and of every group nested in it
    async fn transitive_users_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    async fn parent_groups_of_group(&self, group: &EntityId, flatten: bool) -> Result<Vec<EntityId>> {
        if flatten {
            self.transitive_parent_groups_of_group(group).await
        } else {
            self.direct_parent_groups_of_group(group).await
        }
    }

    async fn child_groups_of_group(&self, group: &EntityId, flatten: bool) -> Result<Vec<EntityId>> {
        if flatten {
            self.transitive_child_groups_of_group(group).await
        } else {
            self.direct_child_groups_of_group(group).await
        }
    }

    async fn groups_of_user(&self, user: &EntityId, flatten: bool) -> Result<Vec<EntityId>> {
        if flatten {
            self.transitive_groups_of_user(user).await
        } else {
            self.direct_groups_of_user(user).await
        }
    }

    async fn users_of_group(&self, group: &EntityId, flatten: bool) -> Result<Vec<EntityId>> {
        if flatten {
            self.transitive_users_of_group(group).await
        } else {
            self.direct_users_of_group(group).await
        }
    }

    /// Whether `member` is a direct member of `group`
    async fn is_direct_member(&self, group: &EntityId, member: &MemberRef) -> Result<bool> {
        let members = match member {
            MemberRef::Group(_) => self.direct_child_groups_of_group(group).await?,
            MemberRef::User(_) => self.direct_users_of_group(group).await?,
        };
        Ok(members.contains(member.id()))
    }

    /// Whether `member` belongs to `group` or to any group nested in it
    async fn is_transitive_member(&self, group: &EntityId, member: &MemberRef) -> Result<bool> {
        let members = match member {
            MemberRef::Group(_) => self.transitive_child_groups_of_group(group).await?,
            MemberRef::User(_) => self.transitive_users_of_group(group).await?,
        };
        Ok(members.contains(member.id()))
    }
}
