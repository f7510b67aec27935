//! Directory backend trait

use crate::error::{CoreError, Result};
use crate::types::{EntityId, EntityKind, Group, User};
use async_trait::async_trait;

/// Primitive lookups every identity source must supply
///
/// Edges are one hop only; closure over them is computed by the query layer.
/// Edge lists are returned in the backend's stable storage order.
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Look up a group by id
    async fn group(&self, id: &EntityId) -> Result<Option<Group>>;

    /// Look up a user by id
    async fn user(&self, id: &EntityId) -> Result<Option<User>>;

    /// All groups, ordered by id
    async fn groups(&self) -> Result<Vec<Group>>;

    /// All users, ordered by id
    async fn users(&self) -> Result<Vec<User>>;

    /// Groups that are direct members of `group`
    async fn member_groups_of(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Users that are direct members of `group`
    async fn member_users_of(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Groups that directly contain `group`
    async fn parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Groups that directly contain `user`
    async fn parent_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>>;

    /// Look up a group, failing with `EntityNotFound`
    async fn require_group(&self, id: &EntityId) -> Result<Group> {
        self.group(id)
            .await?
            .ok_or_else(|| CoreError::entity_not_found(EntityKind::Group, id))
    }

    /// Look up a user, failing with `EntityNotFound`
    async fn require_user(&self, id: &EntityId) -> Result<User> {
        self.user(id)
            .await?
            .ok_or_else(|| CoreError::entity_not_found(EntityKind::User, id))
    }
}
