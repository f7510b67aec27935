//! Membership lookups against the relational cache

use super::MembershipResolver;
use crate::error::Result;
use crate::sql::SqlDirectory;
use async_trait::async_trait;
use dirgate_core::{CoreError, EntityId, EntityKind};
use sqlx::sqlite::SqlitePool;

/// Reads one-hop edges and the closure tables directly
///
/// Transitive lookups read the recursive views, or the materialized tables
/// when `materialized` is set. Either way the rows are ordered by depth and
/// path key, which is breadth-first discovery order.
#[derive(Debug, Clone)]
pub struct SqlMembership {
    pool: SqlitePool,
    materialized: bool,
}

impl SqlMembership {
    pub fn new(directory: &SqlDirectory, materialized: bool) -> Self {
        Self {
            pool: directory.pool().clone(),
            materialized,
        }
    }

    fn group_closure(&self) -> &'static str {
        if self.materialized {
            "group_membership_transitive"
        } else {
            "group_membership_closure"
        }
    }

    fn user_closure(&self) -> &'static str {
        if self.materialized {
            "user_membership_transitive"
        } else {
            "user_membership_closure"
        }
    }

    async fn require(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        let sql = match kind {
            EntityKind::User => "SELECT COUNT(*) FROM users WHERE id = ?",
            _ => "SELECT COUNT(*) FROM groups WHERE id = ?",
        };
        let count: i64 = sqlx::query_scalar(sql)
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            return Err(CoreError::entity_not_found(kind, id).into());
        }
        Ok(())
    }

    async fn ids(&self, kind: EntityKind, start: &EntityId, sql: String) -> Result<Vec<EntityId>> {
        self.require(kind, start).await?;
        let ids: Vec<String> = sqlx::query_scalar(&sql)
            .bind(start.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(EntityId::from).collect())
    }
}

#[async_trait]
impl MembershipResolver for SqlMembership {
    async fn direct_parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let sql = "SELECT parent_group_id FROM group_membership WHERE member_group_id = ? ORDER BY seq";
        self.ids(EntityKind::Group, group, sql.to_string()).await
    }

    async fn transitive_parent_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let sql = format!(
            "SELECT parent_group_id FROM {} WHERE member_group_id = ? ORDER BY depth, up_key",
            self.group_closure()
        );
        self.ids(EntityKind::Group, group, sql).await
    }

    async fn direct_child_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let sql = "SELECT member_group_id FROM group_membership WHERE parent_group_id = ? ORDER BY seq";
        self.ids(EntityKind::Group, group, sql.to_string()).await
    }

    async fn transitive_child_groups_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let sql = format!(
            "SELECT member_group_id FROM {} WHERE parent_group_id = ? ORDER BY depth, down_key",
            self.group_closure()
        );
        self.ids(EntityKind::Group, group, sql).await
    }

    async fn direct_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>> {
        let sql = "SELECT parent_group_id FROM user_membership WHERE member_user_id = ? ORDER BY seq";
        self.ids(EntityKind::User, user, sql.to_string()).await
    }

    async fn transitive_groups_of_user(&self, user: &EntityId) -> Result<Vec<EntityId>> {
        let sql = format!(
            "SELECT parent_group_id FROM {} WHERE member_user_id = ? ORDER BY depth, up_key",
            self.user_closure()
        );
        self.ids(EntityKind::User, user, sql).await
    }

    async fn direct_users_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let sql = "SELECT member_user_id FROM user_membership WHERE parent_group_id = ? ORDER BY seq";
        self.ids(EntityKind::Group, group, sql.to_string()).await
    }

    async fn transitive_users_of_group(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        let sql = format!(
            "SELECT member_user_id FROM {} WHERE parent_group_id = ? ORDER BY depth, down_key",
            self.user_closure()
        );
        self.ids(EntityKind::Group, group, sql).await
    }
}
