//! In-memory filter interpreter
//!
//! Evaluates a query tree against one entity at a time. `member` and
//! `memberOf` predicates go through a [`MembershipResolver`]; everything else
//! is decided from the entity's own fields.

use crate::ast::{EqualMatch, PresenceMatch, QueryExpression, WildcardMatch};
use crate::dn::{DnResolver, MemberRef};
use crate::error::Result;
use crate::membership::MembershipResolver;
use crate::normalize::project_for_entity_kind;
use crate::schema::{role_of, AttributeRole, Relation};
use dirgate_core::{DirectoryBackend, Entity, EntityId};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::warn;

/// Interpreter flags
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Resolve membership through the transitive closure
    pub flattening: bool,
    /// Inactive users do not count as members
    pub active_users_only: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            flattening: true,
            active_users_only: true,
        }
    }
}

/// Filter interpreter
pub struct FilterMatcher {
    backend: Arc<dyn DirectoryBackend>,
    membership: Arc<dyn MembershipResolver>,
    dn: DnResolver,
    options: MatchOptions,
}

impl FilterMatcher {
    pub fn new(
        backend: Arc<dyn DirectoryBackend>,
        membership: Arc<dyn MembershipResolver>,
        dn: DnResolver,
        options: MatchOptions,
    ) -> Self {
        Self {
            backend,
            membership,
            dn,
            options,
        }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn membership(&self) -> &Arc<dyn MembershipResolver> {
        &self.membership
    }

    /// Whether `entity` satisfies `node`
    ///
    /// `And` needs every child, `Or` any child, `Not` no child. Attribute
    /// and kind combinations outside the schema never match.
    pub fn match_entity<'a>(
        &'a self,
        entity: &'a Entity,
        node: &'a QueryExpression,
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            match node {
                QueryExpression::BooleanValue(value) => Ok(*value),
                QueryExpression::And(children) => {
                    for child in children {
                        if !self.match_entity(entity, child).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                QueryExpression::Or(children) => {
                    for child in children {
                        if self.match_entity(entity, child).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                QueryExpression::Not(children) => {
                    for child in children {
                        if self.match_entity(entity, child).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                QueryExpression::Equal(op) => self.equal(entity, node, op).await,
                QueryExpression::Wildcard(op) => Ok(self.wildcard(entity, node, op)),
                QueryExpression::Presence(op) => self.presence(entity, node, op).await,
            }
        }
        .boxed()
    }

    /// Users among `ids` that count as members
    pub async fn visible_users(&self, ids: Vec<EntityId>) -> Result<Vec<EntityId>> {
        if !self.options.active_users_only {
            return Ok(ids);
        }
        let mut visible = Vec::with_capacity(ids.len());
        for id in ids {
            if self.is_visible_user(&id).await? {
                visible.push(id);
            }
        }
        Ok(visible)
    }

    async fn is_visible_user(&self, id: &EntityId) -> Result<bool> {
        if !self.options.active_users_only {
            return Ok(true);
        }
        Ok(self.backend.user(id).await?.map_or(false, |user| user.active))
    }

    /// Groups containing `entity`
    pub async fn groups_of(&self, entity: &Entity) -> Result<Vec<EntityId>> {
        let flatten = self.options.flattening;
        match entity {
            Entity::User(user) => self.membership.groups_of_user(&user.id, flatten).await,
            Entity::Group(group) => self.membership.parent_groups_of_group(&group.id, flatten).await,
            _ => Ok(Vec::new()),
        }
    }

    fn object_class(entity: &Entity, node: &QueryExpression) -> bool {
        matches!(
            project_for_entity_kind(entity.kind(), node),
            QueryExpression::BooleanValue(true)
        )
    }

    async fn equal(&self, entity: &Entity, node: &QueryExpression, op: &EqualMatch) -> Result<bool> {
        match role_of(entity.kind(), &op.attribute) {
            AttributeRole::Field(field) => Ok(match field.value_of(entity) {
                Some(value) => op.check(value),
                None => op.negated,
            }),
            AttributeRole::ObjectClass => Ok(Self::object_class(entity, node)),
            AttributeRole::Membership(relation) => self.membership_equal(entity, relation, op).await,
            AttributeRole::NotApplicable => Ok(false),
        }
    }

    fn wildcard(&self, entity: &Entity, node: &QueryExpression, op: &WildcardMatch) -> bool {
        match role_of(entity.kind(), &op.attribute) {
            AttributeRole::Field(field) => match field.value_of(entity) {
                Some(value) => op.check(value),
                None => op.negated,
            },
            AttributeRole::ObjectClass => Self::object_class(entity, node),
            AttributeRole::Membership(_) | AttributeRole::NotApplicable => false,
        }
    }

    async fn presence(&self, entity: &Entity, node: &QueryExpression, op: &PresenceMatch) -> Result<bool> {
        let flatten = self.options.flattening;
        let present = match role_of(entity.kind(), &op.attribute) {
            AttributeRole::Field(field) => field.value_of(entity).is_some(),
            AttributeRole::ObjectClass => return Ok(Self::object_class(entity, node)),
            AttributeRole::Membership(Relation::MemberOf) => !self.groups_of(entity).await?.is_empty(),
            AttributeRole::Membership(Relation::Member) => {
                let group = entity.id();
                !self.membership.child_groups_of_group(group, flatten).await?.is_empty()
                    || !self
                        .visible_users(self.membership.users_of_group(group, flatten).await?)
                        .await?
                        .is_empty()
            }
            AttributeRole::NotApplicable => false,
        };
        Ok(op.check(present))
    }

    /// `member`/`memberOf` against a literal entry reference
    ///
    /// References that do not name a usable entry never match, whatever the
    /// negation flag.
    async fn membership_equal(&self, entity: &Entity, relation: Relation, op: &EqualMatch) -> Result<bool> {
        let Some(reference) = self.dn.resolve(&op.value) else {
            warn!(value = %op.value, kind = %entity.kind(), "unresolvable member reference");
            return Ok(false);
        };

        let is_member = match (relation, &reference) {
            (Relation::MemberOf, MemberRef::Group(group)) => self.groups_of(entity).await?.contains(group),
            (Relation::Member, member) => {
                let visible = match member {
                    MemberRef::User(user) => self.is_visible_user(user).await?,
                    MemberRef::Group(_) => true,
                };
                visible && self.is_member(entity.id(), member).await?
            }
            (Relation::MemberOf, MemberRef::User(_)) => {
                warn!(value = %op.value, "memberOf cannot reference a user");
                return Ok(false);
            }
        };
        Ok(is_member != op.negated)
    }

    async fn is_member(&self, group: &EntityId, member: &MemberRef) -> Result<bool> {
        if self.options.flattening {
            self.membership.is_transitive_member(group, member).await
        } else {
            self.membership.is_direct_member(group, member).await
        }
    }
}
