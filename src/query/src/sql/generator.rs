//! Filter to SQL compiler
//!
//! # Pipeline
//!
//! ```text
//! expr → normalize(kind) → JoinPlan(kind, flattening) → SELECT … FROM
//!      → LEFT JOINs (direct | materialized closure | recursive view)
//!      → WHERE <translated tree> [AND active users] → ORDER BY id
//! ```
//!
//! Every literal is bound as a parameter. Negated field comparisons treat a
//! missing value as "does not match", so `NULL` columns satisfy them.

use super::query::{BindValue, ParameterizedQuery};
use crate::ast::{EqualMatch, PresenceMatch, QueryExpression, WildcardMatch, LIKE_ESCAPE};
use crate::dn::{DnResolver, MemberRef};
use crate::error::{QueryError, Result};
use crate::normalize::normalize;
use crate::schema::{role_of, table_of, AttributeRole, Field, Relation};
use dirgate_core::EntityKind;
use tracing::{debug, warn};

/// Compilation flags
#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    /// Resolve membership through the transitive closure
    pub flattening: bool,
    /// Read the closure from the materialized tables instead of the views
    pub use_materialized_views: bool,
    /// Hide inactive users, as entries and as members
    pub active_users_only: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            flattening: true,
            use_materialized_views: false,
            active_users_only: true,
        }
    }
}

/// Bitmask of the membership joins a compiled query needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPlan(u8);

impl JoinPlan {
    /// Groups containing the entity (`memberOf`)
    pub const PARENT_GROUPS: u8 = 0b0001;
    /// Groups nested in the entity (`member`)
    pub const CHILD_GROUPS: u8 = 0b0010;
    /// Users in the entity (`member`)
    pub const MEMBER_USERS: u8 = 0b0100;
    /// Joins read the transitive closure
    pub const TRANSITIVE: u8 = 0b1000;

    pub fn for_kind(kind: EntityKind, flattening: bool) -> Option<Self> {
        let joins = match kind {
            EntityKind::User => Self::PARENT_GROUPS,
            EntityKind::Group => Self::PARENT_GROUPS | Self::CHILD_GROUPS | Self::MEMBER_USERS,
            EntityKind::Domain | EntityKind::OrganizationalUnit => return None,
        };
        Some(JoinPlan(if flattening { joins | Self::TRANSITIVE } else { joins }))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    pub fn transitive(&self) -> bool {
        self.contains(Self::TRANSITIVE)
    }
}

/// Compiles query trees into parameterized SQL against the relational cache
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    options: GeneratorOptions,
    dn: DnResolver,
}

impl QueryGenerator {
    pub fn new(options: GeneratorOptions, dn: DnResolver) -> Self {
        Self { options, dn }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Compile `expr` into a query returning every matching `kind` entry
    pub fn generate(&self, kind: EntityKind, expr: &QueryExpression) -> Result<ParameterizedQuery> {
        let plan = JoinPlan::for_kind(kind, self.options.flattening)
            .ok_or(QueryError::UnsupportedEntityKind(kind))?;
        let table = table_of(kind).ok_or(QueryError::UnsupportedEntityKind(kind))?;
        let normalized = normalize(kind, expr);

        let mut emitter = Emitter {
            generator: self,
            kind,
            plan,
            sql: String::with_capacity(512),
            binds: Vec::new(),
        };
        emitter.select(table);
        emitter.joins();
        emitter.sql.push_str(" WHERE ");
        emitter.expression(&normalized)?;
        if kind == EntityKind::User {
            emitter.sql.push_str(" AND (? = 0 OR e.active = 1)");
            emitter.binds.push(BindValue::Bool(self.options.active_users_only));
        }
        emitter.order_by();

        debug!(
            %kind,
            plan = plan.bits(),
            binds = emitter.binds.len(),
            sql = %emitter.sql,
            "compiled filter"
        );

        Ok(ParameterizedQuery::new(kind, emitter.sql, emitter.binds))
    }

    fn group_table(&self, transitive: bool) -> &'static str {
        match (transitive, self.options.use_materialized_views) {
            (false, _) => "group_membership",
            (true, true) => "group_membership_transitive",
            (true, false) => "group_membership_closure",
        }
    }

    fn user_table(&self, transitive: bool) -> &'static str {
        match (transitive, self.options.use_materialized_views) {
            (false, _) => "user_membership",
            (true, true) => "user_membership_transitive",
            (true, false) => "user_membership_closure",
        }
    }
}

/// Order columns of a membership join, `up` when walking towards parents
fn order_columns(alias: &str, transitive: bool, up: bool) -> String {
    match (transitive, up) {
        (false, _) => format!("{alias}.seq"),
        (true, true) => format!("{alias}.depth, {alias}.up_key"),
        (true, false) => format!("{alias}.depth, {alias}.down_key"),
    }
}

struct Emitter<'a> {
    generator: &'a QueryGenerator,
    kind: EntityKind,
    plan: JoinPlan,
    sql: String,
    binds: Vec<BindValue>,
}

impl Emitter<'_> {
    fn bind(&mut self, value: BindValue) {
        self.sql.push('?');
        self.binds.push(value);
    }

    fn select(&mut self, table: &str) {
        let columns = match self.kind {
            EntityKind::User => {
                "e.id, e.username, e.last_name, e.first_name, e.display_name, e.email, e.active"
            }
            _ => "e.id, e.name, e.description",
        };
        let member_group = if self.plan.contains(JoinPlan::CHILD_GROUPS) {
            "cg.member_group_id"
        } else {
            "NULL"
        };
        let member_user = if self.plan.contains(JoinPlan::MEMBER_USERS) {
            "cu.member_user_id"
        } else {
            "NULL"
        };
        self.sql.push_str(&format!(
            "SELECT '{}' AS entity_kind, {}, pm.parent_group_id AS member_of, \
             {} AS member_group, {} AS member_user FROM {} e",
            self.kind, columns, member_group, member_user, table
        ));
    }

    fn joins(&mut self) {
        let transitive = self.plan.transitive();
        let groups = self.generator.group_table(transitive);
        let users = self.generator.user_table(transitive);

        if self.plan.contains(JoinPlan::PARENT_GROUPS) {
            let join = match self.kind {
                EntityKind::User => format!(" LEFT JOIN {users} pm ON pm.member_user_id = e.id"),
                _ => format!(" LEFT JOIN {groups} pm ON pm.member_group_id = e.id"),
            };
            self.sql.push_str(&join);
        }
        if self.plan.contains(JoinPlan::CHILD_GROUPS) {
            self.sql.push_str(&format!(" LEFT JOIN {groups} cg ON cg.parent_group_id = e.id"));
        }
        if self.plan.contains(JoinPlan::MEMBER_USERS) {
            self.sql.push_str(&format!(
                " LEFT JOIN {users} cu ON cu.parent_group_id = e.id \
                 AND (? = 0 OR cu.member_user_id IN (SELECT id FROM users WHERE active = 1))"
            ));
            self.binds.push(BindValue::Bool(self.generator.options.active_users_only));
        }
    }

    fn order_by(&mut self) {
        let transitive = self.plan.transitive();
        self.sql.push_str(" ORDER BY e.id");
        for (flag, alias, up) in [
            (JoinPlan::PARENT_GROUPS, "pm", true),
            (JoinPlan::CHILD_GROUPS, "cg", false),
            (JoinPlan::MEMBER_USERS, "cu", false),
        ] {
            if self.plan.contains(flag) {
                self.sql.push_str(&format!(", {}", order_columns(alias, transitive, up)));
            }
        }
    }

    fn expression(&mut self, expr: &QueryExpression) -> Result<()> {
        match expr {
            QueryExpression::BooleanValue(value) => self.bind(BindValue::Bool(*value)),
            QueryExpression::And(children) if children.is_empty() => self.bind(BindValue::Bool(true)),
            QueryExpression::Or(children) if children.is_empty() => self.bind(BindValue::Bool(false)),
            QueryExpression::Not(children) if children.is_empty() => self.bind(BindValue::Bool(true)),
            QueryExpression::And(children) => self.junction(children, " and ")?,
            QueryExpression::Or(children) => self.junction(children, " or ")?,
            QueryExpression::Not(children) => {
                self.sql.push_str("not ");
                self.junction(children, " or ")?;
            }
            QueryExpression::Equal(op) => self.equal(op)?,
            QueryExpression::Wildcard(op) => self.wildcard(op)?,
            QueryExpression::Presence(op) => self.presence(op)?,
        }
        Ok(())
    }

    fn junction(&mut self, children: &[QueryExpression], separator: &str) -> Result<()> {
        self.sql.push('(');
        for (index, child) in children.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(separator);
            }
            self.expression(child)?;
        }
        self.sql.push(')');
        Ok(())
    }

    fn role(&self, attribute: &str) -> AttributeRole {
        role_of(self.kind, attribute)
    }

    fn unprojected(&self, attribute: &str) -> QueryError {
        QueryError::contract_violation(format!(
            "attribute {} has no column for {} entries",
            attribute, self.kind
        ))
    }

    fn column(&self, field: Field, ignore_case: bool) -> String {
        if ignore_case {
            format!("lower(e.{})", field.column())
        } else {
            format!("e.{}", field.column())
        }
    }

    fn equal(&mut self, op: &EqualMatch) -> Result<()> {
        match self.role(&op.attribute) {
            AttributeRole::Field(field) => {
                let column = self.column(field, op.ignore_case);
                let value = if op.ignore_case {
                    op.value.to_lowercase()
                } else {
                    op.value.clone()
                };
                if op.negated {
                    self.sql.push_str(&format!("(e.{} is null or {} <> ", field.column(), column));
                    self.bind(BindValue::Text(value));
                    self.sql.push(')');
                } else {
                    self.sql.push_str(&format!("{} = ", column));
                    self.bind(BindValue::Text(value));
                }
                Ok(())
            }
            AttributeRole::Membership(relation) => {
                self.membership(relation, op);
                Ok(())
            }
            AttributeRole::ObjectClass | AttributeRole::NotApplicable => Err(self.unprojected(&op.attribute)),
        }
    }

    fn wildcard(&mut self, op: &WildcardMatch) -> Result<()> {
        let AttributeRole::Field(field) = self.role(&op.attribute) else {
            return Err(self.unprojected(&op.attribute));
        };
        let column = self.column(field, op.ignore_case);
        if op.negated {
            self.sql.push_str(&format!("(e.{} is null or {} not like ", field.column(), column));
            self.bind(BindValue::Text(op.like_pattern()));
            self.sql.push_str(&format!(" escape '{}')", LIKE_ESCAPE));
        } else {
            self.sql.push_str(&format!("{} like ", column));
            self.bind(BindValue::Text(op.like_pattern()));
            self.sql.push_str(&format!(" escape '{}'", LIKE_ESCAPE));
        }
        Ok(())
    }

    fn presence(&mut self, op: &PresenceMatch) -> Result<()> {
        let (present, absent) = match self.role(&op.attribute) {
            AttributeRole::Field(field) => (
                format!("e.{} is not null", field.column()),
                format!("e.{} is null", field.column()),
            ),
            AttributeRole::Membership(Relation::MemberOf) => (
                "pm.parent_group_id is not null".to_string(),
                "pm.parent_group_id is null".to_string(),
            ),
            AttributeRole::Membership(Relation::Member) => (
                "(cg.member_group_id is not null or cu.member_user_id is not null)".to_string(),
                "(cg.member_group_id is null and cu.member_user_id is null)".to_string(),
            ),
            AttributeRole::ObjectClass | AttributeRole::NotApplicable => {
                return Err(self.unprojected(&op.attribute))
            }
        };
        self.sql.push_str(if op.negated { &absent } else { &present });
        Ok(())
    }

    /// `member`/`memberOf` against a literal entry reference
    ///
    /// References that do not name a usable entry compile to a bound
    /// `false`, whatever the negation flag.
    fn membership(&mut self, relation: Relation, op: &EqualMatch) {
        let transitive = self.plan.transitive();
        let groups = self.generator.group_table(transitive);
        let users = self.generator.user_table(transitive);
        let operator = if op.negated { "not in" } else { "in" };

        let subquery = match (relation, self.generator.dn.resolve(&op.value), self.kind) {
            (Relation::MemberOf, Some(MemberRef::Group(group)), EntityKind::User) => Some((
                format!("SELECT member_user_id FROM {users} WHERE parent_group_id = "),
                group,
                false,
            )),
            (Relation::MemberOf, Some(MemberRef::Group(group)), EntityKind::Group) => Some((
                format!("SELECT member_group_id FROM {groups} WHERE parent_group_id = "),
                group,
                false,
            )),
            (Relation::Member, Some(MemberRef::Group(member)), EntityKind::Group) => Some((
                format!("SELECT parent_group_id FROM {groups} WHERE member_group_id = "),
                member,
                false,
            )),
            (Relation::Member, Some(MemberRef::User(member)), EntityKind::Group) => Some((
                format!("SELECT parent_group_id FROM {users} WHERE member_user_id = "),
                member,
                true,
            )),
            _ => None,
        };

        let Some((select, id, user_member)) = subquery else {
            warn!(value = %op.value, kind = %self.kind, "unresolvable member reference");
            self.bind(BindValue::Bool(false));
            return;
        };

        self.sql.push_str(&format!("e.id {} ({}", operator, select));
        self.bind(BindValue::Text(id.to_string()));
        if user_member {
            self.sql.push_str(" AND (");
            self.bind(BindValue::Bool(self.generator.options.active_users_only));
            self.sql.push_str(" = 0 OR member_user_id IN (SELECT id FROM users WHERE active = 1))");
        }
        self.sql.push(')');
    }
}
