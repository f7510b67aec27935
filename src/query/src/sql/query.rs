//! Compiled queries and their execution contract

use super::store::{group_from_row, user_from_row};
use crate::dn::DnResolver;
use crate::error::{QueryError, Result};
use dirgate_core::{Entity, EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;

/// Positional parameter of a compiled query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    Text(String),
    Bool(bool),
}

/// Expected cardinality of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    ExactlyOne,
    ZeroOrOne,
    Sequence,
    NonEmptySequence,
}

/// Result of `execute`, shaped as requested
#[derive(Debug, Clone)]
pub enum ShapedResult {
    One(SearchHit),
    Optional(Option<SearchHit>),
    Many(Vec<SearchHit>),
}

impl ShapedResult {
    pub fn into_vec(self) -> Vec<SearchHit> {
        match self {
            ShapedResult::One(hit) => vec![hit],
            ShapedResult::Optional(hit) => hit.into_iter().collect(),
            ShapedResult::Many(hits) => hits,
        }
    }
}

impl ResultShape {
    /// Fit `hits` to this shape; violations are errors, never coerced
    pub fn apply(self, mut hits: Vec<SearchHit>) -> Result<ShapedResult> {
        match (self, hits.len()) {
            (ResultShape::ExactlyOne, 1) => Ok(ShapedResult::One(hits.remove(0))),
            (ResultShape::ZeroOrOne, 0) => Ok(ShapedResult::Optional(None)),
            (ResultShape::ZeroOrOne, 1) => Ok(ShapedResult::Optional(hits.pop())),
            (ResultShape::Sequence, _) => Ok(ShapedResult::Many(hits)),
            (ResultShape::NonEmptySequence, n) if n > 0 => Ok(ShapedResult::Many(hits)),
            (shape, n) => Err(QueryError::invalid_argument(format!(
                "expected {:?} result, got {} rows",
                shape, n
            ))),
        }
    }
}

/// A matched entry with its membership attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub entity: Entity,
    /// Groups containing the entry
    pub member_of: Vec<EntityId>,
    /// Groups nested in the entry
    pub member_groups: Vec<EntityId>,
    /// Users in the entry
    pub member_users: Vec<EntityId>,
}

impl SearchHit {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            member_of: Vec::new(),
            member_groups: Vec::new(),
            member_users: Vec::new(),
        }
    }

    pub fn id(&self) -> &EntityId {
        self.entity.id()
    }

    pub fn dn(&self, resolver: &DnResolver) -> String {
        resolver.dn_of(&self.entity)
    }
}

fn push_unique(ids: &mut Vec<EntityId>, value: Option<String>) {
    if let Some(value) = value {
        let id = EntityId::from(value);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}

/// Fold joined rows, ordered by entity id, into one hit per entity
fn fold_rows(kind: EntityKind, rows: &[SqliteRow]) -> Result<Vec<SearchHit>> {
    let mut hits: Vec<SearchHit> = Vec::new();

    for row in rows {
        let id: String = row.try_get("id")?;
        let id = EntityId::from(id);

        if hits.last().map(SearchHit::id) != Some(&id) {
            let entity = match kind {
                EntityKind::Group => Entity::Group(group_from_row(row)?),
                EntityKind::User => Entity::User(user_from_row(row)?),
                other => return Err(QueryError::UnsupportedEntityKind(other)),
            };
            hits.push(SearchHit::new(entity));
        }

        let Some(hit) = hits.last_mut() else { continue };
        push_unique(&mut hit.member_of, row.try_get("member_of")?);
        push_unique(&mut hit.member_groups, row.try_get("member_group")?);
        push_unique(&mut hit.member_users, row.try_get("member_user")?);
    }

    Ok(hits)
}

/// Compiled, parameterized statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterizedQuery {
    kind: EntityKind,
    sql: String,
    binds: Vec<BindValue>,
}

impl ParameterizedQuery {
    pub(crate) fn new(kind: EntityKind, sql: String, binds: Vec<BindValue>) -> Self {
        Self { kind, sql, binds }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    /// Run the query on one pooled connection inside a transaction
    ///
    /// The transaction is dropped, and the connection returned to the pool,
    /// on every exit path.
    pub async fn execute(&self, pool: &SqlitePool, shape: ResultShape) -> Result<ShapedResult> {
        let mut tx = pool.begin().await?;

        let mut query = sqlx::query(&self.sql);
        for bind in &self.binds {
            query = match bind {
                BindValue::Text(text) => query.bind(text.as_str()),
                BindValue::Bool(flag) => query.bind(*flag),
            };
        }
        let rows = query.fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let hits = fold_rows(self.kind, &rows)?;
        debug!(kind = %self.kind, rows = rows.len(), hits = hits.len(), "query executed");
        shape.apply(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirgate_core::Group;

    fn hits(n: usize) -> Vec<SearchHit> {
        (0..n)
            .map(|i| SearchHit::new(Group::new(format!("g{}", i)).into()))
            .collect()
    }

    #[test]
    fn test_shapes_accept_matching_cardinality() {
        assert!(matches!(ResultShape::ExactlyOne.apply(hits(1)), Ok(ShapedResult::One(_))));
        assert!(matches!(ResultShape::ZeroOrOne.apply(hits(0)), Ok(ShapedResult::Optional(None))));
        assert!(matches!(ResultShape::ZeroOrOne.apply(hits(1)), Ok(ShapedResult::Optional(Some(_)))));
        assert_eq!(ResultShape::Sequence.apply(hits(0)).unwrap().into_vec().len(), 0);
        assert_eq!(ResultShape::NonEmptySequence.apply(hits(3)).unwrap().into_vec().len(), 3);
    }

    #[test]
    fn test_shape_violations_are_invalid_arguments() {
        for (shape, n) in [
            (ResultShape::ExactlyOne, 0),
            (ResultShape::ExactlyOne, 2),
            (ResultShape::ZeroOrOne, 2),
            (ResultShape::NonEmptySequence, 0),
        ] {
            let err = shape.apply(hits(n)).unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)), "{:?} with {}", shape, n);
        }
    }

    #[test]
    fn test_bind_values_serialize_plainly() {
        let binds = vec![BindValue::Text("groupa".to_string()), BindValue::Bool(true)];
        assert_eq!(serde_json::to_string(&binds).unwrap(), r#"["groupa",true]"#);
    }
}
