//! Search orchestration
//!
//! Structural entries (the domain root and the two units) are synthesized
//! from configuration and always interpreted. Groups and users go through
//! the configured strategy:
//!
//! ```text
//! Interpreter: normalize → backend listing → FilterMatcher → hits
//! Sql:         QueryGenerator → ParameterizedQuery::execute(Sequence) → hits
//! ```

use crate::ast::QueryExpression;
use crate::config::{GatewayConfig, QueryConfig, Strategy};
use crate::dn::{DirectoryLayout, DnResolver};
use crate::error::{QueryError, Result};
use crate::matcher::{FilterMatcher, MatchOptions};
use crate::membership::{MembershipResolver, SqlMembership};
use crate::normalize::normalize;
use crate::sql::{GeneratorOptions, ParameterizedQuery, QueryGenerator, ResultShape, SearchHit, SqlDirectory};
use dirgate_core::{DirectoryBackend, Entity, EntityKind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Answers searches for one entity kind at a time
pub struct SearchEngine {
    config: QueryConfig,
    dn: DnResolver,
    layout: DirectoryLayout,
    backend: Arc<dyn DirectoryBackend>,
    matcher: FilterMatcher,
    generator: QueryGenerator,
    store: Option<SqlDirectory>,
}

impl SearchEngine {
    /// Engine over any backend, interpreting filters in memory
    pub fn new(
        config: &GatewayConfig,
        backend: Arc<dyn DirectoryBackend>,
        membership: Arc<dyn MembershipResolver>,
    ) -> Self {
        let dn = DnResolver::new(&config.directory);
        let query = config.query.clone();
        let matcher = FilterMatcher::new(
            backend.clone(),
            membership,
            dn.clone(),
            MatchOptions {
                flattening: query.flattening,
                active_users_only: query.active_users_only,
            },
        );
        let generator = QueryGenerator::new(
            GeneratorOptions {
                flattening: query.flattening,
                use_materialized_views: query.use_materialized_views,
                active_users_only: query.active_users_only,
            },
            dn.clone(),
        );

        Self {
            layout: dn.layout(),
            config: query,
            dn,
            backend,
            matcher,
            generator,
            store: None,
        }
    }

    /// Engine over the relational cache; membership is read from its
    /// closure tables
    pub fn with_store(config: &GatewayConfig, store: SqlDirectory) -> Self {
        let membership = Arc::new(SqlMembership::new(&store, config.query.use_materialized_views));
        let backend: Arc<dyn DirectoryBackend> = Arc::new(store.clone());
        let mut engine = Self::new(config, backend, membership);
        engine.store = Some(store);
        engine
    }

    pub fn dn(&self) -> &DnResolver {
        &self.dn
    }

    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    /// Compile the filter without running it
    pub fn compile(&self, kind: EntityKind, expr: &QueryExpression) -> Result<ParameterizedQuery> {
        self.generator.generate(kind, expr)
    }

    /// All `kind` entries matching `expr`, ordered by id
    pub async fn search(&self, kind: EntityKind, expr: &QueryExpression) -> Result<Vec<SearchHit>> {
        let start = Instant::now();

        let hits = match (kind, self.config.strategy) {
            (EntityKind::Domain | EntityKind::OrganizationalUnit, _) => {
                self.search_layout(kind, expr).await?
            }
            (_, Strategy::Interpreter) => self.interpret(kind, expr).await?,
            (_, Strategy::Sql) => {
                let store = self.store.as_ref().ok_or_else(|| {
                    QueryError::configuration("sql strategy needs a relational cache")
                })?;
                let query = self.generator.generate(kind, expr)?;
                query.execute(store.pool(), ResultShape::Sequence).await?.into_vec()
            }
        };

        info!(
            %kind,
            strategy = ?self.config.strategy,
            hits = hits.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "search completed"
        );
        Ok(hits)
    }

    async fn search_layout(&self, kind: EntityKind, expr: &QueryExpression) -> Result<Vec<SearchHit>> {
        let normalized = normalize(kind, expr);
        let mut hits = Vec::new();
        for entity in self.layout.entries(kind) {
            if self.matcher.match_entity(&entity, &normalized).await? {
                hits.push(SearchHit::new(entity));
            }
        }
        Ok(hits)
    }

    async fn interpret(&self, kind: EntityKind, expr: &QueryExpression) -> Result<Vec<SearchHit>> {
        let normalized = normalize(kind, expr);
        if normalized == QueryExpression::BooleanValue(false) {
            debug!(%kind, "filter folded to false");
            return Ok(Vec::new());
        }

        let mut entities: Vec<Entity> = match kind {
            EntityKind::Group => self.backend.groups().await?.into_iter().map(Entity::from).collect(),
            EntityKind::User => self
                .backend
                .users()
                .await?
                .into_iter()
                .filter(|user| user.active || !self.config.active_users_only)
                .map(Entity::from)
                .collect(),
            other => return Err(QueryError::UnsupportedEntityKind(other)),
        };
        entities.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));

        let mut hits = Vec::new();
        for entity in entities {
            if self.matcher.match_entity(&entity, &normalized).await? {
                hits.push(self.hit(entity).await?);
            }
        }
        Ok(hits)
    }

    /// Hit with the same membership attributes the SQL path returns
    async fn hit(&self, entity: Entity) -> Result<SearchHit> {
        let flatten = self.config.flattening;
        let mut hit = SearchHit::new(entity);
        hit.member_of = self.matcher.groups_of(&hit.entity).await?;

        if let Entity::Group(group) = &hit.entity {
            let membership = self.matcher.membership();
            hit.member_groups = membership.child_groups_of_group(&group.id, flatten).await?;
            let users = membership.users_of_group(&group.id, flatten).await?;
            hit.member_users = self.matcher.visible_users(users).await?;
        }
        Ok(hit)
    }
}
