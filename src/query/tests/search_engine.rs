//! SearchEngine tests: structural entries, strategies, result shapes and
//! the cached backend

mod common;

use common::{config, group_dn, ids, interpreter_engine, mixed_directory, nested_directory, sql_store, user_dn};
use dirgate_core::{CachedDirectory, DirectoryBackend, Entity, EntityKind, InMemoryDirectory};
use dirgate_query::{
    GatewayConfig, GraphMembership, QueryError, QueryExpression, ResultShape, SearchEngine, ShapedResult, Strategy,
};
use std::sync::Arc;

fn hit_ids(hits: &[dirgate_query::SearchHit]) -> Vec<dirgate_core::EntityId> {
    hits.iter().map(|hit| hit.id().clone()).collect()
}

// ============================================================================
// STRUCTURAL ENTRIES
// ============================================================================

#[tokio::test]
async fn test_domain_and_units_are_synthesized() {
    for strategy in [Strategy::Interpreter, Strategy::Sql] {
        let config = config(strategy, true, false, true);
        let engine = SearchEngine::with_store(&config, sql_store(&mixed_directory()).await);

        let domain = engine
            .search(EntityKind::Domain, &QueryExpression::presence("objectClass"))
            .await
            .unwrap();
        assert_eq!(domain.len(), 1);
        assert_eq!(domain[0].dn(engine.dn()), "dc=example,dc=com");

        let units = engine
            .search(EntityKind::OrganizationalUnit, &QueryExpression::BooleanValue(true))
            .await
            .unwrap();
        let dns: Vec<String> = units.iter().map(|hit| hit.dn(engine.dn())).collect();
        assert_eq!(dns, vec!["ou=groups,dc=example,dc=com", "ou=users,dc=example,dc=com"]);

        let users_unit = engine
            .search(EntityKind::OrganizationalUnit, &QueryExpression::equal("ou", "users"))
            .await
            .unwrap();
        assert_eq!(hit_ids(&users_unit), ids(&["users"]));

        let none = engine
            .search(EntityKind::Domain, &QueryExpression::equal("objectClass", "person"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}

#[tokio::test]
async fn test_structural_kinds_do_not_compile() {
    let engine = interpreter_engine(&mixed_directory(), &GatewayConfig::default());
    let err = engine
        .compile(EntityKind::Domain, &QueryExpression::BooleanValue(true))
        .unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedEntityKind(EntityKind::Domain)));
}

// ============================================================================
// STRATEGIES
// ============================================================================

#[tokio::test]
async fn test_sql_strategy_needs_a_store() {
    let directory = mixed_directory();
    let engine = interpreter_engine(&directory, &config(Strategy::Sql, true, false, true));
    assert_eq!(engine.strategy(), Strategy::Sql);

    let err = engine
        .search(EntityKind::User, &QueryExpression::BooleanValue(true))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Configuration(_)));
}

#[tokio::test]
async fn test_inactive_users_are_hidden() {
    let directory = mixed_directory();
    for strategy in [Strategy::Interpreter, Strategy::Sql] {
        let active = SearchEngine::with_store(
            &config(strategy, true, false, true),
            sql_store(&directory).await,
        );
        let users = active.search(EntityKind::User, &QueryExpression::presence("mail")).await.unwrap();
        assert_eq!(hit_ids(&users), ids(&["alice", "bob"]), "{:?}", strategy);

        let everyone = SearchEngine::with_store(
            &config(strategy, true, false, false),
            sql_store(&directory).await,
        );
        let users = everyone.search(EntityKind::User, &QueryExpression::presence("mail")).await.unwrap();
        assert_eq!(hit_ids(&users), ids(&["alice", "bob", "dave"]), "{:?}", strategy);

        let member = QueryExpression::equal("member", &user_dn("dave"));
        assert!(active.search(EntityKind::Group, &member).await.unwrap().is_empty());
        let groups = everyone.search(EntityKind::Group, &member).await.unwrap();
        assert_eq!(
            hit_ids(&groups),
            ids(&["devs", "ring1", "ring2", "staff"]),
            "{:?}",
            strategy
        );
    }
}

#[tokio::test]
async fn test_flattening_switch() {
    let directory = nested_directory();
    let filter = QueryExpression::equal("memberOf", &group_dn("GroupE"));

    for strategy in [Strategy::Interpreter, Strategy::Sql] {
        let flat = SearchEngine::with_store(&config(strategy, true, false, true), sql_store(&directory).await);
        let users = flat.search(EntityKind::User, &filter).await.unwrap();
        assert_eq!(hit_ids(&users), ids(&["usera", "userb", "userd", "usere"]), "{:?}", strategy);

        let direct = SearchEngine::with_store(&config(strategy, false, false, true), sql_store(&directory).await);
        let users = direct.search(EntityKind::User, &filter).await.unwrap();
        assert_eq!(hit_ids(&users), ids(&["usere"]), "{:?}", strategy);
    }
}

#[tokio::test]
async fn test_cached_backend_serves_interpreter() {
    let cached = Arc::new(CachedDirectory::new(nested_directory()));
    let backend: Arc<dyn DirectoryBackend> = cached.clone();
    let membership = Arc::new(GraphMembership::new(backend.clone()));
    let engine = SearchEngine::new(&GatewayConfig::default(), backend, membership);

    let filter = QueryExpression::equal("member", &user_dn("UserA"));
    for _ in 0..2 {
        let groups = engine.search(EntityKind::Group, &filter).await.unwrap();
        assert_eq!(hit_ids(&groups), ids(&["groupa", "groupc", "groupd", "groupe"]));
    }
    assert!(cached.stats().hits > 0);
}

// ============================================================================
// RESULT SHAPES
// ============================================================================

#[tokio::test]
async fn test_result_shapes() {
    let store = sql_store(&mixed_directory()).await;
    let engine = SearchEngine::with_store(&config(Strategy::Sql, true, false, true), store.clone());

    let bob = engine.compile(EntityKind::User, &QueryExpression::equal("uid", "bob")).unwrap();
    match bob.execute(store.pool(), ResultShape::ExactlyOne).await.unwrap() {
        ShapedResult::One(hit) => {
            assert!(matches!(&hit.entity, Entity::User(user) if user.username == "bob"));
            assert_eq!(hit.member_of, ids(&["devs", "ring1", "staff", "ring2"]));
        }
        other => panic!("expected one hit, got {:?}", other),
    }

    let nobody = engine.compile(EntityKind::User, &QueryExpression::equal("uid", "zed")).unwrap();
    assert!(matches!(
        nobody.execute(store.pool(), ResultShape::ZeroOrOne).await.unwrap(),
        ShapedResult::Optional(None)
    ));
    let err = nobody.execute(store.pool(), ResultShape::ExactlyOne).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
    let err = nobody.execute(store.pool(), ResultShape::NonEmptySequence).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));

    let everyone = engine.compile(EntityKind::User, &QueryExpression::BooleanValue(true)).unwrap();
    let err = everyone.execute(store.pool(), ResultShape::ZeroOrOne).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
    let all = everyone.execute(store.pool(), ResultShape::NonEmptySequence).await.unwrap();
    assert_eq!(all.into_vec().len(), 4);
}

// ============================================================================
// FIXTURES AND CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_json_fixture_drives_both_strategies() {
    let json = serde_json::to_string(&mixed_directory().snapshot()).unwrap();
    let directory = InMemoryDirectory::from_json(&json).unwrap();

    let mut config = GatewayConfig::from_toml(
        r#"
        [query]
        strategy = "sql"
        use_materialized_views = true
        "#,
    )
    .unwrap();
    assert!(config.query.flattening);

    let filter = QueryExpression::wildcard("description", None, &["staff"], None);
    let sql = SearchEngine::with_store(&config, sql_store(&directory).await);
    let from_sql = sql.search(EntityKind::Group, &filter).await.unwrap();
    assert_eq!(hit_ids(&from_sql), ids(&["staff"]));

    config.query.strategy = Strategy::Interpreter;
    let interpreter = interpreter_engine(&directory, &config);
    assert_eq!(interpreter.search(EntityKind::Group, &filter).await.unwrap(), from_sql);
}
