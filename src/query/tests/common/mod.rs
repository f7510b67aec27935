//! Shared fixtures for the integration tests

#![allow(dead_code)]

use dirgate_core::{DirectoryBackend, EntityId, Group, InMemoryDirectory, User};
use dirgate_query::{
    GatewayConfig, GraphMembership, QueryExpression, SearchEngine, SqlDirectory, Strategy,
    WildcardMatch,
};
use std::sync::Arc;

pub const BASE_DN: &str = "dc=example,dc=com";

pub fn group_dn(name: &str) -> String {
    format!("cn={},ou=groups,{}", name, BASE_DN)
}

pub fn user_dn(name: &str) -> String {
    format!("uid={},ou=users,{}", name, BASE_DN)
}

pub fn ids(names: &[&str]) -> Vec<EntityId> {
    names.iter().map(EntityId::new).collect()
}

/// Nested groups without cycles
///
/// ```text
/// GroupE ─► GroupD ─► GroupC ─┬─► GroupA
///   │         │               └─► GroupB
///  UserE     UserD        UserA ◄─┘   └─► UserB
/// ```
pub fn nested_directory() -> InMemoryDirectory {
    let mut directory = InMemoryDirectory::new();
    for name in ["GroupA", "GroupB", "GroupC", "GroupD", "GroupE"] {
        directory.add_group(Group::new(name));
    }
    for name in ["UserA", "UserB", "UserC", "UserD", "UserE"] {
        directory.add_user(User::new(name));
    }
    directory
        .add_group_member("GroupC", "GroupA")
        .add_group_member("GroupC", "GroupB")
        .add_group_member("GroupD", "GroupC")
        .add_group_member("GroupE", "GroupD")
        .add_user_member("GroupA", "UserA")
        .add_user_member("GroupB", "UserB")
        .add_user_member("GroupD", "UserD")
        .add_user_member("GroupE", "UserE");
    directory
}

/// Three groups in a cycle: GroupA contains GroupB, GroupB contains
/// GroupC, GroupC contains GroupA
pub fn cyclic_directory() -> InMemoryDirectory {
    let mut directory = InMemoryDirectory::new();
    for name in ["GroupA", "GroupB", "GroupC"] {
        directory.add_group(Group::new(name));
    }
    for name in ["UserA", "UserB", "UserC"] {
        directory.add_user(User::new(name));
    }
    directory
        .add_group_member("GroupA", "GroupB")
        .add_group_member("GroupB", "GroupC")
        .add_group_member("GroupC", "GroupA")
        .add_user_member("GroupB", "UserB")
        .add_user_member("GroupC", "UserC");
    directory
}

/// Richer dataset for comparing the evaluators: attributes, an inactive
/// user, a diamond, a cycle, a self-loop and an isolated group
pub fn mixed_directory() -> InMemoryDirectory {
    let mut directory = InMemoryDirectory::new();
    directory
        .add_group(Group::new("Admins").with_description("Administrators"))
        .add_group(Group::new("Staff").with_description("All_staff 100%"))
        .add_group(Group::new("Devs"))
        .add_group(Group::new("Ops").with_description("operations"))
        .add_group(Group::new("Ring1"))
        .add_group(Group::new("Ring2"))
        .add_group(Group::new("Lonely"))
        .add_user(
            User::new("alice")
                .with_name("Alice", "Smith")
                .with_email("alice@example.com"),
        )
        .add_user(
            User::new("bob")
                .with_name("Bob", "Stone")
                .with_display_name("Bobby")
                .with_email("BOB@example.com"),
        )
        .add_user(User::new("carol").with_name("Carol", "Smithers"))
        .add_user(User::new("dave").with_email("dave@corp.example").inactive())
        .add_user(User::new("erin"))
        .add_group_member("Staff", "Devs")
        .add_group_member("Staff", "Ops")
        .add_group_member("Devs", "Admins")
        .add_group_member("Ops", "Admins")
        .add_group_member("Ring1", "Ring2")
        .add_group_member("Ring2", "Ring1")
        .add_group_member("Ring2", "Staff")
        .add_group_member("Lonely", "Lonely")
        .add_user_member("Admins", "alice")
        .add_user_member("Devs", "bob")
        .add_user_member("Devs", "dave")
        .add_user_member("Ops", "carol")
        .add_user_member("Staff", "erin")
        .add_user_member("Ring1", "bob");
    directory
}

/// `count` diamonds stacked on one another
///
/// ```text
/// Top0 ─┬─► Left0 ──┬─► Top1 ─┬─► ...  ─► TopN
///       └─► Right0 ─┘         └─► ...
/// ```
///
/// Every `TopN` has one user; the number of paths from `Top0` doubles per
/// diamond.
pub fn diamond_chain(count: usize) -> InMemoryDirectory {
    let mut directory = InMemoryDirectory::new();
    for level in 0..=count {
        let top = format!("Top{}", level);
        let user = format!("user{}", level);
        directory
            .add_group(Group::new(top.as_str()))
            .add_user(User::new(user.as_str()))
            .add_user_member(top.as_str(), user.as_str());
    }
    for level in 0..count {
        let top = format!("Top{}", level);
        let next = format!("Top{}", level + 1);
        for side in ["Left", "Right"] {
            let side = format!("{}{}", side, level);
            directory
                .add_group(Group::new(side.as_str()))
                .add_group_member(top.as_str(), side.as_str())
                .add_group_member(side.as_str(), next.as_str());
        }
    }
    directory
}

/// `count` groups where every group directly contains every other one
pub fn complete_directory(count: usize) -> InMemoryDirectory {
    let names: Vec<String> = (0..count).map(|i| format!("Clique{}", i)).collect();
    let mut directory = InMemoryDirectory::new();
    for (i, name) in names.iter().enumerate() {
        let user = format!("member{}", i);
        directory
            .add_group(Group::new(name.as_str()))
            .add_user(User::new(user.as_str()))
            .add_user_member(name.as_str(), user.as_str());
    }
    for parent in &names {
        for member in &names {
            if parent != member {
                directory.add_group_member(parent.as_str(), member.as_str());
            }
        }
    }
    directory
}

pub async fn sql_store(directory: &InMemoryDirectory) -> SqlDirectory {
    let store = SqlDirectory::in_memory().await.unwrap();
    store.import(directory).await.unwrap();
    store
}

pub fn config(
    strategy: Strategy,
    flattening: bool,
    materialized: bool,
    active_only: bool,
) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.query.strategy = strategy;
    config.query.flattening = flattening;
    config.query.use_materialized_views = materialized;
    config.query.active_users_only = active_only;
    config
}

/// Interpreter engine over the fixture itself
pub fn interpreter_engine(directory: &InMemoryDirectory, config: &GatewayConfig) -> SearchEngine {
    let backend: Arc<dyn DirectoryBackend> = Arc::new(directory.clone());
    let membership = Arc::new(GraphMembership::new(backend.clone()));
    SearchEngine::new(config, backend, membership)
}

/// SQL engine over a freshly imported cache
pub async fn sql_engine(directory: &InMemoryDirectory, config: &GatewayConfig) -> SearchEngine {
    SearchEngine::with_store(config, sql_store(directory).await)
}

/// Filters exercised against the mixed dataset
pub fn filter_corpus() -> Vec<QueryExpression> {
    use QueryExpression as Q;
    vec![
        Q::BooleanValue(true),
        Q::and(vec![]),
        Q::or(vec![]),
        Q::not(vec![]),
        Q::equal("cn", "admins"),
        Q::equal("cn", "Admins"),
        Q::equal_ignore_case("cn", "ADMINS"),
        Q::equal("uid", "bob"),
        Q::equal_ignore_case("mail", "bob@EXAMPLE.com"),
        Q::equal("mail", "bob@example.com"),
        Q::negate(Q::equal("mail", "alice@example.com")),
        Q::wildcard("sn", Some("Smith"), &[], None),
        Q::Wildcard(WildcardMatch::new("sn", Some("smith"), &[], None).ignore_case()),
        Q::wildcard("description", None, &["_staff 100%"], None),
        Q::wildcard("description", None, &["ll_st"], None),
        Q::wildcard("mail", None, &["@"], Some(".com")),
        Q::presence("mail"),
        Q::presence("description"),
        Q::negate(Q::presence("displayName")),
        Q::presence("objectClass"),
        Q::equal("objectClass", "groupOfNames"),
        Q::equal("objectClass", "inetOrgPerson"),
        Q::presence("telephoneNumber"),
        Q::negate(Q::presence("telephoneNumber")),
        Q::equal("memberOf", &group_dn("Staff")),
        Q::equal("memberOf", &group_dn("devs")),
        Q::negate(Q::equal("memberOf", &group_dn("Admins"))),
        Q::equal("memberOf", &group_dn("Ring1")),
        Q::equal("memberOf", &user_dn("alice")),
        Q::equal("memberOf", "cn=Staff,ou=elsewhere,dc=example,dc=com"),
        Q::negate(Q::equal("memberOf", "not a dn")),
        Q::equal("member", &user_dn("alice")),
        Q::equal("uniqueMember", &user_dn("dave")),
        Q::equal("member", &group_dn("Admins")),
        Q::negate(Q::equal("member", &user_dn("bob"))),
        Q::presence("member"),
        Q::negate(Q::presence("member")),
        Q::presence("memberOf"),
        Q::negate(Q::presence("memberOf")),
        Q::and(vec![
            Q::equal("objectClass", "person"),
            Q::or(vec![
                Q::wildcard("sn", Some("Smith"), &[], None),
                Q::equal("memberOf", &group_dn("Ops")),
            ]),
        ]),
        Q::negate(Q::and(vec![
            Q::presence("mail"),
            Q::equal("memberOf", &group_dn("Devs")),
        ])),
        Q::not(vec![Q::equal("cn", "Ops"), Q::equal("cn", "Devs")]),
        Q::or(vec![
            Q::negate(Q::negate(Q::equal("cn", "Ring2"))),
            Q::and(vec![
                Q::presence("description"),
                Q::negate(Q::equal("member", &group_dn("Staff"))),
            ]),
        ]),
    ]
}
