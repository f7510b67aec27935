//! # Dirgate Query
//!
//! Query translation and membership resolution for the directory gateway.
//!
//! ## Architecture
//!
//! ```text
//! QueryExpression ─► normalize(kind) ─┬─► FilterMatcher ───► bool per entity
//!                                     └─► QueryGenerator ──► ParameterizedQuery ─► SqlDirectory
//!                                               │                     │
//!                                               └── MembershipResolver┘
//!                                              (graph walk | closure tables)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use dirgate_core::{EntityKind, Group, InMemoryDirectory, User};
//! use dirgate_query::{GatewayConfig, QueryExpression, SearchEngine, SqlDirectory};
//!
//! # async fn example() -> dirgate_query::Result<()> {
//! let mut directory = InMemoryDirectory::new();
//! directory
//!     .add_group(Group::new("Admins"))
//!     .add_user(User::new("alice"))
//!     .add_user_member("Admins", "alice");
//!
//! let store = SqlDirectory::in_memory().await?;
//! store.import(&directory).await?;
//!
//! let engine = SearchEngine::with_store(&GatewayConfig::default(), store);
//! let filter = QueryExpression::equal("memberOf", "cn=Admins,ou=groups,dc=example,dc=com");
//! let hits = engine.search(EntityKind::User, &filter).await?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod attribute;
pub mod config;
pub mod dn;
pub mod error;
pub mod matcher;
pub mod membership;
pub mod normalize;
pub mod schema;
pub mod search;
pub mod sql;

pub use ast::{EqualMatch, PresenceMatch, QueryExpression, WildcardMatch};
pub use attribute::{normalize_attribute, Attribute};
pub use config::{GatewayConfig, Strategy};
pub use dn::{DnResolver, MemberRef};
pub use error::{QueryError, Result};
pub use matcher::{FilterMatcher, MatchOptions};
pub use membership::{GraphMembership, MembershipResolver, SqlMembership};
pub use normalize::{fold_constants, normalize, project_for_entity_kind, push_negation};
pub use search::SearchEngine;
pub use sql::{
    BindValue, GeneratorOptions, JoinPlan, ParameterizedQuery, QueryGenerator, ResultShape, SearchHit,
    ShapedResult, SqlDirectory,
};
