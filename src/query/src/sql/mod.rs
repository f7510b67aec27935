//! Relational evaluation: the filter compiler, compiled queries and the
//! SQLite cache they run against

mod generator;
mod query;
mod store;

pub use generator::{GeneratorOptions, JoinPlan, QueryGenerator};
pub use query::{BindValue, ParameterizedQuery, ResultShape, SearchHit, ShapedResult};
pub use store::SqlDirectory;
