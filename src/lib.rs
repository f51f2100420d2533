pub mod error;
pub mod loader;
pub mod query;
pub mod report;
pub mod set;
pub mod types;

pub use error::EvalError;
pub use query::{QueryContext, QueryEvaluator};
pub use set::SetEvaluator;
pub use types::{Metric, MetricSpec, RankedEntry, RelevanceJudgment};
