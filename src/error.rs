//! Errors raised by the evaluation core.
//!
//! Degenerate inputs (no relevant documents, empty runs, zero cutoffs) are
//! not errors: every metric defines a zero result for them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The query id is not part of the evaluated set, either because it was
    /// never in the run or because it has no judgments.
    #[error("query '{0}' is not in the evaluated set")]
    QueryNotFound(String),
}
