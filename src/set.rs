//! Set-level evaluation: one [`QueryEvaluator`] per query, aggregated by
//! unweighted arithmetic mean.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::EvalError;
use crate::query::QueryEvaluator;
use crate::types::{Metric, MetricSpec, RankedEntry, RelevanceJudgment};

/// The evaluated set of queries for one run.
///
/// Built once and never mutated. Queries are kept in report order: numeric
/// ids by value, then any other ids lexicographically.
#[derive(Debug, Clone, Default)]
pub struct SetEvaluator {
    evaluators: Vec<QueryEvaluator>,
    index: HashMap<String, usize>,
}

impl SetEvaluator {
    /// Pair every ranked query with its judgments.
    ///
    /// Queries with no judgments are left out. With `include_unretrieved`,
    /// judged queries missing from the run are added with an empty ranking.
    pub fn build(
        runs: BTreeMap<String, Vec<RankedEntry>>,
        mut qrels: BTreeMap<String, Vec<RelevanceJudgment>>,
        include_unretrieved: bool,
    ) -> Self {
        let mut evaluators = Vec::with_capacity(runs.len());

        for (query_id, ranking) in runs {
            match qrels.remove(&query_id) {
                Some(judgments) => {
                    evaluators.push(QueryEvaluator::new(query_id, ranking, judgments));
                }
                None => debug!(query = %query_id, "no judgments for query, excluded"),
            }
        }

        if include_unretrieved {
            for (query_id, judgments) in qrels {
                debug!(query = %query_id, "judged query missing from run, scored as empty");
                evaluators.push(QueryEvaluator::new(query_id, Vec::new(), judgments));
            }
        }

        Self::from_evaluators(evaluators)
    }

    /// Collect already-built evaluators. A repeated query id keeps the last one.
    pub fn from_evaluators(evaluators: impl IntoIterator<Item = QueryEvaluator>) -> Self {
        let mut by_id: HashMap<String, QueryEvaluator> = HashMap::new();
        for evaluator in evaluators {
            by_id.insert(evaluator.query_id().to_string(), evaluator);
        }

        let mut evaluators: Vec<QueryEvaluator> = by_id.into_values().collect();
        evaluators.sort_by(|a, b| compare_query_ids(a.query_id(), b.query_id()));

        let index = evaluators
            .iter()
            .enumerate()
            .map(|(i, e)| (e.query_id().to_string(), i))
            .collect();

        Self { evaluators, index }
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Evaluators in report order.
    pub fn iter(&self) -> impl Iterator<Item = &QueryEvaluator> {
        self.evaluators.iter()
    }

    pub fn get(&self, query_id: &str) -> Result<&QueryEvaluator, EvalError> {
        self.index
            .get(query_id)
            .map(|&i| &self.evaluators[i])
            .ok_or_else(|| EvalError::QueryNotFound(query_id.to_string()))
    }

    // ── Totals ──

    pub fn num_retrieved(&self) -> usize {
        self.evaluators.iter().map(|e| e.retrieved_count()).sum()
    }

    pub fn num_relevant(&self) -> usize {
        self.evaluators.iter().map(|e| e.relevant_count()).sum()
    }

    pub fn num_relevant_retrieved(&self) -> usize {
        self.evaluators
            .iter()
            .map(|e| e.relevant_retrieved_total())
            .sum()
    }

    // ── Means ──

    pub fn mean_precision(&self, k: usize) -> f64 {
        self.mean_of(|e| e.precision(k))
    }

    pub fn mean_recall(&self, k: usize) -> f64 {
        self.mean_of(|e| e.recall(k))
    }

    pub fn mean_f1(&self, k: usize) -> f64 {
        self.mean_of(|e| e.f1(k))
    }

    /// MAP.
    pub fn mean_average_precision(&self) -> f64 {
        self.mean_of(QueryEvaluator::average_precision)
    }

    /// MRR.
    pub fn mean_reciprocal_rank(&self) -> f64 {
        self.mean_of(QueryEvaluator::reciprocal_rank)
    }

    pub fn mean_ndcg(&self, k: usize) -> f64 {
        self.mean_of(|e| e.ndcg(k))
    }

    pub fn mean_ndcg_full(&self) -> f64 {
        self.mean_of(QueryEvaluator::ndcg_full)
    }

    /// Set-level value of a named metric: totals for counts, means otherwise.
    pub fn value(&self, spec: &MetricSpec) -> f64 {
        match spec.metric {
            Metric::NumRet => self.num_retrieved() as f64,
            Metric::NumRel => self.num_relevant() as f64,
            Metric::NumRelRet => self.num_relevant_retrieved() as f64,
            _ => self.mean_of(|e| e.value(spec)),
        }
    }

    fn mean_of(&self, metric: impl Fn(&QueryEvaluator) -> f64) -> f64 {
        if self.evaluators.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.evaluators.iter().map(metric).sum();
        sum / self.evaluators.len() as f64
    }
}

/// Numeric query ids first, ordered by value; the rest lexicographically.
fn compare_query_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
