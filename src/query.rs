//! Per-query retrieval metrics.
//!
//! A [`QueryEvaluator`] is built once from a query's ranked run and its
//! judgments and is read-only afterwards. All metrics are pure functions of
//! that state.
//!
//! | Metric | Value |
//! |--------|-------|
//! | P@k | relevant retrieved in top k / k |
//! | R@k | relevant retrieved in top k / relevant |
//! | F1@k | harmonic mean of P@k and R@k |
//! | RR | 1 / rank of the first relevant document |
//! | AP | mean precision at each relevant rank, unretrieved relevant count as 0 |
//! | NDCG@k | DCG@k / DCG@k of the ideal ranking, gain `2^grade - 1` |

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{Metric, MetricSpec, RankedEntry, RelevanceJudgment, MAX_GRADE};

/// The three derived views of a single query.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Full ranked list in ascending rank order.
    retrieved: Vec<RankedEntry>,
    /// Positive judgments, one per document, retrieved or not.
    relevant: Vec<RelevanceJudgment>,
    /// Entries of `retrieved` that have a positive judgment; ascending rank.
    relevant_retrieved: Vec<RankedEntry>,
    /// Positive grades by document id.
    grades: HashMap<String, i32>,
}

impl QueryContext {
    /// Build the views from a ranked list and the query's judgments.
    ///
    /// A document judged more than once keeps its last grade. Judgments with
    /// a grade of zero or below are dropped. A document ranked more than once
    /// keeps only its best-ranked entry.
    pub fn new(
        mut retrieved: Vec<RankedEntry>,
        judgments: impl IntoIterator<Item = RelevanceJudgment>,
    ) -> Self {
        // Stable, so an already rank-sorted list is left untouched.
        retrieved.sort_by_key(|e| e.rank);
        let mut seen: HashSet<String> = HashSet::with_capacity(retrieved.len());
        retrieved.retain(|e| seen.insert(e.doc_id.clone()));

        let mut latest: HashMap<String, i32> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();
        for judgment in judgments {
            if latest
                .insert(judgment.doc_id.clone(), judgment.grade)
                .is_none()
            {
                first_seen.push(judgment.doc_id);
            }
        }

        let relevant: Vec<RelevanceJudgment> = first_seen
            .into_iter()
            .map(|doc_id| {
                let grade = latest[&doc_id];
                RelevanceJudgment::new(doc_id, grade)
            })
            .filter(RelevanceJudgment::is_relevant)
            .collect();

        let grades: HashMap<String, i32> = relevant
            .iter()
            .map(|j| (j.doc_id.clone(), j.grade))
            .collect();

        let relevant_retrieved = retrieved
            .iter()
            .filter(|e| grades.contains_key(&e.doc_id))
            .cloned()
            .collect();

        Self {
            retrieved,
            relevant,
            relevant_retrieved,
            grades,
        }
    }

    pub fn retrieved(&self) -> &[RankedEntry] {
        &self.retrieved
    }

    pub fn relevant(&self) -> &[RelevanceJudgment] {
        &self.relevant
    }

    pub fn relevant_retrieved(&self) -> &[RankedEntry] {
        &self.relevant_retrieved
    }

    /// Positive grade of a document, `None` if unjudged or not relevant.
    pub fn grade(&self, doc_id: &str) -> Option<i32> {
        self.grades.get(doc_id).copied()
    }
}

/// Computes every metric for one query.
#[derive(Debug, Clone)]
pub struct QueryEvaluator {
    query_id: String,
    context: QueryContext,
}

impl QueryEvaluator {
    pub fn new(
        query_id: impl Into<String>,
        retrieved: Vec<RankedEntry>,
        judgments: impl IntoIterator<Item = RelevanceJudgment>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            context: QueryContext::new(retrieved, judgments),
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    pub fn retrieved_count(&self) -> usize {
        self.context.retrieved.len()
    }

    pub fn relevant_count(&self) -> usize {
        self.context.relevant.len()
    }

    /// Relevant documents retrieved at any depth.
    pub fn relevant_retrieved_total(&self) -> usize {
        self.context.relevant_retrieved.len()
    }

    /// Number of relevant documents among the top `k` retrieved.
    ///
    /// `k` does not need to match the rank of any relevant document: this is
    /// an upper-bound search over the rank-sorted relevant-retrieved list.
    pub fn relevant_retrieved_count(&self, k: usize) -> usize {
        let hits = &self.context.relevant_retrieved;
        let (first, last) = match (hits.first(), hits.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0,
        };

        if last.rank <= k {
            hits.len()
        } else if first.rank > k {
            0
        } else {
            hits.partition_point(|e| e.rank <= k)
        }
    }

    pub fn precision(&self, k: usize) -> f64 {
        if k == 0 {
            return 0.0;
        }
        self.relevant_retrieved_count(k) as f64 / k as f64
    }

    pub fn recall(&self, k: usize) -> f64 {
        if self.context.relevant.is_empty() {
            return 0.0;
        }
        self.relevant_retrieved_count(k) as f64 / self.context.relevant.len() as f64
    }

    pub fn f1(&self, k: usize) -> f64 {
        let p = self.precision(k);
        let r = self.recall(k);
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }

    /// 1 / rank of the first relevant document, 0 if none was retrieved.
    pub fn reciprocal_rank(&self) -> f64 {
        match self.context.relevant_retrieved.first() {
            Some(first) => 1.0 / first.rank as f64,
            None => 0.0,
        }
    }

    /// Sum of `i / rank_i` over relevant retrieved documents, divided by the
    /// total number of relevant documents.
    pub fn average_precision(&self) -> f64 {
        if self.context.relevant.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .context
            .relevant_retrieved
            .iter()
            .enumerate()
            .map(|(i, e)| (i + 1) as f64 / e.rank as f64)
            .sum();
        sum / self.context.relevant.len() as f64
    }

    /// Discounted cumulative gain of the top `k` entries, discounted by
    /// each entry's own rank.
    pub fn dcg(&self, k: usize) -> f64 {
        self.context
            .retrieved
            .iter()
            .take(k)
            .filter_map(|e| {
                self.context
                    .grade(&e.doc_id)
                    .map(|grade| gain(grade) / discount(e.rank))
            })
            .sum()
    }

    /// DCG of the best possible ranking, truncated at `min(k, relevant)`.
    ///
    /// Relevant documents are placed grade group by grade group, highest
    /// grade first; each slot inside a group keeps its own positional discount.
    pub fn ideal_dcg(&self, k: usize) -> f64 {
        let depth = k.min(self.context.relevant.len());

        let mut group_sizes: BTreeMap<Reverse<i32>, usize> = BTreeMap::new();
        for judgment in &self.context.relevant {
            *group_sizes.entry(Reverse(judgment.grade)).or_insert(0) += 1;
        }

        let mut ideal = 0.0;
        let mut placed = 0;
        for (Reverse(grade), size) in group_sizes {
            if placed >= depth {
                break;
            }
            let take = size.min(depth - placed);
            let g = gain(grade);
            ideal += (placed + 1..=placed + take)
                .map(|position| g / discount(position))
                .sum::<f64>();
            placed += take;
        }
        ideal
    }

    /// DCG@k normalized by the ideal DCG@k; 0 when either term is 0.
    pub fn ndcg(&self, k: usize) -> f64 {
        let dcg = self.dcg(k);
        if dcg == 0.0 {
            return 0.0;
        }
        let ideal = self.ideal_dcg(k);
        if ideal == 0.0 {
            return 0.0;
        }
        dcg / ideal
    }

    /// NDCG over the whole run, at depth `max(retrieved, relevant)`.
    pub fn ndcg_full(&self) -> f64 {
        self.ndcg(self.retrieved_count().max(self.relevant_count()))
    }

    /// Value of a named metric. Cutoff metrics without a cutoff are
    /// evaluated over the full ranked list.
    pub fn value(&self, spec: &MetricSpec) -> f64 {
        let depth = spec.cutoff.unwrap_or_else(|| self.retrieved_count());
        match spec.metric {
            Metric::NumRet => self.retrieved_count() as f64,
            Metric::NumRel => self.relevant_count() as f64,
            Metric::NumRelRet => self.relevant_retrieved_total() as f64,
            Metric::Precision => self.precision(depth),
            Metric::Recall => self.recall(depth),
            Metric::F1 => self.f1(depth),
            Metric::Ndcg => match spec.cutoff {
                Some(k) => self.ndcg(k),
                None => self.ndcg_full(),
            },
            Metric::ReciprocalRank => self.reciprocal_rank(),
            Metric::AveragePrecision => self.average_precision(),
        }
    }
}

/// Grades above [`MAX_GRADE`] gain as much as `MAX_GRADE` so sums stay finite.
fn gain(grade: i32) -> f64 {
    2f64.powi(grade.min(MAX_GRADE)) - 1.0
}

fn discount(rank: usize) -> f64 {
    ((1 + rank) as f64).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn ranked(ids: &[&str]) -> Vec<RankedEntry> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| RankedEntry::new(*id, i + 1, (ids.len() - i) as f64))
            .collect()
    }

    fn judged(pairs: &[(&str, i32)]) -> Vec<RelevanceJudgment> {
        pairs
            .iter()
            .map(|(id, grade)| RelevanceJudgment::new(*id, *grade))
            .collect()
    }

    fn scenario() -> QueryEvaluator {
        QueryEvaluator::new(
            "q1",
            ranked(&["A", "C", "B"]),
            judged(&[("A", 1), ("B", 1), ("C", 0)]),
        )
    }

    #[test]
    fn test_context_views() {
        let eval = scenario();
        let ctx = eval.context();
        assert_eq!(ctx.retrieved().len(), 3);
        let relevant: Vec<&str> = ctx.relevant().iter().map(|j| j.doc_id.as_str()).collect();
        assert_eq!(relevant, ["A", "B"]);
        let hits: Vec<(&str, usize)> = ctx
            .relevant_retrieved()
            .iter()
            .map(|e| (e.doc_id.as_str(), e.rank))
            .collect();
        assert_eq!(hits, [("A", 1), ("B", 3)]);
    }

    #[test]
    fn test_scenario_metrics() {
        let eval = scenario();
        assert!((eval.precision(2) - 0.5).abs() < EPS);
        assert!((eval.recall(2) - 0.5).abs() < EPS);
        assert!((eval.reciprocal_rank() - 1.0).abs() < EPS);
        assert!((eval.average_precision() - (1.0 + 2.0 / 3.0) / 2.0).abs() < EPS);
    }

    #[test]
    fn test_relevant_retrieved_count_between_ranks() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "x", "b", "y", "z", "c", "w"]),
            judged(&[("a", 1), ("b", 1), ("c", 1)]),
        );
        let counts: Vec<usize> = (0..=8).map(|k| eval.relevant_retrieved_count(k)).collect();
        assert_eq!(counts, [0, 1, 1, 2, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn test_relevant_retrieved_count_matches_linear_scan() {
        let ids: Vec<String> = (0..40).map(|i| format!("d{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let judgments: Vec<RelevanceJudgment> = ids
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == 0 || i % 7 == 0)
            .map(|(_, id)| RelevanceJudgment::new(id.clone(), 1))
            .collect();
        let eval = QueryEvaluator::new("q", ranked(&id_refs), judgments);

        let mut previous = 0;
        for k in 0..=45 {
            let expected = eval
                .context()
                .relevant_retrieved()
                .iter()
                .filter(|e| e.rank <= k)
                .count();
            let got = eval.relevant_retrieved_count(k);
            assert_eq!(got, expected, "k = {k}");
            assert!(got >= previous, "count must not decrease at k = {k}");
            previous = got;
        }
    }

    #[test]
    fn test_zero_cutoff_is_zero() {
        let eval = scenario();
        assert_eq!(eval.relevant_retrieved_count(0), 0);
        assert_eq!(eval.precision(0), 0.0);
        assert_eq!(eval.recall(0), 0.0);
        assert_eq!(eval.f1(0), 0.0);
        assert_eq!(eval.ndcg(0), 0.0);
    }

    #[test]
    fn test_no_relevant_documents() {
        let eval = QueryEvaluator::new("q", ranked(&["a", "b"]), judged(&[("a", 0), ("b", -1)]));
        assert_eq!(eval.relevant_count(), 0);
        assert_eq!(eval.recall(10), 0.0);
        assert_eq!(eval.f1(10), 0.0);
        assert_eq!(eval.average_precision(), 0.0);
        assert_eq!(eval.reciprocal_rank(), 0.0);
        assert_eq!(eval.ndcg(10), 0.0);
    }

    #[test]
    fn test_empty_run() {
        let eval = QueryEvaluator::new("q", Vec::new(), judged(&[("a", 2)]));
        assert_eq!(eval.retrieved_count(), 0);
        assert_eq!(eval.relevant_count(), 1);
        assert_eq!(eval.precision(5), 0.0);
        assert_eq!(eval.recall(5), 0.0);
        assert_eq!(eval.average_precision(), 0.0);
        assert_eq!(eval.ndcg(5), 0.0);
        assert_eq!(eval.ndcg_full(), 0.0);
    }

    #[test]
    fn test_all_relevant_has_unit_precision() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "b", "c", "d"]),
            judged(&[("a", 1), ("b", 2), ("c", 1), ("d", 3)]),
        );
        for k in 1..=4 {
            assert!((eval.precision(k) - 1.0).abs() < EPS, "k = {k}");
        }
        // Past the end of the run the denominator keeps growing.
        assert!((eval.precision(8) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_recall_at_full_depth() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "x", "b"]),
            judged(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]),
        );
        let full = eval.retrieved_count();
        assert!((eval.recall(full) - 2.0 / 4.0).abs() < EPS);
    }

    #[test]
    fn test_reciprocal_rank_positions() {
        let third = QueryEvaluator::new("q", ranked(&["x", "y", "a"]), judged(&[("a", 1)]));
        assert!((third.reciprocal_rank() - 1.0 / 3.0).abs() < EPS);

        let first = QueryEvaluator::new("q", ranked(&["a", "y"]), judged(&[("a", 1)]));
        assert_eq!(first.reciprocal_rank(), 1.0);

        let none = QueryEvaluator::new("q", ranked(&["x", "y"]), judged(&[("a", 1)]));
        assert_eq!(none.reciprocal_rank(), 0.0);
    }

    #[test]
    fn test_average_precision_counts_unretrieved() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "x", "b"]),
            judged(&[("a", 1), ("b", 1), ("never", 1)]),
        );
        let expected = (1.0 + 2.0 / 3.0) / 3.0;
        assert!((eval.average_precision() - expected).abs() < EPS);
    }

    #[test]
    fn test_f1_is_harmonic_mean() {
        let eval = scenario();
        let p = eval.precision(2);
        let r = eval.recall(2);
        assert!((eval.f1(2) - 2.0 * p * r / (p + r)).abs() < EPS);
    }

    #[test]
    fn test_judgment_last_one_wins() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "b"]),
            judged(&[("a", 1), ("b", 2), ("a", 0), ("b", 3)]),
        );
        assert_eq!(eval.relevant_count(), 1);
        assert_eq!(eval.context().grade("a"), None);
        assert_eq!(eval.context().grade("b"), Some(3));
    }

    #[test]
    fn test_ndcg_perfect_ranking_is_one() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "b", "c", "d", "x"]),
            judged(&[("c", 1), ("a", 3), ("b", 2), ("d", 1)]),
        );
        for k in 1..=6 {
            assert!((eval.ndcg(k) - 1.0).abs() < EPS, "k = {k}");
        }
        assert!((eval.ndcg_full() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_ndcg_swapped_grades() {
        let eval = QueryEvaluator::new("q", ranked(&["b", "a"]), judged(&[("a", 2), ("b", 1)]));
        let dcg = 1.0 / 2f64.log2() + 3.0 / 3f64.log2();
        let ideal = 3.0 / 2f64.log2() + 1.0 / 3f64.log2();
        assert!((eval.dcg(2) - dcg).abs() < EPS);
        assert!((eval.ideal_dcg(2) - ideal).abs() < EPS);
        assert!((eval.ndcg(2) - dcg / ideal).abs() < EPS);
    }

    #[test]
    fn test_ideal_dcg_grade_groups_use_positional_discounts() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["x"]),
            judged(&[("a", 1), ("b", 3), ("c", 3), ("d", 2)]),
        );
        // Ideal order: 3, 3, 2, 1 at positions 1..4.
        let slot = |grade: i32, pos: usize| (2f64.powi(grade) - 1.0) / ((1 + pos) as f64).log2();
        let full = slot(3, 1) + slot(3, 2) + slot(2, 3) + slot(1, 4);
        assert!((eval.ideal_dcg(10) - full).abs() < EPS);
        assert!((eval.ideal_dcg(4) - full).abs() < EPS);

        // Truncation inside the top grade group.
        assert!((eval.ideal_dcg(1) - slot(3, 1)).abs() < EPS);
        // Truncation inside a lower group.
        let three = slot(3, 1) + slot(3, 2) + slot(2, 3);
        assert!((eval.ideal_dcg(3) - three).abs() < EPS);
    }

    #[test]
    fn test_ndcg_uses_actual_rank_for_discount() {
        let eval = QueryEvaluator::new("q", ranked(&["x", "y", "a"]), judged(&[("a", 1)]));
        assert!((eval.dcg(3) - 1.0 / 4f64.log2()).abs() < EPS);
        assert_eq!(eval.dcg(2), 0.0);
        assert_eq!(eval.ndcg(2), 0.0);
        assert!((eval.ndcg(3) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_ndcg_cutoff_past_end_of_run() {
        let eval = QueryEvaluator::new("q", ranked(&["a", "x"]), judged(&[("a", 1), ("b", 1)]));
        let ideal = 1.0 + 1.0 / 3f64.log2();
        assert!((eval.ndcg(100) - 1.0 / ideal).abs() < EPS);
    }

    #[test]
    fn test_metrics_stay_in_unit_interval() {
        let eval = QueryEvaluator::new(
            "q",
            ranked(&["a", "x", "b", "y", "c", "z", "d"]),
            judged(&[("a", 2), ("b", 1), ("c", 3), ("d", 1), ("e", 2), ("y", 0)]),
        );
        for k in 0..=12 {
            for v in [eval.precision(k), eval.recall(k), eval.f1(k), eval.ndcg(k)] {
                assert!((0.0..=1.0 + EPS).contains(&v), "k = {k}, value = {v}");
            }
        }
    }

    #[test]
    fn test_duplicate_documents_count_once() {
        let entries = vec![RankedEntry::new("a", 1, 2.0), RankedEntry::new("a", 2, 1.0)];
        let eval = QueryEvaluator::new("q", entries, judged(&[("a", 1)]));
        assert_eq!(eval.retrieved_count(), 1);
        assert_eq!(eval.relevant_retrieved_total(), 1);
        assert!((eval.recall(2) - 1.0).abs() < EPS);
        assert!((eval.average_precision() - 1.0).abs() < EPS);
        assert!((eval.ndcg(2) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_duplicate_document_keeps_best_rank() {
        let entries = vec![
            RankedEntry::new("a", 3, 0.1),
            RankedEntry::new("b", 1, 0.9),
            RankedEntry::new("a", 2, 0.5),
        ];
        let eval = QueryEvaluator::new("q", entries, judged(&[("a", 1)]));
        let kept: Vec<(&str, usize)> = eval
            .context()
            .retrieved()
            .iter()
            .map(|e| (e.doc_id.as_str(), e.rank))
            .collect();
        assert_eq!(kept, [("b", 1), ("a", 2)]);
        assert!((eval.reciprocal_rank() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_ndcg_stays_finite_for_huge_grades() {
        let judgments = judged(&[("a", 2000), ("b", 1)]);
        let swapped = QueryEvaluator::new("q", ranked(&["b", "a"]), judgments.clone());
        let v = swapped.ndcg(2);
        assert!(v.is_finite() && (0.0..=1.0).contains(&v), "ndcg = {v}");

        let perfect = QueryEvaluator::new("q", ranked(&["a", "b"]), judgments);
        assert!((perfect.ndcg(2) - 1.0).abs() < EPS);
        assert!(perfect.dcg(2).is_finite());
    }

    #[test]
    fn test_resorting_rank_sorted_list_is_noop() {
        let eval = scenario();
        let mut copy = eval.context().relevant_retrieved().to_vec();
        copy.sort_by_key(|e| e.rank);
        assert_eq!(copy, eval.context().relevant_retrieved());
    }

    #[test]
    fn test_unsorted_input_is_ordered_by_rank() {
        let entries = vec![
            RankedEntry::new("b", 3, 0.1),
            RankedEntry::new("a", 1, 0.9),
            RankedEntry::new("c", 2, 0.5),
        ];
        let eval = QueryEvaluator::new("q", entries, judged(&[("a", 1), ("b", 1)]));
        let ranks: Vec<usize> = eval.context().retrieved().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
        assert_eq!(eval.relevant_retrieved_count(2), 1);
    }

    #[test]
    fn test_value_dispatch() {
        let eval = scenario();
        assert_eq!(eval.value(&MetricSpec::new(Metric::NumRet, None)), 3.0);
        assert_eq!(eval.value(&MetricSpec::new(Metric::NumRel, None)), 2.0);
        assert_eq!(eval.value(&MetricSpec::new(Metric::NumRelRet, None)), 2.0);
        assert_eq!(eval.value(&MetricSpec::at(Metric::Precision, 2)), eval.precision(2));
        assert_eq!(eval.value(&MetricSpec::new(Metric::Recall, None)), eval.recall(3));
        assert_eq!(eval.value(&MetricSpec::at(Metric::Ndcg, 2)), eval.ndcg(2));
        assert_eq!(eval.value(&MetricSpec::new(Metric::Ndcg, None)), eval.ndcg_full());
        assert_eq!(
            eval.value(&MetricSpec::new(Metric::AveragePrecision, None)),
            eval.average_precision()
        );
    }
}
