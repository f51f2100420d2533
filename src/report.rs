//! Report rows for per-query and set-level results, rendered either in
//! trec_eval relational style or as JSON.

use serde::Serialize;

use crate::query::QueryEvaluator;
use crate::set::SetEvaluator;
use crate::types::MetricSpec;

/// Query column value used for set-level rows.
pub const ALL_QUERIES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    Count(usize),
    Score(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub metric: String,
    pub value: RowValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub metrics: Vec<MetricRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryReport>,
    pub summary: QueryReport,
}

/// Headline figures for one run in a batch comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run: String,
    pub num_q: usize,
    pub map: f64,
    pub mrr: f64,
    pub p_10: f64,
    pub ndcg_15: f64,
}

impl RunSummary {
    pub fn new(run: impl Into<String>, set: &SetEvaluator) -> Self {
        Self {
            run: run.into(),
            num_q: set.len(),
            map: set.mean_average_precision(),
            mrr: set.mean_reciprocal_rank(),
            p_10: set.mean_precision(10),
            ndcg_15: set.mean_ndcg(15),
        }
    }
}

fn row_value(spec: &MetricSpec, value: f64) -> RowValue {
    if spec.metric.is_count() {
        RowValue::Count(value as usize)
    } else {
        RowValue::Score(value)
    }
}

pub fn query_report(evaluator: &QueryEvaluator, specs: &[MetricSpec]) -> QueryReport {
    let metrics = specs
        .iter()
        .map(|spec| MetricRow {
            metric: spec.to_string(),
            value: row_value(spec, evaluator.value(spec)),
        })
        .collect();

    QueryReport {
        query: evaluator.query_id().to_string(),
        metrics,
    }
}

/// Build the set report; `num_q` always leads the summary.
pub fn set_report(set: &SetEvaluator, specs: &[MetricSpec], per_query: bool) -> Report {
    let queries = if per_query {
        set.iter().map(|e| query_report(e, specs)).collect()
    } else {
        Vec::new()
    };

    let mut metrics = vec![MetricRow {
        metric: "num_q".to_string(),
        value: RowValue::Count(set.len()),
    }];
    metrics.extend(specs.iter().map(|spec| MetricRow {
        metric: spec.mean_label(),
        value: row_value(spec, set.value(spec)),
    }));

    Report {
        queries,
        summary: QueryReport {
            query: ALL_QUERIES.to_string(),
            metrics,
        },
    }
}

/// One `metric<TAB>query<TAB>value` line per row.
pub fn render_query(report: &QueryReport) -> String {
    let mut out = String::new();
    for row in &report.metrics {
        let line = match row.value {
            RowValue::Count(n) => format!("{:<25}\t{:>5}\t{:>6}\n", row.metric, report.query, n),
            RowValue::Score(v) => {
                format!("{:<25}\t{:>5}\t{:>6.4}\n", row.metric, report.query, v)
            }
        };
        out.push_str(&line);
    }
    out
}

pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    for query in &report.queries {
        out.push_str(&render_query(query));
    }
    out.push_str(&render_query(&report.summary));
    out
}

pub fn render_batch(rows: &[RunSummary]) -> String {
    let width = rows
        .iter()
        .map(|r| r.run.len())
        .max()
        .unwrap_or(0)
        .max("run".len());

    let mut out = format!(
        "{:<width$}  {:>6}  {:>6}  {:>6}  {:>6}  {:>7}\n",
        "run", "num_q", "MAP", "MRR", "P@10", "NDCG@15"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<width$}  {:>6}  {:>6.4}  {:>6.4}  {:>6.4}  {:>7.4}\n",
            row.run, row.num_q, row.map, row.mrr, row.p_10, row.ndcg_15
        ));
    }
    out
}
