use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use trecscore::loader::{self, Qrels};
use trecscore::report::{self, RunSummary};
use trecscore::{MetricSpec, SetEvaluator};

/// Print `data` as pretty JSON if `json` is true, otherwise call `human_fmt`.
fn output<T: Serialize>(data: &T, json: bool, human_fmt: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        human_fmt(data);
    }
    Ok(())
}

fn load_set(qrels_path: &str, run_path: &str, complete: bool) -> Result<SetEvaluator> {
    let qrels = loader::load_qrels(qrels_path)?;
    let runs = loader::load_run(run_path)?;
    Ok(SetEvaluator::build(runs, qrels, complete))
}

fn specs_or_default(metrics: &[MetricSpec]) -> Vec<MetricSpec> {
    if metrics.is_empty() {
        MetricSpec::default_report()
    } else {
        metrics.to_vec()
    }
}

/// Evaluate a run and print set-level means, optionally preceded by every query.
pub fn cmd_eval(
    qrels: &str,
    run: &str,
    per_query: bool,
    metrics: &[MetricSpec],
    complete: bool,
    json: bool,
) -> Result<()> {
    debug!(qrels, run, per_query, complete, "eval");
    let set = load_set(qrels, run, complete)?;
    if set.is_empty() {
        warn!("no query in the run has judgments; every mean is 0");
    }

    let specs = specs_or_default(metrics);
    let result = report::set_report(&set, &specs, per_query);

    output(&result, json, |r| print!("{}", report::render_report(r)))
}

/// Show every requested metric for a single query.
pub fn cmd_query(
    qrels: &str,
    run: &str,
    query_id: &str,
    metrics: &[MetricSpec],
    json: bool,
) -> Result<()> {
    debug!(qrels, run, query = query_id, "query");
    let set = load_set(qrels, run, false)?;
    let evaluator = set.get(query_id)?;

    let specs = specs_or_default(metrics);
    let result = report::query_report(evaluator, &specs);

    output(&result, json, |r| print!("{}", report::render_query(r)))
}

#[derive(Debug, Serialize)]
struct MetricValue {
    metric: String,
    num_q: usize,
    value: f64,
}

/// Print a single set-level value.
pub fn cmd_metric(
    qrels: &str,
    run: &str,
    metric: &MetricSpec,
    complete: bool,
    json: bool,
) -> Result<()> {
    debug!(qrels, run, metric = %metric, complete, "metric");
    let set = load_set(qrels, run, complete)?;

    let result = MetricValue {
        metric: metric.mean_label(),
        num_q: set.len(),
        value: set.value(metric),
    };

    output(&result, json, |r| {
        if metric.metric.is_count() {
            println!("{}\t{}", r.metric, r.value as usize);
        } else {
            println!("{}\t{:.4}", r.metric, r.value);
        }
    })
}

/// Evaluate every run file under `dir` against one set of judgments.
pub fn cmd_batch(qrels_path: &str, dir: &str, complete: bool, json: bool) -> Result<()> {
    let qrels = loader::load_qrels(qrels_path)?;
    let root = Path::new(dir);
    let qrels_canonical = Path::new(qrels_path).canonicalize().ok();

    let rows = evaluate_directory(&qrels, root, qrels_canonical.as_deref(), complete)?;

    output(&rows, json, |rows| {
        if rows.is_empty() {
            println!("No run files found in {dir}");
            return;
        }
        print!("{}", report::render_batch(rows));
    })
}

fn evaluate_directory(
    qrels: &Qrels,
    root: &Path,
    skip: Option<&Path>,
    complete: bool,
) -> Result<Vec<RunSummary>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve run directory {}", root.display()))?;

    let mut rows = Vec::new();
    for entry in WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "directory walk error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if skip.is_some_and(|s| path.canonicalize().ok().as_deref() == Some(s)) {
            continue;
        }
        let name = path
            .strip_prefix(&root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let runs = match loader::load_run(path) {
            Ok(r) => r,
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(file = %name, error = %reason, "skipping unreadable run");
                continue;
            }
        };

        let set = SetEvaluator::build(runs, qrels.clone(), complete);
        info!(file = %name, queries = set.len(), "evaluated run");
        rows.push(RunSummary::new(name, &set));
    }

    Ok(rows)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
