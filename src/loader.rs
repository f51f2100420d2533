//! Readers for TREC-format judgment (qrels) and run files.
//!
//! qrels: `qid iter docno grade`
//! run:   `qid Q0 docno rank score [tag]`
//!
//! Fields are whitespace separated. Blank lines and lines starting with `#`
//! are skipped.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::types::{RankedEntry, RelevanceJudgment, MAX_GRADE};

/// Judgments grouped by query id, in file order.
pub type Qrels = BTreeMap<String, Vec<RelevanceJudgment>>;

/// Ranked entries grouped by query id, ranks already assigned.
pub type Runs = BTreeMap<String, Vec<RankedEntry>>;

/// A run line before ranks are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f64,
}

pub fn load_qrels(path: impl AsRef<Path>) -> Result<Qrels> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open judgments file {}", path.display()))?;
    parse_qrels(BufReader::new(file))
        .with_context(|| format!("Failed to read judgments file {}", path.display()))
}

pub fn load_run(path: impl AsRef<Path>) -> Result<Runs> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open run file {}", path.display()))?;
    parse_run(BufReader::new(file))
        .with_context(|| format!("Failed to read run file {}", path.display()))
}

pub fn parse_qrels(reader: impl BufRead) -> Result<Qrels> {
    let mut qrels = Qrels::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let fields = match split_fields(&line) {
            Some(f) => f,
            None => continue,
        };
        anyhow::ensure!(
            fields.len() >= 4,
            "line {}: expected 'qid iter docno grade', got {} fields",
            line_no + 1,
            fields.len()
        );

        let grade = parse_grade(fields[3])
            .with_context(|| format!("line {}: invalid grade '{}'", line_no + 1, fields[3]))?;

        qrels
            .entry(fields[0].to_string())
            .or_default()
            .push(RelevanceJudgment::new(fields[2], grade));
    }

    debug!(queries = qrels.len(), "parsed judgments");
    Ok(qrels)
}

/// Parse a run file and assign ranks per query.
///
/// The rank column of the file is not trusted: entries are re-ranked by
/// descending score, see [`assign_ranks`].
pub fn parse_run(reader: impl BufRead) -> Result<Runs> {
    let mut scored: BTreeMap<String, Vec<ScoredDoc>> = BTreeMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let fields = match split_fields(&line) {
            Some(f) => f,
            None => continue,
        };
        anyhow::ensure!(
            fields.len() >= 5,
            "line {}: expected 'qid Q0 docno rank score [tag]', got {} fields",
            line_no + 1,
            fields.len()
        );

        let score = match fields[4].parse::<f64>() {
            Ok(s) if s.is_finite() => s,
            _ => {
                warn!(line = line_no + 1, score = fields[4], "unusable score, using 0.0");
                0.0
            }
        };

        scored
            .entry(fields[0].to_string())
            .or_default()
            .push(ScoredDoc {
                doc_id: fields[2].to_string(),
                score,
            });
    }

    let runs: Runs = scored
        .into_iter()
        .map(|(query_id, docs)| {
            let ranked = assign_ranks(&query_id, docs);
            (query_id, ranked)
        })
        .collect();

    debug!(queries = runs.len(), "parsed run");
    Ok(runs)
}

/// Sort by descending score and number the result 1, 2, 3, ...
///
/// The sort is stable: documents with equal scores keep their input order.
/// A document listed more than once keeps only its best-scored occurrence.
pub fn assign_ranks(query_id: &str, mut docs: Vec<ScoredDoc>) -> Vec<RankedEntry> {
    docs.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen: HashSet<String> = HashSet::with_capacity(docs.len());
    let mut ranked = Vec::with_capacity(docs.len());
    for doc in docs {
        if !seen.insert(doc.doc_id.clone()) {
            warn!(query = query_id, doc = %doc.doc_id, "duplicate document in run, dropped");
            continue;
        }
        ranked.push(RankedEntry::new(doc.doc_id, ranked.len() + 1, doc.score));
    }
    ranked
}

fn split_fields(line: &str) -> Option<Vec<&str>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(trimmed.split_whitespace().collect())
}

/// Integer grade no larger than [`MAX_GRADE`]; fractional grades are rounded.
fn parse_grade(raw: &str) -> Result<i32> {
    let grade = match raw.parse::<i32>() {
        Ok(g) => g,
        Err(_) => {
            let value: f64 = raw.parse()?;
            anyhow::ensure!(value.is_finite(), "grade must be finite");
            value.round() as i32
        }
    };
    anyhow::ensure!(grade <= MAX_GRADE, "grade must be at most {MAX_GRADE}");
    Ok(grade)
}
