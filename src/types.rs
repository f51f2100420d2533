use serde::Serialize;

/// Highest grade that contributes its own NDCG gain. Judgment files with a
/// larger grade are rejected.
pub const MAX_GRADE: i32 = 64;

/// A graded relevance judgment for one document of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelevanceJudgment {
    pub doc_id: String,
    pub grade: i32,
}

impl RelevanceJudgment {
    pub fn new(doc_id: impl Into<String>, grade: i32) -> Self {
        Self {
            doc_id: doc_id.into(),
            grade,
        }
    }

    /// Positive grades are relevant; zero and negative grades are not.
    pub fn is_relevant(&self) -> bool {
        self.grade > 0
    }
}

/// One document of a ranked run, after ranks have been assigned.
///
/// `rank` is 1-based and contiguous within a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub doc_id: String,
    pub rank: usize,
    pub score: f64,
}

impl RankedEntry {
    pub fn new(doc_id: impl Into<String>, rank: usize, score: f64) -> Self {
        Self {
            doc_id: doc_id.into(),
            rank,
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    NumRet,
    NumRel,
    NumRelRet,
    Precision,
    Recall,
    F1,
    Ndcg,
    ReciprocalRank,
    AveragePrecision,
}

impl Metric {
    /// Per-query label, as printed in trec_eval relational output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NumRet => "num_ret",
            Self::NumRel => "num_rel",
            Self::NumRelRet => "num_rel_ret",
            Self::Precision => "P",
            Self::Recall => "R",
            Self::F1 => "F1",
            Self::Ndcg => "NDCG",
            Self::ReciprocalRank => "RR",
            Self::AveragePrecision => "AP",
        }
    }

    /// Label used for the set-level mean, where it differs from the per-query one.
    pub fn mean_label(&self) -> &'static str {
        match self {
            Self::ReciprocalRank => "MRR",
            Self::AveragePrecision => "MAP",
            other => other.as_str(),
        }
    }

    /// Whether the metric is a document count rather than a score.
    pub fn is_count(&self) -> bool {
        matches!(self, Self::NumRet | Self::NumRel | Self::NumRelRet)
    }

    /// Whether the metric needs a rank cutoff to be evaluated.
    pub fn requires_cutoff(&self) -> bool {
        matches!(self, Self::Precision | Self::Recall | Self::F1)
    }

    /// Whether a cutoff is meaningful at all.
    pub fn accepts_cutoff(&self) -> bool {
        matches!(self, Self::Precision | Self::Recall | Self::F1 | Self::Ndcg)
    }
}

impl std::str::FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "num_ret" => Ok(Self::NumRet),
            "num_rel" => Ok(Self::NumRel),
            "num_rel_ret" => Ok(Self::NumRelRet),
            "p" | "precision" => Ok(Self::Precision),
            "r" | "recall" => Ok(Self::Recall),
            "f1" => Ok(Self::F1),
            "ndcg" => Ok(Self::Ndcg),
            "rr" | "mrr" => Ok(Self::ReciprocalRank),
            "ap" | "map" => Ok(Self::AveragePrecision),
            _ => Err(anyhow::anyhow!("unknown metric: '{s}'")),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named metric at an optional rank cutoff, e.g. `P@10`, `NDCG@15`, `MAP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MetricSpec {
    pub metric: Metric,
    pub cutoff: Option<usize>,
}

impl MetricSpec {
    pub fn new(metric: Metric, cutoff: Option<usize>) -> Self {
        Self { metric, cutoff }
    }

    pub fn at(metric: Metric, k: usize) -> Self {
        Self::new(metric, Some(k))
    }

    /// The rows printed when no `--metric` is given.
    pub fn default_report() -> Vec<Self> {
        vec![
            Self::new(Metric::NumRet, None),
            Self::new(Metric::NumRel, None),
            Self::new(Metric::NumRelRet, None),
            Self::at(Metric::Ndcg, 15),
            Self::new(Metric::ReciprocalRank, None),
            Self::at(Metric::Precision, 5),
            Self::at(Metric::Precision, 10),
            Self::at(Metric::Recall, 10),
            Self::at(Metric::F1, 10),
            Self::new(Metric::AveragePrecision, None),
        ]
    }

    /// Label for a set-level row (`MRR`, `MAP`, `P@10`, ...).
    pub fn mean_label(&self) -> String {
        match self.cutoff {
            Some(k) => format!("{}@{k}", self.metric.mean_label()),
            None => self.metric.mean_label().to_string(),
        }
    }
}

impl std::str::FromStr for MetricSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (name, cutoff) = match s.split_once('@') {
            Some((name, k)) => {
                let k: usize = k
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid cutoff in metric '{s}'"))?;
                (name, Some(k))
            }
            None => (s, None),
        };
        let metric: Metric = name.parse()?;

        if cutoff.is_some() && !metric.accepts_cutoff() {
            anyhow::bail!("metric '{metric}' does not take a cutoff");
        }
        if cutoff.is_none() && metric.requires_cutoff() {
            anyhow::bail!("metric '{metric}' needs a cutoff, e.g. '{metric}@10'");
        }
        Ok(Self { metric, cutoff })
    }
}

impl std::fmt::Display for MetricSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cutoff {
            Some(k) => write!(f, "{}@{k}", self.metric),
            None => f.write_str(self.metric.as_str()),
        }
    }
}
