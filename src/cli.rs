use clap::{Parser, Subcommand};

use trecscore::MetricSpec;

#[derive(Debug, Parser)]
#[command(name = "trecscore")]
#[command(about = "Score ranked retrieval runs against relevance judgments.")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate a run and print set-level means
    Eval {
        /// Judgments file (qid iter docno grade)
        qrels: String,

        /// Run file (qid Q0 docno rank score tag)
        run: String,

        /// Also print every query before the summary
        #[arg(long)]
        per_query: bool,

        /// Metric to report, e.g. P@10, NDCG@15, MAP (repeatable; default: standard set)
        #[arg(long = "metric", short = 'm')]
        metrics: Vec<MetricSpec>,

        /// Score judged queries missing from the run as empty rankings
        #[arg(long, short = 'c')]
        complete: bool,
    },

    /// Show every metric for a single query
    Query {
        /// Judgments file
        qrels: String,

        /// Run file
        run: String,

        /// Query id to report
        query_id: String,

        /// Metric to report (repeatable; default: standard set)
        #[arg(long = "metric", short = 'm')]
        metrics: Vec<MetricSpec>,
    },

    /// Print one set-level value, e.g. `MAP` or `NDCG@10`
    Metric {
        /// Judgments file
        qrels: String,

        /// Run file
        run: String,

        /// Metric label
        metric: MetricSpec,

        /// Score judged queries missing from the run as empty rankings
        #[arg(long, short = 'c')]
        complete: bool,
    },

    /// Evaluate every run file under a directory against the same judgments
    Batch {
        /// Judgments file
        qrels: String,

        /// Directory of run files
        #[arg(default_value = ".")]
        dir: String,

        /// Score judged queries missing from the run as empty rankings
        #[arg(long, short = 'c')]
        complete: bool,
    },
}
