mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports go to stdout; diagnostics (skipped queries, bad scores) to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Command::Eval {
            qrels,
            run,
            per_query,
            metrics,
            complete,
        } => commands::cmd_eval(&qrels, &run, per_query, &metrics, complete, cli.json),
        Command::Query {
            qrels,
            run,
            query_id,
            metrics,
        } => commands::cmd_query(&qrels, &run, &query_id, &metrics, cli.json),
        Command::Metric {
            qrels,
            run,
            metric,
            complete,
        } => commands::cmd_metric(&qrels, &run, &metric, complete, cli.json),
        Command::Batch {
            qrels,
            dir,
            complete,
        } => commands::cmd_batch(&qrels, &dir, complete, cli.json),
    }
}
