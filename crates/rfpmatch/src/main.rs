mod cli;
mod config;
mod extract;
mod ingest;
mod logging;
mod matching;
mod respond;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::PipelineConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    let config = PipelineConfig::from_env()?;
    match cli.command {
        Command::Extract {
            input,
            output,
            classify,
        } => extract::run(input, output, classify, &config),
        Command::Ingest {
            corpus,
            namespace,
            batch_size,
            index_dir,
        } => ingest::run(corpus, namespace, batch_size, index_dir, &config),
        Command::Match {
            corpus,
            skills,
            namespace,
            top_k,
            output,
            index_dir,
        } => matching::run(corpus, skills, namespace, top_k, output, index_dir, &config),
        Command::Respond {
            corpus,
            skills,
            namespace,
            top_fraction,
            top_k,
            delay_ms,
            output,
            index_dir,
        } => respond::run(
            corpus,
            skills,
            namespace,
            top_fraction,
            top_k,
            delay_ms,
            output,
            index_dir,
            &config,
        ),
    }
}
