use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rfpmatch", about = "Amplytics RFP matching CLI")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter a raw corpus export down to indexable records.
    Extract {
        input: String,
        #[arg(long)]
        output: String,
        /// Run the utility-industry classifier on each description.
        #[arg(long, default_value_t = false)]
        classify: bool,
    },
    /// Embed the corpus and upsert it into the vector index.
    Ingest {
        corpus: String,
        #[arg(long, default_value = "openai-no-chunk")]
        namespace: String,
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        #[arg(long, default_value = ".rfpmatch/index")]
        index_dir: String,
    },
    /// Report the top-k matches for each skill-set probe.
    Match {
        corpus: String,
        skills: String,
        #[arg(long, default_value = "openai-no-chunk")]
        namespace: String,
        #[arg(long, default_value_t = 3)]
        top_k: usize,
        #[arg(long)]
        output: String,
        #[arg(long, default_value = ".rfpmatch/index")]
        index_dir: String,
    },
    /// Score the whole corpus against the probes and draft responses for the
    /// top fraction.
    Respond {
        corpus: String,
        skills: String,
        #[arg(long, default_value = "openai-no-chunk")]
        namespace: String,
        #[arg(long, default_value_t = 0.1)]
        top_fraction: f64,
        /// Per-probe retrieval depth; defaults to the corpus size.
        #[arg(long)]
        top_k: Option<usize>,
        /// Delay between generation calls in milliseconds.
        #[arg(long, default_value_t = 3000)]
        delay_ms: u64,
        #[arg(long)]
        output: String,
        #[arg(long, default_value = ".rfpmatch/index")]
        index_dir: String,
    },
}
