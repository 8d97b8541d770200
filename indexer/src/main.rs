use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use wvtool_core::config::{ComponentSpec, IdOrder, TaskConfig, DEFAULT_MAX_DF, DEFAULT_MERGE_FAN_IN, DEFAULT_MIN_DF, DEFAULT_SORT_BUFFER};
use wvtool_core::encoding::DEFAULT_ENCODING;
use wvtool_core::ingest::SourceStatus;
use wvtool_core::registry::{PipelineSpec, INPUT_FILTERS, LOADERS, NORMALIZERS, STEMMERS, TOKENIZERS};
use wvtool_core::task::Task;
use wvtool_core::weighting::WeightingMethod;

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wvtool")]
#[command(about = "Convert a document corpus into sparse weighted term vectors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TaskArgs {
    /// Task name; every artifact is written as <output>/<task>.<ext>
    #[arg(short, long)]
    task: String,
    /// Output folder
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a corpus and write its weighted vectors
    Index {
        #[command(flatten)]
        task: TaskArgs,
        /// Loader name, e.g. LocalKVFileLoader
        #[arg(long)]
        loader: String,
        /// Loader options, "a=x&b=y" or a JSON object
        #[arg(long, default_value = "")]
        loader_op: String,
        #[arg(long, default_value = "DummyInputFilter")]
        input_filter: String,
        #[arg(long, default_value = "")]
        input_filter_op: String,
        #[arg(long, default_value = "CharTokenizer")]
        tokenizer: String,
        #[arg(long, default_value = "")]
        tokenizer_op: String,
        #[arg(long, default_value = "DummyWordFilter")]
        word_filter: String,
        #[arg(long, default_value = "")]
        word_filter_op: String,
        #[arg(long, default_value = "DummyStemmer")]
        stemmer: String,
        #[arg(long, default_value = "")]
        stemmer_op: String,
        /// Weighting method: TF or TFIDF
        #[arg(short, long, default_value = "TFIDF")]
        weighting: String,
        /// Tokens found in fewer documents are pruned
        #[arg(long, default_value_t = DEFAULT_MIN_DF)]
        min_df: u32,
        /// Tokens found in more documents are pruned
        #[arg(long, default_value_t = DEFAULT_MAX_DF)]
        max_df: u32,
        /// Fixed dictionary, one token per line; disables pruning
        #[arg(short, long)]
        user_dict: Option<PathBuf>,
        /// Order of renumbered token ids: first-seen or lexical
        #[arg(long, default_value = "first-seen")]
        id_order: String,
        /// Posting events kept in memory before spilling a sorted run
        #[arg(long, default_value_t = DEFAULT_SORT_BUFFER)]
        sort_buffer: usize,
        /// Sorted runs merged per pass
        #[arg(long, default_value_t = DEFAULT_MERGE_FAN_IN)]
        merge_fan_in: usize,
        /// Encoding of corpus files and the user dictionary, e.g. utf-8, gbk
        #[arg(short, long, default_value = DEFAULT_ENCODING)]
        encoding: String,
    },
    /// Re-weight an already indexed task
    Vectorize {
        #[command(flatten)]
        task: TaskArgs,
        #[arg(short, long, default_value = "TFIDF")]
        weighting: String,
    },
    /// List the registered component names
    Components,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            task, loader, loader_op, input_filter, input_filter_op, tokenizer, tokenizer_op,
            word_filter, word_filter_op, stemmer, stemmer_op, weighting, min_df, max_df,
            user_dict, id_order, sort_buffer, merge_fan_in, encoding,
        } => {
            let mut config = TaskConfig::new(task.task, task.output);
            config.min_df = min_df;
            config.max_df = max_df;
            config.user_dict = user_dict;
            config.id_order = id_order.parse::<IdOrder>()?;
            config.sort_buffer = sort_buffer;
            config.merge_fan_in = merge_fan_in;
            config.encoding = encoding.clone();
            let pipeline = PipelineSpec {
                loader: ComponentSpec::new(loader, loader_op),
                input_filter: ComponentSpec::new(input_filter, input_filter_op),
                tokenizer: ComponentSpec::new(tokenizer, tokenizer_op),
                word_filter: ComponentSpec::new(word_filter, word_filter_op),
                stemmer: ComponentSpec::new(stemmer, stemmer_op),
                encoding,
            };
            run_index(config, &pipeline, &weighting)
        }
        Commands::Vectorize { task, weighting } => {
            let method: WeightingMethod = weighting.parse()?;
            let task = Task::new(TaskConfig::new(task.task, task.output))?;
            let docs = task.create_vectors(method).context("weighting failed")?;
            tracing::info!(docs, "vectorize complete");
            Ok(())
        }
        Commands::Components => {
            for (kind, names) in [
                (LOADERS.kind(), LOADERS.names().collect::<Vec<_>>()),
                (INPUT_FILTERS.kind(), INPUT_FILTERS.names().collect()),
                (TOKENIZERS.kind(), TOKENIZERS.names().collect()),
                (NORMALIZERS.kind(), NORMALIZERS.names().collect()),
                (STEMMERS.kind(), STEMMERS.names().collect()),
            ] {
                println!("{kind}: {}", names.join(", "));
            }
            Ok(())
        }
    }
}

fn run_index(config: TaskConfig, pipeline: &PipelineSpec, weighting: &str) -> Result<()> {
    // all configuration is resolved before any file is touched
    let method: WeightingMethod = weighting.parse()?;
    let task = Task::new(config)?;
    let (mut loader, analyzer) = pipeline.build()?;

    let report = task
        .index_corpus(loader.as_mut(), &analyzer)
        .context("indexing failed")?;
    task.create_vectors(method).context("weighting failed")?;

    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    task.write_manifest(&report, pipeline, method, created_at)?;

    if let SourceStatus::Unavailable(reason) = &report.source {
        bail!("corpus source could not be opened, no documents were indexed: {reason}");
    }
    tracing::info!(output = %task.config().output_folder.display(), "task complete");
    Ok(())
}
