//! JobScrape CLI
//!
//! Runs the job pipeline once against the boards listed in `jobscrape.toml`
//! and writes the sorted result to the configured outputs.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use job_pipeline::plan::{FetchJobsTool, SortJobsTool, SummarizeJobsTool};
use job_pipeline::{
    execute_plan, FieldSorter, HttpJobSource, HttpSession, JobSink, JobSource, JsonLinesSink,
    LogSink, OpenAiSummarizer, Pipeline, Plan, PostgresSink, RunOutcome, SqliteSink, Summarizer,
    ToolRegistry, TsvSink,
};
use openai_client::OpenAIClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "jobscrape")]
#[command(about = "Fetch job boards, summarize listings with AI, write a sorted table")]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = "jobscrape.toml")]
    config: PathBuf,

    /// Cap jobs summarized per source
    #[arg(long)]
    dev: bool,

    /// Per-source cap in dev mode
    #[arg(long)]
    job_limit: Option<usize>,

    /// Sources processed concurrently
    #[arg(long)]
    max_workers: Option<usize>,

    /// Write a TSV file here instead of the configured one
    #[arg(long)]
    tsv: Option<PathBuf>,

    /// Also write JSON lines here
    #[arg(long)]
    jsonl: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once (default)
    Run,

    /// Execute a JSON step plan over the configured sources
    Plan { file: PathBuf },

    /// List the tools available to step plans
    Tools,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,job_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.config)?;
    apply_overrides(&cli, &mut config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(&config).await,
        Commands::Plan { file } => run_plan(&config, &file).await,
        Commands::Tools => {
            let registry = build_registry(&config)?;
            println!("{}", serde_json::to_string_pretty(&registry.describe())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn apply_overrides(cli: &Cli, config: &mut AppConfig) {
    if cli.dev {
        config.pipeline.dev_mode = true;
    }
    if let Some(limit) = cli.job_limit {
        config.pipeline.dev_mode_job_limit = limit;
    }
    if let Some(workers) = cli.max_workers {
        config.pipeline.max_workers = workers;
    }
    if let Some(tsv) = &cli.tsv {
        config.output.tsv = Some(tsv.clone());
    }
    if let Some(jsonl) = &cli.jsonl {
        config.output.jsonl = Some(jsonl.clone());
    }
}

async fn run_pipeline(config: &AppConfig) -> Result<ExitCode> {
    let mut builder = Pipeline::builder()
        .summarizer_arc(build_summarizer(config)?)
        .sorter(FieldSorter::new(
            config.pipeline.sort_by,
            config.pipeline.sort_order,
        ))
        .config(config.pipeline.to_pipeline_config());

    for source in build_sources(config)? {
        builder = builder.source_arc(source);
    }
    for sink in build_sinks(config).await? {
        builder = builder.sink_arc(sink);
    }

    let pipeline = builder.build().context("Failed to build pipeline")?;
    let report = pipeline.run().await;

    print!("{report}");

    Ok(match report.outcome {
        RunOutcome::AllSourcesFailed => ExitCode::from(2),
        RunOutcome::Completed | RunOutcome::NoJobs if !report.all_sinks_succeeded() => {
            ExitCode::from(3)
        }
        RunOutcome::Completed | RunOutcome::NoJobs => ExitCode::SUCCESS,
    })
}

async fn run_plan(config: &AppConfig, file: &Path) -> Result<ExitCode> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read plan file {}", file.display()))?;
    let plan = Plan::from_json(&json).context("Invalid plan")?;

    let registry = build_registry(config)?;
    let outputs = execute_plan(&plan, &registry)
        .await
        .context("Plan failed")?;

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(ExitCode::SUCCESS)
}

fn build_registry(config: &AppConfig) -> Result<ToolRegistry> {
    let pipeline = config.pipeline.to_pipeline_config();
    pipeline
        .validate()
        .context("Invalid pipeline configuration")?;

    let mut registry = ToolRegistry::new();
    registry.register(
        FetchJobsTool::new(build_sources(config)?).with_retry(pipeline.fetch_retry.clone()),
    );
    registry.register(SummarizeJobsTool::new(build_summarizer(config)?).with_config(pipeline));
    registry.register(SortJobsTool::new(Arc::new(FieldSorter::new(
        config.pipeline.sort_by,
        config.pipeline.sort_order,
    ))));
    Ok(registry)
}

fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn JobSource>>> {
    let session = Arc::new(
        HttpSession::new(config.http.to_session_config())
            .context("Failed to create HTTP session")?,
    );

    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

    Ok(config
        .enabled_sources()
        .map(|source| {
            tracing::info!(source = %source.name, url = %source.url, "Configured source");
            Arc::new(HttpJobSource::new(
                source.to_source_config(env),
                Arc::clone(&session),
            )) as Arc<dyn JobSource>
        })
        .collect())
}

fn build_summarizer(config: &AppConfig) -> Result<Arc<dyn Summarizer>> {
    let ai = &config.ai;

    let mut client = OpenAIClient::from_env().context("OPENAI_API_KEY must be set")?;
    if let Some(base_url) = &ai.base_url {
        client = client.with_base_url(base_url);
    }

    let mut summarizer = OpenAiSummarizer::new(client)
        .with_model(&ai.model)
        .with_temperature(ai.temperature)
        .with_max_tokens(ai.max_tokens);

    if let Some(path) = &ai.prompt_file {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
        summarizer = summarizer.with_prompt(prompt);
    }
    if let Some(path) = &ai.profile_file {
        let profile = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file {}", path.display()))?;
        summarizer = summarizer.with_profile(profile);
    }

    Ok(Arc::new(summarizer))
}

async fn build_sinks(config: &AppConfig) -> Result<Vec<Arc<dyn JobSink>>> {
    let output = &config.output;
    let mut sinks: Vec<Arc<dyn JobSink>> = Vec::new();

    if let Some(path) = &output.tsv {
        let sink = TsvSink::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        sinks.push(Arc::new(sink));
    }
    if let Some(path) = &output.jsonl {
        let sink = JsonLinesSink::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        sinks.push(Arc::new(sink));
    }
    if let Some(url) = &output.sqlite {
        let sink = SqliteSink::new(url)
            .await
            .context("Failed to open SQLite sink")?;
        sinks.push(Arc::new(sink));
    }
    if output.postgres {
        let url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set when output.postgres is enabled")?;
        let sink = PostgresSink::new(&url)
            .await
            .context("Failed to connect to Postgres")?;
        sinks.push(Arc::new(sink));
    }
    if output.log {
        sinks.push(Arc::new(LogSink::new()));
    }

    Ok(sinks)
}
