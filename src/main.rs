use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lexlabel_core::config::Config;
use lexlabel_core::pipeline::{
    Labeler, OutputSink, RunReport, SourceFormat, TaskKind, load_items, run_file,
};
use lexlabel_llm::http::client_with_timeout;
use lexlabel_llm::openai::OpenAiProvider;

/// Generate pseudo-labeled legal training data with an OpenAI-compatible model.
#[derive(Debug, Parser)]
#[command(name = "lexlabel", version)]
struct Cli {
    /// Config file (falls back to LEXLABEL_CONFIG, then config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Task to run: decompose, syllogism or case-analysis
    #[arg(long)]
    task: Option<TaskKind>,
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    /// Stop after this many items
    #[arg(long)]
    limit: Option<usize>,
    /// Load and render items without calling the service
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    let pipeline = &config.pipeline;
    let source_format = SourceFormat::detect(&pipeline.input);
    let sink = OutputSink::new(&pipeline.output, pipeline.output_format());
    let task = config.task();

    if cli.dry_run {
        let items = load_items(&pipeline.input, source_format)
            .await
            .with_context(|| format!("failed to load {}", pipeline.input.display()))?;
        let limit = pipeline.limit.unwrap_or(items.len());
        let renderable = items
            .iter()
            .take(limit)
            .filter(|item| task.render_request(item).is_ok())
            .count();
        println!(
            "dry run: {renderable} of {} item(s) would be sent for task {}",
            items.len().min(limit),
            task.kind()
        );
        return Ok(());
    }

    let api_key = config.api_key()?.to_owned();
    let client = client_with_timeout(Duration::from_secs(config.llm.timeout_secs))?;
    let provider = OpenAiProvider::new(
        api_key,
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    )
    .with_client(client);
    tracing::info!(
        model = provider.model(),
        base_url = provider.base_url(),
        task = %task.kind(),
        output = %sink.path().display(),
        format = sink.format().as_str(),
        "using OpenAI-compatible provider"
    );

    let mut labeler = Labeler::new(Arc::new(provider), task, config.retry.policy())
        .with_options(pipeline.run_options());
    if pipeline.checkpoint_every > 0 {
        labeler = labeler.with_checkpoint_sink(sink.clone());
    }

    let report = run_file(&labeler, &pipeline.input, source_format, &sink)
        .await
        .context("labeling run failed")?;
    print_summary(&report, sink.path());
    Ok(())
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(task) = cli.task {
        config.pipeline.task = task;
    }
    if let Some(input) = &cli.input {
        config.pipeline.input.clone_from(input);
    }
    if let Some(output) = &cli.output {
        config.pipeline.output.clone_from(output);
    }
    if cli.limit.is_some() {
        config.pipeline.limit = cli.limit;
    }
}

fn print_summary(report: &RunReport, output: &Path) {
    println!(
        "generated {} records (skipped {}, failed {}, fallback {}) -> {}",
        report.records.len(),
        report.skipped,
        report.failed,
        report.fallbacks,
        output.display()
    );
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LEXLABEL_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_for_config_path() {
        let path = resolve_config_path(Some(Path::new("custom.toml")));
        assert_eq!(path, PathBuf::from("custom.toml"));
    }

    #[test]
    fn cli_overrides_pipeline_settings() {
        let cli = Cli::parse_from([
            "lexlabel",
            "--task",
            "syllogism",
            "--input",
            "data/questions.json",
            "--output",
            "out/syllogism.json",
            "--limit",
            "3",
        ]);
        let mut config = Config::default();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.pipeline.task, TaskKind::Syllogism);
        assert_eq!(config.pipeline.input, PathBuf::from("data/questions.json"));
        assert_eq!(config.pipeline.output, PathBuf::from("out/syllogism.json"));
        assert_eq!(config.pipeline.limit, Some(3));
        assert!(!cli.dry_run);
    }

    #[test]
    fn cli_rejects_unknown_task() {
        assert!(Cli::try_parse_from(["lexlabel", "--task", "summarize"]).is_err());
    }
}
