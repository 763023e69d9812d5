//! Load items, render task requests, invoke the service with bounded retry, and save records.

pub mod invoke;
pub mod runner;
pub mod sink;
pub mod source;
pub mod task;

use std::path::Path;

use lexlabel_llm::{DelayStrategy, LlmProvider};

pub use runner::{EventSender, LabelEvent, Labeler, RunOptions, RunReport};
pub use sink::{OutputFormat, OutputSink, SinkError, load_records};
pub use source::{InputItem, ItemContent, SourceError, SourceFormat, load_items};
pub use task::{Decomposition, FailureMode, OutputRecord, SkipReason, Task, TaskKind};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input error: {0}")]
    Source(#[from] SourceError),

    #[error("output error: {0}")]
    Sink(#[from] SinkError),
}

/// Label every item of `input` and write the final collection through `sink`.
///
/// # Errors
///
/// Returns an error if the input cannot be loaded or the final save fails.
/// Per-item generation failures are reflected in the report instead.
pub async fn run_file<P, D>(
    labeler: &Labeler<P, D>,
    input: &Path,
    format: SourceFormat,
    sink: &OutputSink,
) -> Result<RunReport, PipelineError>
where
    P: LlmProvider,
    D: DelayStrategy,
{
    let items = load_items(input, format).await?;
    let report = labeler.run(&items).await;
    sink.save(&report.records).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lexlabel_llm::mock::MockProvider;
    use lexlabel_llm::{NoDelay, RetryPolicy};

    use super::*;

    #[tokio::test]
    async fn run_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("law_documents.txt");
        std::fs::write(&input, "案件事实示例\n\n").unwrap();
        let output = dir.path().join("pseudo_law.jsonl");

        let mock = MockProvider::with_responses(vec![
            r#"{"facts":"A","law_articles":"B","conclusion":"C"}"#.into(),
            "请提取案件要素。".into(),
        ]);
        let labeler = Labeler::new(
            Arc::new(mock),
            Task::new(TaskKind::Decompose),
            RetryPolicy::new(3, NoDelay),
        );
        let sink = OutputSink::new(&output, OutputFormat::JsonLines);
        let report = run_file(&labeler, &input, SourceFormat::Lines, &sink)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        let saved = load_records(&output, OutputFormat::JsonLines).await.unwrap();
        assert_eq!(saved, report.records);
    }

    #[tokio::test]
    async fn run_file_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let labeler = Labeler::new(
            Arc::new(MockProvider::default()),
            Task::new(TaskKind::Syllogism),
            RetryPolicy::new(1, NoDelay),
        );
        let sink = OutputSink::new(dir.path().join("out.json"), OutputFormat::JsonArray);
        let err = run_file(&labeler, &dir.path().join("missing.json"), SourceFormat::Json, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
        assert!(!dir.path().join("out.json").exists());
    }
}
