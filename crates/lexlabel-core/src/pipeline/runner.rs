//! Sequential labeling loop with pacing, checkpoints and progress events.

use std::sync::Arc;
use std::time::Duration;

use lexlabel_llm::{DelayStrategy, LinearBackoff, LlmProvider, Message, RetryPolicy};
use tokio::sync::mpsc;

use super::invoke::{invoke_structured, invoke_text};
use super::sink::OutputSink;
use super::source::InputItem;
use super::task::{Decomposition, FailureMode, OutputRecord, SkipReason, Task, TaskKind};

pub type EventSender = mpsc::UnboundedSender<LabelEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelEvent {
    Started {
        total: usize,
    },
    ItemCompleted {
        index: usize,
        id: Option<String>,
        fallback: bool,
    },
    ItemSkipped {
        index: usize,
        id: Option<String>,
        reason: String,
    },
    ItemFailed {
        index: usize,
        id: Option<String>,
        error: String,
    },
    Checkpoint {
        records: usize,
    },
    Finished {
        succeeded: usize,
        skipped: usize,
        failed: usize,
        fallbacks: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Save the collection after every N processed items; 0 disables checkpoints.
    pub checkpoint_every: usize,
    /// Sleep between successive service invocations.
    pub pace: Duration,
    pub limit: Option<usize>,
    pub failure_mode: FailureMode,
}

impl RunOptions {
    #[must_use]
    pub fn for_task(kind: TaskKind) -> Self {
        Self {
            checkpoint_every: 0,
            pace: Duration::ZERO,
            limit: None,
            failure_mode: kind.default_failure_mode(),
        }
    }
}

/// Outcome of a full run. `succeeded + fallbacks + skipped + failed` equals the processed count.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    pub records: Vec<OutputRecord>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub fallbacks: usize,
}

impl RunReport {
    #[must_use]
    pub fn processed(&self) -> usize {
        self.succeeded + self.fallbacks + self.skipped + self.failed
    }
}

enum Outcome {
    Labeled(OutputRecord),
    Fallback(OutputRecord),
    Skipped(SkipReason),
    Failed(String),
}

pub struct Labeler<P, D = LinearBackoff> {
    provider: Arc<P>,
    task: Task,
    policy: RetryPolicy<D>,
    options: RunOptions,
    checkpoint: Option<OutputSink>,
    events: Option<EventSender>,
}

impl<P: LlmProvider, D: DelayStrategy> Labeler<P, D> {
    #[must_use]
    pub fn new(provider: Arc<P>, task: Task, policy: RetryPolicy<D>) -> Self {
        let options = RunOptions::for_task(task.kind());
        Self {
            provider,
            task,
            policy,
            options,
            checkpoint: None,
            events: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_checkpoint_sink(mut self, sink: OutputSink) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.events = Some(tx);
        self
    }

    /// Label `items` in order. Per-item failures never abort the run.
    pub async fn run(&self, items: &[InputItem]) -> RunReport {
        let total = self.options.limit.map_or(items.len(), |n| n.min(items.len()));
        let mut report = RunReport::default();
        let mut contacted = false;

        tracing::info!(task = %self.task.kind(), total, "labeling started");
        self.emit(LabelEvent::Started { total });

        for (index, item) in items.iter().take(total).enumerate() {
            let outcome = match self.task.render_request(item) {
                Err(reason) => Outcome::Skipped(reason),
                Ok(messages) => {
                    if contacted && !self.options.pace.is_zero() {
                        tokio::time::sleep(self.options.pace).await;
                    }
                    contacted = true;
                    self.generate(item, &messages).await
                }
            };
            self.record(index, total, item, outcome, &mut report);

            let processed = index + 1;
            if self.options.checkpoint_every > 0 && processed % self.options.checkpoint_every == 0 {
                self.save_checkpoint(&report.records).await;
            }
        }

        tracing::info!(
            records = report.records.len(),
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            fallbacks = report.fallbacks,
            "labeling finished"
        );
        self.emit(LabelEvent::Finished {
            succeeded: report.succeeded,
            skipped: report.skipped,
            failed: report.failed,
            fallbacks: report.fallbacks,
        });
        report
    }

    async fn generate(&self, item: &InputItem, messages: &[Message]) -> Outcome {
        let provider = self.provider.as_ref();
        match self.task.kind() {
            TaskKind::Decompose => {
                let decomposition: Decomposition = match invoke_structured(
                    provider,
                    messages,
                    self.task.params(),
                    &self.policy,
                    "decomposition",
                )
                .await
                {
                    Ok(d) => d,
                    Err(e) => return Outcome::Failed(e.to_string()),
                };
                let instruction_messages = self.task.render_instruction(&decomposition.facts);
                match invoke_text(
                    provider,
                    &instruction_messages,
                    self.task.instruction_params(),
                    &self.policy,
                    "instruction",
                )
                .await
                {
                    Ok(instruction) => Outcome::Labeled(self.task.instruction_record(
                        item,
                        &decomposition,
                        instruction.trim().to_owned(),
                    )),
                    Err(_) => Outcome::Fallback(self.task.instruction_record(
                        item,
                        &decomposition,
                        self.task.instruction_fallback().to_owned(),
                    )),
                }
            }
            TaskKind::Syllogism | TaskKind::CaseAnalysis => {
                let generated = invoke_text(
                    provider,
                    messages,
                    self.task.params(),
                    &self.policy,
                    "generation",
                )
                .await;
                match generated {
                    Ok(text) => {
                        Outcome::Labeled(self.task.text_record(item, text.trim().to_owned()))
                    }
                    Err(e) => match &self.options.failure_mode {
                        FailureMode::Skip => Outcome::Failed(e.to_string()),
                        FailureMode::Fallback(text) => {
                            Outcome::Fallback(self.task.text_record(item, text.clone()))
                        }
                    },
                }
            }
        }
    }

    fn record(
        &self,
        index: usize,
        total: usize,
        item: &InputItem,
        outcome: Outcome,
        report: &mut RunReport,
    ) {
        let position = index + 1;
        let id = item.id.clone();
        let label = id.as_deref().unwrap_or("-");
        match outcome {
            Outcome::Labeled(record) => {
                report.succeeded += 1;
                report.records.push(record);
                tracing::info!("[{position}/{total}] {label}: labeled");
                self.emit(LabelEvent::ItemCompleted {
                    index,
                    id,
                    fallback: false,
                });
            }
            Outcome::Fallback(record) => {
                report.fallbacks += 1;
                report.records.push(record);
                tracing::info!("[{position}/{total}] {label}: labeled with fallback text");
                self.emit(LabelEvent::ItemCompleted {
                    index,
                    id,
                    fallback: true,
                });
            }
            Outcome::Skipped(reason) => {
                report.skipped += 1;
                tracing::info!("[{position}/{total}] {label}: skipped, {reason}");
                self.emit(LabelEvent::ItemSkipped {
                    index,
                    id,
                    reason: reason.to_string(),
                });
            }
            Outcome::Failed(error) => {
                report.failed += 1;
                tracing::info!("[{position}/{total}] {label}: dropped after retries");
                self.emit(LabelEvent::ItemFailed { index, id, error });
            }
        }
    }

    async fn save_checkpoint(&self, records: &[OutputRecord]) {
        let Some(sink) = &self.checkpoint else {
            return;
        };
        match sink.save(records).await {
            Ok(()) => {
                tracing::info!(
                    path = %sink.path().display(),
                    records = records.len(),
                    "checkpoint saved"
                );
                self.emit(LabelEvent::Checkpoint {
                    records: records.len(),
                });
            }
            Err(e) => tracing::error!("checkpoint to {} failed: {e}", sink.path().display()),
        }
    }

    fn emit(&self, event: LabelEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
