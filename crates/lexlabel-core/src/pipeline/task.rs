//! Labeling tasks: prompt templates, generation parameters and output record shapes.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use lexlabel_llm::{GenerationParams, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sink::OutputFormat;
use super::source::{InputItem, ItemContent};

pub const DECOMPOSE_PROMPT: &str = "
请将下面的法律文书拆解为三部分：
1. facts: 案件事实
2. law_articles: 涉及的法条
3. conclusion: 法院裁决结论

要求严格返回 JSON，字段为 \"facts\", \"law_articles\", \"conclusion\"。
文书：
{document}
";

pub const INSTRUCTION_PROMPT: &str = "
请根据以下事实生成一条自然语言指令，用于训练法律大模型。
要求：
- 指令描述明确任务
- 用自然语言表达
- 不超过 50 个字

事实：
{facts}
";

pub const DEFAULT_INSTRUCTION_FALLBACK: &str = "请根据下文提取案件事实、法条和结论。";

pub const SYLLOGISM_PROMPT: &str = "
请根据以下案件事实或题目，按照法律三段论（大前提—小前提—结论）进行重构，生成高质量中文回答：
案件事实 / 题目：
{case_fact}

要求：
- 大前提：引用适用法律条文或原则
- 小前提：结合案件事实分析
- 结论：给出裁判结果或答案
- 使用中文
请严格按照以下格式输出：
大前提（适用法律）：
小前提（案件事实）：
结论（裁判结果 / 答案）：
";

pub const CASE_ANALYSIS_SYSTEM: &str = "你是一个专业的法律分析助手。";

pub const CASE_ANALYSIS_PROMPT: &str = "
你是一个法律分析助手。
请根据以下 JSON 格式的案件数据进行分析：
- 自动理解字段含义（例如 CaseRecord, JudgeReason, JudgeResult, LegalBasis 等）
- 给出三段式分析：
  1. 大前提：引用适用的法律条文或原则(只需列出条例,无需内容)
  2. 小前提：结合案件事实进行分析
  3. 结论：给出裁判结果或答案
请直接用自然语言概括输出，不需要 JSON 格式。

案件数据：
{case_json}
";

const DOCUMENT_FIELDS: [&str; 3] = ["document", "fact", "text"];
const SYLLOGISM_FIELDS: [&str; 3] = ["fact", "question", "query"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Split a judgment into facts, law articles and conclusion, then phrase an instruction.
    Decompose,
    /// Rewrite case facts or an exam question as a legal syllogism.
    Syllogism,
    /// Three-part analysis of a structured case record.
    CaseAnalysis,
}

impl TaskKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decompose => "decompose",
            Self::Syllogism => "syllogism",
            Self::CaseAnalysis => "case_analysis",
        }
    }

    /// Parameters of the first (or only) request of the task.
    #[must_use]
    pub const fn default_params(self) -> GenerationParams {
        match self {
            Self::Decompose => GenerationParams::new(0.0, 512),
            Self::Syllogism => GenerationParams::new(0.2, 500),
            Self::CaseAnalysis => GenerationParams::new(0.2, 1024),
        }
    }

    #[must_use]
    pub fn default_output_format(self) -> OutputFormat {
        match self {
            Self::Decompose => OutputFormat::JsonLines,
            Self::Syllogism | Self::CaseAnalysis => OutputFormat::JsonArray,
        }
    }

    #[must_use]
    pub fn default_failure_mode(self) -> FailureMode {
        match self {
            Self::Decompose | Self::Syllogism => FailureMode::Skip,
            Self::CaseAnalysis => FailureMode::Fallback(String::new()),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "decompose" => Ok(Self::Decompose),
            "syllogism" => Ok(Self::Syllogism),
            "case_analysis" => Ok(Self::CaseAnalysis),
            other => Err(format!(
                "unknown task `{other}` (expected decompose, syllogism or case_analysis)"
            )),
        }
    }
}

/// What to do with an item whose generation exhausted its attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    Skip,
    Fallback(String),
}

/// Reason an item never reached the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingField(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing or empty field `{field}`"),
        }
    }
}

/// Structured decomposition of a legal document. Exactly these three keys are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Decomposition {
    pub facts: String,
    pub law_articles: String,
    pub conclusion: String,
}

impl Decomposition {
    /// Compact JSON with keys in declaration order.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::json!({
            "facts": self.facts,
            "law_articles": self.law_articles,
            "conclusion": self.conclusion,
        })
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstructionRecord {
    pub document: String,
    pub instruction: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyllogismRecord {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseAnalysisRecord {
    pub case_id: Option<Value>,
    pub title: Option<Value>,
    pub reconstructed_analysis: String,
}

/// One generated training record, serialized without a type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Instruction(InstructionRecord),
    Syllogism(SyllogismRecord),
    CaseAnalysis(CaseAnalysisRecord),
}

/// A task variant with its resolved generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    kind: TaskKind,
    params: GenerationParams,
    instruction_params: GenerationParams,
    instruction_fallback: String,
}

impl Task {
    #[must_use]
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            params: kind.default_params(),
            instruction_params: GenerationParams::new(0.7, 50),
            instruction_fallback: DEFAULT_INSTRUCTION_FALLBACK.to_owned(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_instruction_fallback(mut self, text: impl Into<String>) -> Self {
        self.instruction_fallback = text.into();
        self
    }

    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    #[must_use]
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    #[must_use]
    pub fn instruction_params(&self) -> &GenerationParams {
        &self.instruction_params
    }

    #[must_use]
    pub fn instruction_fallback(&self) -> &str {
        &self.instruction_fallback
    }

    /// The text the task feeds into its template.
    ///
    /// # Errors
    ///
    /// Returns [`SkipReason::MissingField`] if a record item lacks every accepted source field.
    pub fn source_text<'a>(&self, item: &'a InputItem) -> Result<Cow<'a, str>, SkipReason> {
        match (self.kind, &item.content) {
            (TaskKind::CaseAnalysis, ItemContent::Record(_)) => {
                Ok(Cow::Owned(item.to_json_string()))
            }
            (_, ItemContent::Text(text)) if !text.trim().is_empty() => {
                Ok(Cow::Borrowed(text.as_str()))
            }
            (_, ItemContent::Text(_)) => Err(SkipReason::MissingField("text")),
            (TaskKind::Decompose, ItemContent::Record(_)) => item
                .first_field(&DOCUMENT_FIELDS)
                .map(Cow::Borrowed)
                .ok_or(SkipReason::MissingField("document")),
            (TaskKind::Syllogism, ItemContent::Record(_)) => item
                .first_field(&SYLLOGISM_FIELDS)
                .map(Cow::Borrowed)
                .ok_or(SkipReason::MissingField("fact|question|query")),
        }
    }

    /// Build the first request for `item`.
    ///
    /// # Errors
    ///
    /// Returns a [`SkipReason`] when the item cannot be rendered; no request should be sent.
    pub fn render_request(&self, item: &InputItem) -> Result<Vec<Message>, SkipReason> {
        let source = self.source_text(item)?;
        Ok(match self.kind {
            TaskKind::Decompose => {
                vec![Message::user(DECOMPOSE_PROMPT.replace("{document}", &source))]
            }
            TaskKind::Syllogism => {
                vec![Message::user(SYLLOGISM_PROMPT.replace("{case_fact}", &source))]
            }
            TaskKind::CaseAnalysis => vec![
                Message::system(CASE_ANALYSIS_SYSTEM),
                Message::user(CASE_ANALYSIS_PROMPT.replace("{case_json}", &source)),
            ],
        })
    }

    #[must_use]
    pub fn render_instruction(&self, facts: &str) -> Vec<Message> {
        vec![Message::user(INSTRUCTION_PROMPT.replace("{facts}", facts))]
    }

    #[must_use]
    pub fn instruction_record(
        &self,
        item: &InputItem,
        decomposition: &Decomposition,
        instruction: String,
    ) -> OutputRecord {
        OutputRecord::Instruction(InstructionRecord {
            document: self.source_or_empty(item),
            instruction,
            input: decomposition.facts.clone(),
            output: decomposition.to_json_string(),
        })
    }

    /// Record for a single-request task carrying the generated (or substituted) text.
    #[must_use]
    pub fn text_record(&self, item: &InputItem, output: String) -> OutputRecord {
        match self.kind {
            TaskKind::CaseAnalysis => OutputRecord::CaseAnalysis(CaseAnalysisRecord {
                case_id: item.value("CaseId").cloned(),
                title: item.value("Case").cloned(),
                reconstructed_analysis: output,
            }),
            TaskKind::Decompose | TaskKind::Syllogism => {
                OutputRecord::Syllogism(SyllogismRecord {
                    input: self.source_or_empty(item),
                    output,
                })
            }
        }
    }

    fn source_or_empty(&self, item: &InputItem) -> String {
        self.source_text(item)
            .map(Cow::into_owned)
            .unwrap_or_default()
    }
}
