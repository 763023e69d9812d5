//! Persisting generated records as JSON Lines or a pretty JSON array.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::task::OutputRecord;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// One compact object per line.
    #[serde(rename = "jsonl")]
    JsonLines,
    /// A single pretty-printed array.
    #[serde(rename = "json")]
    JsonArray,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonLines => "jsonl",
            Self::JsonArray => "json",
        }
    }

    /// Guess the format from a file extension.
    #[must_use]
    pub fn detect(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "json" => Some(Self::JsonArray),
            _ => None,
        }
    }
}

/// Destination for the record collection. Every save replaces the file contents.
#[derive(Debug, Clone)]
pub struct OutputSink {
    path: PathBuf,
    format: OutputFormat,
}

impl OutputSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write all `records`, replacing whatever the destination held.
    ///
    /// The body goes to a sibling temp file first and is renamed into place,
    /// so an interrupted save leaves the previous contents intact.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub async fn save(&self, records: &[OutputRecord]) -> Result<(), SinkError> {
        let body = encode(records, self.format)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            format = self.format.as_str(),
            "saved records"
        );
        Ok(())
    }
}

/// # Errors
///
/// Returns an error if a record cannot be serialized.
pub fn encode(records: &[OutputRecord], format: OutputFormat) -> Result<String, SinkError> {
    match format {
        OutputFormat::JsonLines => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::JsonArray => Ok(serde_json::to_string_pretty(records)?),
    }
}

/// # Errors
///
/// Returns an error if `text` does not hold records in `format`.
pub fn decode(text: &str, format: OutputFormat) -> Result<Vec<OutputRecord>, SinkError> {
    match format {
        OutputFormat::JsonLines => text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| SinkError::Line {
                    line: i + 1,
                    source,
                })
            })
            .collect(),
        OutputFormat::JsonArray => Ok(serde_json::from_str(text)?),
    }
}

/// Read a previously saved collection.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_records(
    path: &Path,
    format: OutputFormat,
) -> Result<Vec<OutputRecord>, SinkError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| io_error(path, source))?;
    decode(&text, format)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("output"), ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.display().to_string(),
        source,
    }
}
