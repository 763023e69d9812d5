//! Input loading: newline-delimited text or a JSON document.

use std::path::Path;

use serde_json::{Map, Value};

/// Object fields whose values are per-item records, tried in order.
const MAP_FIELDS: [&str; 2] = ["contexts", "ctxs"];
/// Record fields used as the item identifier when present.
const ID_FIELDS: [&str; 2] = ["CaseId", "id"];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported input shape: {0}")]
    UnsupportedShape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// One item per non-blank line.
    Lines,
    /// A top-level array, or an object holding a `contexts`/`ctxs` map.
    Json,
}

impl SourceFormat {
    /// `.json` files are parsed as JSON; everything else as lines.
    #[must_use]
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemContent {
    Text(String),
    Record(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputItem {
    pub id: Option<String>,
    pub content: ItemContent,
}

impl InputItem {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            content: ItemContent::Text(text.into()),
        }
    }

    /// Wrap a record, taking its identifier from `CaseId` or `id` when present.
    #[must_use]
    pub fn record(map: Map<String, Value>) -> Self {
        let id = ID_FIELDS
            .iter()
            .find_map(|name| map.get(*name).and_then(value_as_id));
        Self {
            id,
            content: ItemContent::Record(map),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Text(text) => Some(text),
            ItemContent::Record(_) => None,
        }
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match &self.content {
            ItemContent::Record(map) => map.get(name).filter(|v| !v.is_null()),
            ItemContent::Text(_) => None,
        }
    }

    /// A non-blank string field of a record item.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.value(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// The first non-blank string among `names`.
    #[must_use]
    pub fn first_field(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }

    /// Compact JSON rendering of the item (non-ASCII preserved).
    #[must_use]
    pub fn to_json_string(&self) -> String {
        match &self.content {
            ItemContent::Text(text) => Value::String(text.clone()).to_string(),
            ItemContent::Record(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read all items from `path`, preserving source order and dropping empty entries.
///
/// # Errors
///
/// Returns an error if the file cannot be read or, in JSON mode, is not a supported document.
pub async fn load_items(path: &Path, format: SourceFormat) -> Result<Vec<InputItem>, SourceError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let items = match format {
        SourceFormat::Lines => parse_lines(&text),
        SourceFormat::Json => parse_json(&text)?,
    };
    tracing::info!(
        path = %path.display(),
        items = items.len(),
        "loaded input items"
    );
    Ok(items)
}

#[must_use]
pub fn parse_lines(text: &str) -> Vec<InputItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(InputItem::text)
        .collect()
}

/// # Errors
///
/// Returns an error if `text` is not JSON, or is neither an array nor an object with a record map.
pub fn parse_json(text: &str) -> Result<Vec<InputItem>, SourceError> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(entries) => Ok(entries
            .into_iter()
            .filter_map(|entry| item_from_value(entry, None))
            .collect()),
        Value::Object(mut root) => {
            let Some(field) = MAP_FIELDS.iter().find(|f| root.contains_key(**f)) else {
                return Err(SourceError::UnsupportedShape(format!(
                    "object without a `{}` map",
                    MAP_FIELDS.join("`/`")
                )));
            };
            match root.remove(*field) {
                Some(Value::Object(map)) => Ok(map
                    .into_iter()
                    .filter_map(|(key, entry)| item_from_value(entry, Some(key)))
                    .collect()),
                _ => Err(SourceError::UnsupportedShape(format!(
                    "`{field}` is not an object"
                ))),
            }
        }
        other => Err(SourceError::UnsupportedShape(format!(
            "top-level {}",
            json_kind(&other)
        ))),
    }
}

fn item_from_value(value: Value, key: Option<String>) -> Option<InputItem> {
    let item = match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            InputItem::text(trimmed)
        }
        Value::Object(map) if map.is_empty() => return None,
        Value::Object(map) => InputItem::record(map),
        Value::Number(n) => InputItem::text(n.to_string()),
        Value::Bool(b) => InputItem::text(b.to_string()),
        Value::Null => return None,
        Value::Array(_) => {
            tracing::warn!("ignoring nested array entry in input");
            return None;
        }
    };
    Some(match key {
        Some(key) => item.with_id(key),
        None => item,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn lines_drop_blank_and_keep_order() {
        let items = parse_lines("第一份文书\n\n   \n  第二份文书  \n第三份文书");
        let texts: Vec<_> = items.iter().filter_map(InputItem::as_text).collect();
        assert_eq!(texts, vec!["第一份文书", "第二份文书", "第三份文书"]);
    }

    #[test]
    fn json_array_of_records() {
        let items = parse_json(
            r#"[{"fact":"甲盗窃","CaseId":7},{},null,"  ",{"question":"何为正当防卫？","id":"q1"}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("7"));
        assert_eq!(items[0].field("fact"), Some("甲盗窃"));
        assert_eq!(items[1].id.as_deref(), Some("q1"));
        assert_eq!(
            items[1].first_field(&["fact", "question", "query"]),
            Some("何为正当防卫？")
        );
    }

    #[test]
    fn json_ctxs_map_uses_keys_as_ids_in_document_order() {
        let items = parse_json(
            r#"{"ctxs":{"z":{"Case":"案一"},"a":{"Case":"案二"},"m":{"Case":"案三"}}}"#,
        )
        .unwrap();
        let ids: Vec<_> = items.iter().filter_map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(items[1].field("Case"), Some("案二"));
    }

    #[test]
    fn json_contexts_map_accepted() {
        let items = parse_json(r#"{"contexts":{"1":"文本"}}"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_text(), Some("文本"));
        assert_eq!(items[0].id.as_deref(), Some("1"));
    }

    #[test]
    fn json_unsupported_shapes() {
        assert!(matches!(
            parse_json(r#"{"other":{}}"#),
            Err(SourceError::UnsupportedShape(_))
        ));
        assert!(matches!(
            parse_json(r#"{"ctxs":[1,2]}"#),
            Err(SourceError::UnsupportedShape(_))
        ));
        assert!(matches!(
            parse_json("42"),
            Err(SourceError::UnsupportedShape(_))
        ));
        assert!(matches!(parse_json("{not json"), Err(SourceError::Json(_))));
    }

    #[test]
    fn field_ignores_blank_and_non_string() {
        let item = InputItem::record(
            serde_json::from_str(r#"{"fact":"  ","question":3,"query":"问"}"#).unwrap(),
        );
        assert_eq!(item.field("fact"), None);
        assert_eq!(item.field("question"), None);
        assert_eq!(item.first_field(&["fact", "question", "query"]), Some("问"));
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(SourceFormat::detect(Path::new("0.json")), SourceFormat::Json);
        assert_eq!(SourceFormat::detect(Path::new("a.JSON")), SourceFormat::Json);
        assert_eq!(
            SourceFormat::detect(Path::new("law_documents.txt")),
            SourceFormat::Lines
        );
    }

    #[tokio::test]
    async fn load_items_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "案件事实示例\n\n另一案件").unwrap();
        let items = load_items(file.path(), SourceFormat::Lines).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_text(), Some("案件事实示例"));
    }

    #[tokio::test]
    async fn load_items_missing_file_errors() {
        let result = load_items(Path::new("/nonexistent/input.txt"), SourceFormat::Lines).await;
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn lines_preserve_relative_order(
            lines in proptest::collection::vec("[a-z\u{4e00}-\u{4e10} ]{0,8}", 0..20),
        ) {
            let text = lines.join("\n");
            let expected: Vec<String> = lines
                .iter()
                .map(|l| l.trim().to_owned())
                .filter(|l| !l.is_empty())
                .collect();
            let got: Vec<String> = parse_lines(&text)
                .iter()
                .filter_map(|i| i.as_text().map(str::to_owned))
                .collect();
            prop_assert_eq!(got, expected);
        }
    }
}
