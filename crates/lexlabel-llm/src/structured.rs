//! Strict decoding of completions that must be a single JSON object.

use serde::de::DeserializeOwned;

use crate::error::LlmError;

/// Remove one Markdown code fence wrapping the whole text, if present.
///
/// An optional language tag on the opening fence (```` ```json ````) is dropped.
/// Text that is not entirely fenced is returned trimmed but otherwise untouched.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    match inner.find('\n') {
        Some(idx) if inner[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            inner[idx + 1..].trim()
        }
        _ => inner.trim(),
    }
}

/// Decode the completion as exactly one value of `T`.
///
/// Surrounding prose or trailing characters are rejected. Combine with
/// `#[serde(deny_unknown_fields)]` on `T` to accept only the declared field set.
///
/// # Errors
///
/// Returns `LlmError::StructuredParse` if the text is not a valid `T`.
pub fn decode_exact<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    serde_json::from_str::<T>(strip_code_fence(text))
        .map_err(|e| LlmError::StructuredParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Triple {
        facts: String,
        law_articles: String,
        conclusion: String,
    }

    #[test]
    fn exact_object_decodes() {
        let t: Triple =
            decode_exact(r#"{"facts":"A","law_articles":"B","conclusion":"C"}"#).unwrap();
        assert_eq!(
            t,
            Triple {
                facts: "A".into(),
                law_articles: "B".into(),
                conclusion: "C".into()
            }
        );
    }

    #[test]
    fn missing_field_rejected() {
        let r = decode_exact::<Triple>(r#"{"facts":"A","law_articles":"B"}"#);
        assert!(matches!(r, Err(LlmError::StructuredParse(_))));
    }

    #[test]
    fn extra_field_rejected() {
        let r = decode_exact::<Triple>(
            r#"{"facts":"A","law_articles":"B","conclusion":"C","notes":"x"}"#,
        );
        assert!(matches!(r, Err(LlmError::StructuredParse(_))));
    }

    #[test]
    fn surrounding_prose_rejected() {
        let r = decode_exact::<Triple>(
            r#"结果如下：{"facts":"A","law_articles":"B","conclusion":"C"}"#,
        );
        assert!(r.is_err());
        let r = decode_exact::<Triple>(
            r#"{"facts":"A","law_articles":"B","conclusion":"C"} 以上。"#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn non_string_field_rejected() {
        let r = decode_exact::<Triple>(
            r#"{"facts":"A","law_articles":["第1条"],"conclusion":"C"}"#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn fenced_json_accepted() {
        let text = "```json\n{\"facts\":\"A\",\"law_articles\":\"B\",\"conclusion\":\"C\"}\n```";
        assert!(decode_exact::<Triple>(text).is_ok());
    }

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\nx\n"), "```json\nx");
    }
}
