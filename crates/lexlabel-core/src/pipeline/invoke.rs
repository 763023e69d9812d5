//! Bounded invocation of the generation service.

use lexlabel_llm::structured::decode_exact;
use lexlabel_llm::{
    DelayStrategy, GenerationParams, LlmError, LlmProvider, Message, RetryExhausted, RetryPolicy,
    retry::retry_with,
};
use serde::de::DeserializeOwned;

/// Request free text, retrying provider errors and blank completions.
///
/// # Errors
///
/// Returns [`RetryExhausted`] once the policy's budget is spent; a single `warn!` is emitted.
pub async fn invoke_text<P, D>(
    provider: &P,
    messages: &[Message],
    params: &GenerationParams,
    policy: &RetryPolicy<D>,
    label: &str,
) -> Result<String, RetryExhausted<LlmError>>
where
    P: LlmProvider,
    D: DelayStrategy,
{
    let result = retry_with(policy, label, move |_| async move {
        let text = provider.chat(messages, params).await?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: provider.name().to_owned(),
            });
        }
        Ok::<_, LlmError>(text)
    })
    .await;
    if let Err(e) = &result {
        tracing::warn!("{label}: {e}");
    }
    result
}

/// Request a JSON object decoding exactly into `T`, retrying provider and decode errors.
///
/// # Errors
///
/// Returns [`RetryExhausted`] once the policy's budget is spent; a single `warn!` is emitted.
pub async fn invoke_structured<T, P, D>(
    provider: &P,
    messages: &[Message],
    params: &GenerationParams,
    policy: &RetryPolicy<D>,
    label: &str,
) -> Result<T, RetryExhausted<LlmError>>
where
    T: DeserializeOwned,
    P: LlmProvider,
    D: DelayStrategy,
{
    let result = retry_with(policy, label, move |_| async move {
        let text = provider.chat(messages, params).await?;
        decode_exact::<T>(&text)
    })
    .await;
    if let Err(e) = &result {
        tracing::warn!("{label}: {e}");
    }
    result
}
