//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

use crate::error::LlmError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Create the shared HTTP client with standard lexlabel configuration.
///
/// Config: 30s connect timeout, 120s request timeout, rustls TLS,
/// `lexlabel/{version}` user-agent, redirect limit 10.
#[must_use]
pub fn default_client() -> reqwest::Client {
    client_with_timeout(REQUEST_TIMEOUT).expect("default HTTP client construction must not fail")
}

/// Build a client like [`default_client`] but with a custom request timeout.
///
/// # Errors
///
/// Returns `LlmError::Http` if the TLS backend cannot be initialized.
pub fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .user_agent(concat!("lexlabel/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(LlmError::Http)
}
