//! Retrieval of a fallback `.env.example` when a template did not ship one.

use std::time::Duration;

use crate::error::{
    ComposeError,
    ComposeResult,
};

/// Source of remote `.env.example` content.
pub trait ExampleFetcher {
    /// Fetches the body at `url` as text.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::FetchFailed`] on transport errors and non-2xx
    /// responses.
    fn fetch(&self, url: &str) -> ComposeResult<String>;
}

/// [`ExampleFetcher`] over HTTP. One request, no retries, bounded by a
/// client timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::FetchFailed`] if the HTTP client cannot be
    /// constructed.
    pub fn new(timeout: Duration) -> ComposeResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("envcompose/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ComposeError::FetchFailed {
                url: String::new(),
                reason: format!("build client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl ExampleFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> ComposeResult<String> {
        let fail = |reason: String| ComposeError::FetchFailed {
            url: url.to_string(),
            reason,
        };
        let response = self.client.get(url).send().map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status)));
        }
        response.text().map_err(|e| fail(e.to_string()))
    }
}

impl<F: ExampleFetcher + ?Sized> ExampleFetcher for &F {
    fn fetch(&self, url: &str) -> ComposeResult<String> {
        (**self).fetch(url)
    }
}
