//! Single-hop redirect detection for shortened and legacy URLs.

use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use std::collections::HashMap;

/// Asks "where does this URL redirect to?" without following the redirect.
#[async_trait]
pub trait RedirectProbe: Send + Sync {
    /// Returns the absolute target of a redirect response, or `None` if the
    /// URL doesn't redirect (or couldn't be checked).
    async fn redirect_target(&self, url: &str) -> Option<String>;
}

/// Probes with a `HEAD` request and redirects disabled.
#[cfg(feature = "http")]
pub struct HttpRedirectProbe {
    client: reqwest::Client,
}
#[cfg(feature = "http")]
impl HttpRedirectProbe {
    pub fn new(timeout: std::time::Duration) -> crate::error::Result<Self> {
        use exn::ResultExt;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .or_raise(|| crate::error::ErrorKind::network("unable to build http client"))?;
        Ok(Self { client })
    }
}
#[cfg(feature = "http")]
#[async_trait]
impl RedirectProbe for HttpRedirectProbe {
    #[tracing::instrument(skip(self))]
    async fn redirect_target(&self, url: &str) -> Option<String> {
        let base = reqwest::Url::parse(url).ok()?;
        let response = match self.client.head(base.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "Redirect probe failed");
                return None;
            },
        };
        if !response.status().is_redirection() {
            return None;
        }
        let location = response.headers().get(reqwest::header::LOCATION)?.to_str().ok()?;
        // Location may be relative to the probed URL.
        base.join(location).ok().map(String::from)
    }
}

/// Never finds a redirect.
pub struct NoRedirects;
#[async_trait]
impl RedirectProbe for NoRedirects {
    async fn redirect_target(&self, _url: &str) -> Option<String> {
        None
    }
}

/// Fixed redirect table for tests.
#[cfg(any(test, feature = "mock"))]
#[derive(Default)]
pub struct StaticRedirects {
    table: HashMap<String, String>,
}
#[cfg(any(test, feature = "mock"))]
impl StaticRedirects {
    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.table.insert(from.into(), to.into());
        self
    }
}
#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl RedirectProbe for StaticRedirects {
    async fn redirect_target(&self, url: &str) -> Option<String> {
        self.table.get(url).cloned()
    }
}
