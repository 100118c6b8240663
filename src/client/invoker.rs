//! Participant resource invocation.
//!
//! # Responsibilities
//! - Build the resource URL (`<base>/<basePath>/<path>?Coerce-Status=<n>`)
//! - Attach the LRA context header when an identity is given
//! - Perform exactly one PUT and read the body before releasing the connection

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

use crate::client::types::{InvokeResponse, LraError, LraId, LraResult};
use crate::config::schema::{ResourcePaths, TargetConfig};

/// A single kind of network action against a participant resource.
///
/// Implementations must be callable concurrently from test code and from the
/// timer worker.
#[async_trait]
pub trait RemoteInvoker: Send + Sync + 'static {
    /// Issue one state-changing call and return its status and body.
    async fn invoke(
        &self,
        lra: Option<&LraId>,
        base_path: &str,
        path: &str,
        coerce_status: u16,
    ) -> LraResult<InvokeResponse>;
}

#[async_trait]
impl<T: RemoteInvoker + ?Sized> RemoteInvoker for Arc<T> {
    async fn invoke(
        &self,
        lra: Option<&LraId>,
        base_path: &str,
        path: &str,
        coerce_status: u16,
    ) -> LraResult<InvokeResponse> {
        (**self).invoke(lra, base_path, path, coerce_status).await
    }
}

/// HTTP implementation of [`RemoteInvoker`] backed by one shared reqwest client.
pub struct HttpInvoker {
    client: Client,
    base_url: Url,
    coerce_query: String,
    context_header: String,
    /// Serializes use of `client` between the caller and the timer worker.
    gate: Mutex<()>,
}

impl HttpInvoker {
    /// Create an invoker for the configured target.
    pub fn new(target: &TargetConfig, paths: &ResourcePaths) -> LraResult<Self> {
        let base_url = Url::parse(&target.base_url).map_err(|e| LraError::InvalidTarget {
            target: target.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(LraError::InvalidTarget {
                target: target.base_url.clone(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(target.request_timeout_secs))
            .connect_timeout(Duration::from_secs(target.connect_timeout_secs))
            .build()?;

        tracing::debug!(base_url = %base_url, "HTTP invoker created");

        Ok(Self {
            client,
            base_url,
            coerce_query: paths.coerce_status_query.clone(),
            context_header: paths.context_header.clone(),
            gate: Mutex::new(()),
        })
    }

    /// The URL a call against `base_path`/`path` is sent to.
    pub fn endpoint(&self, base_path: &str, path: &str, coerce_status: u16) -> LraResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| LraError::InvalidTarget {
                target: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?;
            segments.pop_if_empty();
            for segment in [base_path, path]
                .iter()
                .flat_map(|p| p.split('/'))
                .filter(|s| !s.is_empty())
            {
                segments.push(segment);
            }
        }
        url.query_pairs_mut()
            .append_pair(&self.coerce_query, &coerce_status.to_string());
        Ok(url)
    }
}

#[async_trait]
impl RemoteInvoker for HttpInvoker {
    async fn invoke(
        &self,
        lra: Option<&LraId>,
        base_path: &str,
        path: &str,
        coerce_status: u16,
    ) -> LraResult<InvokeResponse> {
        let url = self.endpoint(base_path, path, coerce_status)?;

        // Held until the body has been read and the response dropped.
        let _guard = self.gate.lock().await;

        let mut request = self
            .client
            .put(url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body("");
        if let Some(lra) = lra {
            request = request.header(self.context_header.as_str(), lra.as_str());
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Participant call failed");
            e
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(url = %url, status, lra = ?lra.map(LraId::as_str), "Participant call completed");

        Ok(InvokeResponse { status, body })
    }
}

impl std::fmt::Debug for HttpInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInvoker")
            .field("base_url", &self.base_url.as_str())
            .field("context_header", &self.context_header)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoker(base_url: &str) -> LraResult<HttpInvoker> {
        let target = TargetConfig {
            base_url: base_url.to_string(),
            ..TargetConfig::default()
        };
        HttpInvoker::new(&target, &ResourcePaths::default())
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let invoker = invoker("http://localhost:8080/tck/").unwrap();
        let url = invoker
            .endpoint("non-participant-tck-resource", "/start-dont-end", 200)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/tck/non-participant-tck-resource/start-dont-end?Coerce-Status=200"
        );
    }

    #[test]
    fn test_endpoint_without_trailing_slash() {
        let invoker = invoker("http://localhost:8080").unwrap();
        let url = invoker.endpoint("base/nested", "end-lra", 500).unwrap();
        assert_eq!(url.path(), "/base/nested/end-lra");
        assert_eq!(url.query(), Some("Coerce-Status=500"));
    }

    #[test]
    fn test_rejects_invalid_target() {
        assert!(matches!(
            invoker("localhost:8080"),
            Err(LraError::InvalidTarget { .. })
        ));
        assert!(matches!(
            invoker("not a url"),
            Err(LraError::InvalidTarget { .. })
        ));
    }
}
