//! Remote resource service abstraction and HTTP implementation.
//!
//! # Responsibilities
//! - Define the contract the fetch layer requires from a remote call
//! - Support cooperative cancellation via a token
//! - Map transport failures into the fetch error taxonomy
//!
//! # Design Decisions
//! - Cancellation settles with a distinguishable `FetchError::Cancelled`, so
//!   the controller can tell a superseded call from a real failure
//! - No per-call timeout and no retries: gating is the breaker's job

use std::future::Future;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::RemoteConfig;
use crate::fetch::types::{FetchError, FetchResult, ResourceId};

/// A remote service that can fetch one resource by id.
///
/// Implementations must settle with [`FetchError::Cancelled`] when the token
/// fires instead of reporting a service failure.
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Value produced by a successful fetch.
    type Output: Clone + Send + Sync + 'static;

    /// Fetch `id`, aborting promptly if `cancel` fires.
    fn fetch(
        &self,
        id: ResourceId,
        cancel: CancellationToken,
    ) -> impl Future<Output = FetchResult<Self::Output>> + Send;
}

/// HTTP/JSON resource fetcher backed by `reqwest`.
pub struct HttpResourceFetcher<T> {
    client: reqwest::Client,
    base_url: Url,
    resource_path: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HttpResourceFetcher<T> {
    /// Create a fetcher for the configured endpoint.
    pub fn new(config: &RemoteConfig) -> FetchResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FetchError::Service(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            resource_path: config.resource_path.trim_end_matches('/').to_string(),
            _marker: PhantomData,
        })
    }

    fn resource_url(&self, id: ResourceId) -> FetchResult<Url> {
        let path = format!("{}/{}", self.resource_path, id);
        self.base_url
            .join(&path)
            .map_err(|e| FetchError::Service(format!("invalid resource path '{}': {}", path, e)))
    }
}

impl<T> ResourceFetcher for HttpResourceFetcher<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Output = T;

    async fn fetch(&self, id: ResourceId, cancel: CancellationToken) -> FetchResult<T> {
        let url = self.resource_url(id)?;
        tracing::debug!(%id, %url, "Issuing remote request");

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.request(url) => result,
        }
    }
}

impl<T: DeserializeOwned> HttpResourceFetcher<T> {
    async fn request(&self, url: Url) -> FetchResult<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Service(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Service(format!(
                "unexpected status {} from {}",
                status, url
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Service(format!("invalid response body: {}", e)))
    }
}

impl<T> std::fmt::Debug for HttpResourceFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResourceFetcher")
            .field("base_url", &self.base_url.as_str())
            .field("resource_path", &self.resource_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_formatting() {
        let config = RemoteConfig {
            base_url: "http://localhost:8080".to_string(),
            resource_path: "/users/".to_string(),
        };
        let fetcher: HttpResourceFetcher<serde_json::Value> =
            HttpResourceFetcher::new(&config).unwrap();

        let url = fetcher.resource_url(ResourceId(7)).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/users/7");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = RemoteConfig {
            base_url: "not a url".to_string(),
            resource_path: "/users".to_string(),
        };
        let result: FetchResult<HttpResourceFetcher<serde_json::Value>> =
            HttpResourceFetcher::new(&config);
        assert!(matches!(result, Err(FetchError::Service(_))));
    }
}
