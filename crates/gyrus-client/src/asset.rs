//! Downloads finished models into the local asset cache.

use std::path::PathBuf;
use std::time::Duration;

use gyrus_core::cache::{AssetCache, CacheError};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from fetching a model.
#[derive(Error, Debug)]
pub enum AssetLoadError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Turns a conversion result path into an absolute download URL.
///
/// Paths that are already absolute URLs pass through untouched; anything
/// else is joined onto the backend base with exactly one slash between.
pub fn resolve_result_url(backend_base: &str, result_path: &str) -> String {
    if result_path.starts_with("http") {
        return result_path.to_string();
    }
    let base = backend_base.trim_end_matches('/');
    if result_path.starts_with('/') {
        format!("{}{}", base, result_path)
    } else {
        format!("{}/{}", base, result_path)
    }
}

/// HTTP fetcher that stores downloaded models in an [`AssetCache`].
pub struct ModelFetcher {
    client: reqwest::Client,
}

impl ModelFetcher {
    pub fn new() -> Result<Self, AssetLoadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Downloads `url` and stores the bytes in the cache, overwriting any
    /// previous copy for the same URL. If the download fails and a cached
    /// copy exists, the stale copy is used instead.
    pub async fn fetch_to_cache(
        &self,
        cache: &mut AssetCache,
        url: &str,
    ) -> Result<PathBuf, AssetLoadError> {
        info!(url = %url, "Downloading model");

        match self.download(url).await {
            Ok(data) => {
                let path = cache.store(url, &data)?;
                info!(url = %url, size = data.len(), path = %path.display(), "Model downloaded");
                Ok(path)
            }
            Err(err) => match cache.lookup(url) {
                Some(path) => {
                    warn!(url = %url, error = %err, "Download failed, using cached copy");
                    Ok(path)
                }
                None => Err(err),
            },
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AssetLoadError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tempfile::TempDir;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_resolve_absolute_url_passes_through() {
        assert_eq!(
            resolve_result_url("http://backend:8000", "https://cdn.example.com/m.glb"),
            "https://cdn.example.com/m.glb"
        );
    }

    #[test]
    fn test_resolve_joins_relative_path() {
        assert_eq!(
            resolve_result_url("http://backend:8000", "/static/P1.glb"),
            "http://backend:8000/static/P1.glb"
        );
        assert_eq!(
            resolve_result_url("http://backend:8000", "static/P1.glb"),
            "http://backend:8000/static/P1.glb"
        );
    }

    #[test]
    fn test_resolve_trims_trailing_slash() {
        assert_eq!(
            resolve_result_url("http://backend:8000/", "/static/P1.glb"),
            "http://backend:8000/static/P1.glb"
        );
    }

    #[tokio::test]
    async fn test_fetch_stores_in_cache() {
        let router = Router::new().route(
            "/static/P1.glb",
            get(|| async { "glTF-binary-bytes".as_bytes().to_vec() }),
        );
        let base = serve(router).await;
        let url = format!("{}/static/P1.glb", base);

        let dir = TempDir::new().unwrap();
        let mut cache = AssetCache::new(dir.path().to_path_buf()).unwrap();

        let fetcher = ModelFetcher::new().unwrap();
        let path = fetcher.fetch_to_cache(&mut cache, &url).await.unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"glTF-binary-bytes");
        assert_eq!(cache.lookup(&url), Some(path));
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache_is_error() {
        let router = Router::new();
        let base = serve(router).await;
        let url = format!("{}/static/missing.glb", base);

        let dir = TempDir::new().unwrap();
        let mut cache = AssetCache::new(dir.path().to_path_buf()).unwrap();

        let fetcher = ModelFetcher::new().unwrap();
        let err = fetcher.fetch_to_cache(&mut cache, &url).await.unwrap_err();
        assert!(matches!(err, AssetLoadError::Status { .. }));
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cached_copy() {
        let router = Router::new();
        let base = serve(router).await;
        let url = format!("{}/static/P1.glb", base);

        let dir = TempDir::new().unwrap();
        let mut cache = AssetCache::new(dir.path().to_path_buf()).unwrap();
        let cached = cache.store(&url, b"previous-download").unwrap();

        let fetcher = ModelFetcher::new().unwrap();
        let path = fetcher.fetch_to_cache(&mut cache, &url).await.unwrap();
        assert_eq!(path, cached);
        assert_eq!(std::fs::read(&path).unwrap(), b"previous-download");
    }
}
