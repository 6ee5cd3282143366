//! Client for the anatomical description service.
//!
//! Sends the marked point's model-space coordinates as a text prompt and
//! extracts the first candidate answer. Without an API key the client
//! refuses to issue requests and reports [`AnalysisError::NotConfigured`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Endpoint used when none is configured.
pub const DEFAULT_DESCRIBE_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Errors from requesting a point description.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("description service not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("response missing description text")]
    MalformedResponse,
}

impl AnalysisError {
    /// Short message suitable for the viewer's analysis readout.
    pub fn user_text(&self) -> &'static str {
        match self {
            AnalysisError::NotConfigured => "Analysis key not configured.",
            _ => "Analysis failed.",
        }
    }
}

/// Formats the prompt for a marked point, with coordinates at four decimals.
pub fn build_prompt(x: f32, y: f32, z: f32, region_hint: Option<&str>) -> String {
    let location = format!("X:{:.4} Y:{:.4} Z:{:.4}", x, y, z);
    match region_hint {
        Some(hint) => format!(
            "A potential brain tumor has been identified at {} near the {}. \
             Respond with likely anatomical region (short).",
            location, hint
        ),
        None => format!(
            "A potential brain tumor has been identified at {}. \
             Respond with likely anatomical region (short).",
            location
        ),
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// HTTP client for the description service.
pub struct Describer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl Describer {
    /// An empty key counts as absent, so a blank config entry degrades the
    /// same way as a missing one.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Asks the service to name the anatomical region around a point.
    ///
    /// Returns the trimmed answer text. With no API key configured, fails
    /// immediately without touching the network.
    pub async fn describe(
        &self,
        x: f32,
        y: f32,
        z: f32,
        region_hint: Option<&str>,
    ) -> Result<String, AnalysisError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(AnalysisError::NotConfigured);
        };

        let prompt = build_prompt(x, y, z, region_hint);
        debug!(prompt = %prompt, "Requesting point description");

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            safety_settings: Vec::new(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::Status(response.status()));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|_| AnalysisError::MalformedResponse)?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(AnalysisError::MalformedResponse)?;

        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_prompt_has_four_decimal_coordinates() {
        let prompt = build_prompt(0.1234, -1.5, 2.0, None);
        assert_eq!(
            prompt,
            "A potential brain tumor has been identified at \
             X:0.1234 Y:-1.5000 Z:2.0000. \
             Respond with likely anatomical region (short)."
        );
    }

    #[test]
    fn test_prompt_includes_region_hint() {
        let prompt = build_prompt(0.0, 0.0, 0.0, Some("Cerebellum"));
        assert!(prompt.contains("near the Cerebellum."));
        assert!(prompt.ends_with("Respond with likely anatomical region (short)."));
    }

    #[test]
    fn test_empty_key_counts_as_unconfigured() {
        let describer = Describer::new("http://localhost/describe", Some(String::new())).unwrap();
        assert!(!describer.is_configured());
        let describer =
            Describer::new("http://localhost/describe", Some("key-1".to_string())).unwrap();
        assert!(describer.is_configured());
    }

    #[tokio::test]
    async fn test_missing_key_issues_no_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_route = hits.clone();

        let router = Router::new().route(
            "/describe",
            post(move || {
                let hits = hits_in_route.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({}))
                }
            }),
        );
        let base = serve(router).await;

        let describer = Describer::new(format!("{}/describe", base), None).unwrap();
        let err = describer.describe(0.1, 0.2, 0.3, None).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotConfigured));
        assert_eq!(err.user_text(), "Analysis key not configured.");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_describe_extracts_trimmed_text() {
        let router = Router::new().route(
            "/describe",
            post(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("key").map(String::as_str), Some("key-1"));
                Json(json!({
                    "candidates": [{
                        "content": {
                            "parts": [{"text": "  Left parietal lobe \n"}]
                        }
                    }]
                }))
            }),
        );
        let base = serve(router).await;

        let describer =
            Describer::new(format!("{}/describe", base), Some("key-1".to_string())).unwrap();
        let text = describer.describe(0.1, 0.2, 0.3, None).await.unwrap();
        assert_eq!(text, "Left parietal lobe");
    }

    #[tokio::test]
    async fn test_describe_malformed_payload() {
        let router = Router::new().route("/describe", post(|| async { Json(json!({"ok": 1})) }));
        let base = serve(router).await;

        let describer =
            Describer::new(format!("{}/describe", base), Some("key-1".to_string())).unwrap();
        let err = describer.describe(0.1, 0.2, 0.3, None).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse));
        assert_eq!(err.user_text(), "Analysis failed.");
    }

    #[tokio::test]
    async fn test_describe_error_status() {
        let router = Router::new().route(
            "/describe",
            post(|| async { axum::http::StatusCode::TOO_MANY_REQUESTS }),
        );
        let base = serve(router).await;

        let describer =
            Describer::new(format!("{}/describe", base), Some("key-1".to_string())).unwrap();
        let err = describer.describe(0.1, 0.2, 0.3, None).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Status(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        ));
    }
}
