//! HTTP client for the Tinify API.

use super::{interpret_shrink_response, CompressionService, ShrinkResult};
use crate::config::ResizeSpec;
use crate::error::{OptimizeError, Result};
use async_trait::async_trait;
use reqwest::{Body, Client};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

const API_USER: &str = "api";
const COMPRESSION_COUNT_HEADER: &str = "compression-count";

#[derive(Serialize)]
struct ResizeRequest<'a> {
    resize: &'a ResizeSpec,
}

/// Tinify API client holding the credential and a pooled reqwest client
#[derive(Clone)]
pub struct TinifyClient {
    http: Client,
    api_key: String,
    shrink_url: String,
}

impl TinifyClient {
    pub fn new(api_key: &str, shrink_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("tinypng-batch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OptimizeError::Validation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            shrink_url: shrink_url.to_string(),
        })
    }
}

#[async_trait]
impl CompressionService for TinifyClient {
    async fn shrink(&self, path: &Path) -> Result<ShrinkResult> {
        let file = tokio::fs::File::open(path).await?;

        debug!("Uploading {} to {}", path.display(), self.shrink_url);
        let response = self
            .http
            .post(&self.shrink_url)
            .basic_auth(API_USER, Some(&self.api_key))
            .body(Body::from(file))
            .send()
            .await
            .map_err(|e| OptimizeError::NoResponse(e.to_string()))?;

        let status = response.status().as_u16();
        let compression_count = response
            .headers()
            .get(COMPRESSION_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| OptimizeError::NoResponse(e.to_string()))?;

        debug!("Shrink response for {}: HTTP {}", path.display(), status);
        interpret_shrink_response(status, &body, compression_count)
    }

    async fn fetch(&self, url: &str, resize: Option<&ResizeSpec>) -> Result<Vec<u8>> {
        let mut request = self.http.get(url);
        if let Some(resize) = resize {
            request = request
                .basic_auth(API_USER, Some(&self.api_key))
                .json(&ResizeRequest { resize });
        }

        let response = request
            .send()
            .await
            .map_err(|e| OptimizeError::NoResponse(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OptimizeError::Download(format!("HTTP {} from {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OptimizeError::Download(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}
