//! Scripted `CompressionService` for tests.
//!
//! Replies are keyed by file name. A gate can hold uploads until the test
//! releases them, which makes in-flight counts observable.

use super::{CompressionService, ShrinkResult};
use crate::config::ResizeSpec;
use crate::error::{OptimizeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub(crate) enum MockReply {
    /// 201 with the given sizes; `optimized` is served by `fetch`
    Shrunk {
        input_size: u64,
        output_size: u64,
        optimized: Vec<u8>,
    },
    /// 201, but the result URL answers 404
    ShrunkWithoutOutput { input_size: u64, output_size: u64 },
    RateLimited,
    Unauthorized,
    ServiceError,
    InvalidResponse,
    NoResponse,
}

#[derive(Default)]
pub(crate) struct MockService {
    replies: Mutex<HashMap<String, MockReply>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
    resizes: Mutex<Vec<Option<ResizeSpec>>>,
    gate: Option<Arc<Semaphore>>,
    shrink_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Uploads wait for a permit of the returned semaphore
    pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let service = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (service, gate)
    }

    pub(crate) fn reply(self, file_name: &str, reply: MockReply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(file_name.to_string(), reply);
        self
    }

    pub(crate) fn shrink_calls(&self) -> usize {
        self.shrink_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn resizes(&self) -> Vec<Option<ResizeSpec>> {
        self.resizes.lock().unwrap().clone()
    }

    fn lookup(&self, path: &Path) -> MockReply {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.replies
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or(MockReply::NoResponse)
    }
}

#[async_trait]
impl CompressionService for MockService {
    async fn shrink(&self, path: &Path) -> Result<ShrinkResult> {
        self.shrink_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let outcome = match self.lookup(path) {
            MockReply::Shrunk {
                input_size,
                output_size,
                optimized,
            } => {
                let url = format!("mock://output/{}", path.display());
                self.downloads.lock().unwrap().insert(url.clone(), optimized);
                Ok(ShrinkResult {
                    input_size,
                    output_size,
                    output_url: url,
                    compression_count: Some(self.shrink_calls() as u64),
                })
            }
            MockReply::ShrunkWithoutOutput {
                input_size,
                output_size,
            } => Ok(ShrinkResult {
                input_size,
                output_size,
                output_url: format!("mock://missing/{}", path.display()),
                compression_count: None,
            }),
            MockReply::RateLimited => Err(OptimizeError::RateLimited),
            MockReply::Unauthorized => Err(OptimizeError::Unauthorized),
            MockReply::ServiceError => Err(OptimizeError::Service {
                code: "BadSignature".to_string(),
                message: "Does not appear to be a PNG or JPEG file".to_string(),
            }),
            MockReply::InvalidResponse => {
                Err(OptimizeError::InvalidResponse("expected value at line 1".to_string()))
            }
            MockReply::NoResponse => Err(OptimizeError::NoResponse("connection refused".to_string())),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn fetch(&self, url: &str, resize: Option<&ResizeSpec>) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.resizes.lock().unwrap().push(resize.copied());
        self.downloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| OptimizeError::Download(format!("HTTP 404 from {}", url)))
    }
}
