//! # Compression Service Client
//!
//! Contratto verso il servizio remoto di compressione e sua implementazione HTTP.
//!
//! ## Responsabilità:
//! - `CompressionService`: trait usato dai job (upload e download del risultato)
//! - `TinifyClient`: implementazione reale basata su `reqwest`
//! - Interpretazione delle risposte di `/shrink` (successo, errori del servizio, JSON invalido)
//!
//! ## Protocollo:
//! - `POST /shrink` con basic auth `api:<key>` e i byte dell'immagine come body
//! - `201` → `{ "input": {"size"}, "output": {"size", "url"} }`
//! - altro → `{ "error": "TooManyRequests" | "Unauthorized" | ..., "message" }`
//! - `GET <output.url>` → byte ottimizzati (con credenziali e `{"resize": ...}` se si ridimensiona)

mod tinify;

#[cfg(test)]
pub(crate) mod mock;

pub use tinify::TinifyClient;

use crate::config::ResizeSpec;
use crate::error::{OptimizeError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Status returned by the service when an image was compressed
pub const STATUS_CREATED: u16 = 201;

/// Interpreted outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkResult {
    pub input_size: u64,
    pub output_size: u64,
    pub output_url: String,
    /// Compressions used this month, from the `Compression-Count` header
    pub compression_count: Option<u64>,
}

impl ShrinkResult {
    /// Whether the optimized output is worth downloading
    pub fn is_smaller(&self) -> bool {
        self.output_size < self.input_size
    }

    pub fn bytes_saved(&self) -> u64 {
        self.input_size.saturating_sub(self.output_size)
    }
}

/// Remote side of an optimization job
#[async_trait]
pub trait CompressionService: Send + Sync {
    /// Upload the file at `path` and return the interpreted response
    async fn shrink(&self, path: &Path) -> Result<ShrinkResult>;

    /// Fetch the optimized image, resized when `resize` is given
    async fn fetch(&self, url: &str, resize: Option<&ResizeSpec>) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct SizeBody {
    size: u64,
}

#[derive(Debug, Deserialize)]
struct OutputBody {
    size: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ShrinkBody {
    input: SizeBody,
    output: OutputBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Turn a raw `/shrink` response into a result.
///
/// The body must be JSON in every case; anything else is an invalid
/// response regardless of the status.
pub fn interpret_shrink_response(
    status: u16,
    body: &str,
    compression_count: Option<u64>,
) -> Result<ShrinkResult> {
    if status == STATUS_CREATED {
        let parsed: ShrinkBody = serde_json::from_str(body)
            .map_err(|e| OptimizeError::InvalidResponse(e.to_string()))?;

        return Ok(ShrinkResult {
            input_size: parsed.input.size,
            output_size: parsed.output.size,
            output_url: parsed.output.url,
            compression_count,
        });
    }

    let parsed: ErrorBody = serde_json::from_str(body)
        .map_err(|e| OptimizeError::InvalidResponse(e.to_string()))?;

    Err(match parsed.error.as_str() {
        "TooManyRequests" => OptimizeError::RateLimited,
        "Unauthorized" => OptimizeError::Unauthorized,
        _ => OptimizeError::Service {
            code: if parsed.error.is_empty() {
                format!("HTTP {}", status)
            } else {
                parsed.error
            },
            message: parsed.message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATED_BODY: &str = r#"{
        "input": { "size": 1000, "type": "image/png" },
        "output": { "size": 700, "type": "image/png", "url": "https://api.tinify.com/output/abc" }
    }"#;

    #[test]
    fn test_created_response() {
        let result = interpret_shrink_response(201, CREATED_BODY, Some(42)).unwrap();
        assert_eq!(result.input_size, 1000);
        assert_eq!(result.output_size, 700);
        assert_eq!(result.output_url, "https://api.tinify.com/output/abc");
        assert_eq!(result.compression_count, Some(42));
        assert!(result.is_smaller());
        assert_eq!(result.bytes_saved(), 300);
    }

    #[test]
    fn test_no_gain_is_not_smaller() {
        let body = r#"{"input":{"size":500},"output":{"size":500,"url":"u"}}"#;
        let result = interpret_shrink_response(201, body, None).unwrap();
        assert!(!result.is_smaller());
        assert_eq!(result.bytes_saved(), 0);
    }

    #[test]
    fn test_invalid_json_is_invalid_response() {
        let err = interpret_shrink_response(201, "<html>bad gateway</html>", None).unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidResponse(_)));

        let err = interpret_shrink_response(502, "<html>bad gateway</html>", None).unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidResponse(_)));
    }

    #[test]
    fn test_created_with_wrong_shape_is_invalid_response() {
        let err = interpret_shrink_response(201, r#"{"input":{}}"#, None).unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidResponse(_)));
    }

    #[test]
    fn test_service_errors_are_distinguished() {
        let err = interpret_shrink_response(
            429,
            r#"{"error":"TooManyRequests","message":"Your monthly limit has been exceeded"}"#,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OptimizeError::RateLimited));

        let err = interpret_shrink_response(
            401,
            r#"{"error":"Unauthorized","message":"Credentials are invalid"}"#,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OptimizeError::Unauthorized));

        let err = interpret_shrink_response(
            415,
            r#"{"error":"Unsupported media type","message":"File type is not supported"}"#,
            None,
        )
        .unwrap_err();
        match err {
            OptimizeError::Service { code, message } => {
                assert_eq!(code, "Unsupported media type");
                assert_eq!(message, "File type is not supported");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_without_code_reports_status() {
        let err = interpret_shrink_response(500, "{}", None).unwrap_err();
        match err {
            OptimizeError::Service { code, .. } => assert_eq!(code, "HTTP 500"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
