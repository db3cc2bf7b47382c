//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di ottimizzazione
//! - Fornisce validazione dei parametri una sola volta, prima di avviare i job
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `api_key`: Chiave API del servizio di compressione
//! - `concurrency`: Limite di job contemporanei (default: nessun limite)
//! - `force`: Rielabora anche i file già in cache (default: false)
//! - `dry_run`: Flag per simulazione senza modifiche (default: false)
//! - `resize`: Ridimensionamento opzionale (`ResizeSpec`)
//! - `min_dimension`: Elabora solo immagini con lato maggiore >= valore (pixel)
//! - `min_file_size`: Elabora solo file con peso >= valore (byte)
//! - `cache_path`: Snapshot della cache (default: `~/.tinypng-cache.json`)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     api_key: "secret".to_string(),
//!     concurrency: Concurrency::Limited(4),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default endpoint of the Tinify shrink API
pub const DEFAULT_ENDPOINT: &str = "https://api.tinify.com/shrink";

/// File name of the cache snapshot inside the home directory
pub const CACHE_FILE_NAME: &str = ".tinypng-cache.json";

/// File holding the API key inside the home directory
pub const KEY_FILE_NAME: &str = ".tinypng";

/// Upper bound on simultaneously outstanding jobs.
///
/// Built from a signed integer: negative disables the bound, `0` admits
/// nothing, any other value is the maximum number of jobs in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Concurrency {
    Unbounded,
    Limited(usize),
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Unbounded
    }
}

impl From<i64> for Concurrency {
    fn from(value: i64) -> Self {
        if value < 0 {
            Self::Unbounded
        } else {
            Self::Limited(value as usize)
        }
    }
}

impl From<Concurrency> for i64 {
    fn from(value: Concurrency) -> Self {
        match value {
            Concurrency::Unbounded => -1,
            Concurrency::Limited(max) => max as i64,
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Limited(max) => write!(f, "{}", max),
        }
    }
}

/// Resize methods understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Scale proportionally to one dimension
    Scale,
    /// Fit inside width x height keeping the aspect ratio
    Fit,
    /// Crop to exactly width x height
    Cover,
}

impl ResizeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scale => "scale",
            Self::Fit => "fit",
            Self::Cover => "cover",
        }
    }
}

impl FromStr for ResizeMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scale" => Ok(Self::Scale),
            "fit" => Ok(Self::Fit),
            "cover" => Ok(Self::Cover),
            other => Err(format!(
                "Invalid resize mode '{}'. Valid modes are: scale, fit, cover",
                other
            )),
        }
    }
}

impl fmt::Display for ResizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resize applied when fetching the optimized result.
///
/// Serializes to the descriptor the service expects inside `{"resize": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub method: ResizeMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ResizeSpec {
    /// Build a validated resize from the raw flags.
    ///
    /// Returns `Ok(None)` when neither dimension is given. Without an explicit
    /// method, `scale` is used for a single dimension and `fit` for both.
    pub fn from_flags(
        width: Option<u32>,
        height: Option<u32>,
        method: Option<ResizeMethod>,
    ) -> Result<Option<Self>> {
        if width.is_none() && height.is_none() {
            if method.is_some() {
                return Err(anyhow::anyhow!(
                    "A resize mode requires a width and/or a height"
                ));
            }
            return Ok(None);
        }

        let method = method.unwrap_or(if width.is_some() && height.is_some() {
            ResizeMethod::Fit
        } else {
            ResizeMethod::Scale
        });

        let spec = Self { method, width, height };
        spec.validate()?;
        Ok(Some(spec))
    }

    /// Validate dimensions against the selected method
    pub fn validate(&self) -> Result<()> {
        if self.width == Some(0) || self.height == Some(0) {
            return Err(anyhow::anyhow!("Resize dimensions must be greater than 0"));
        }

        match self.method {
            ResizeMethod::Scale => {
                if self.width.is_some() == self.height.is_some() {
                    return Err(anyhow::anyhow!(
                        "The scale mode requires exactly one of width or height"
                    ));
                }
            }
            ResizeMethod::Fit | ResizeMethod::Cover => {
                if self.width.is_none() || self.height.is_none() {
                    return Err(anyhow::anyhow!(
                        "The {} mode requires you to specify a width and a height",
                        self.method
                    ));
                }
            }
        }

        Ok(())
    }
}

/// How the drain barrier waits for outstanding jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    /// Grace period before the first check
    pub initial_delay: Duration,
    /// Upper bound between two checks of the outstanding count
    pub poll_interval: Duration,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Configuration for a batch optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key of the compression service
    pub api_key: String,
    /// Maximum number of jobs in flight
    pub concurrency: Concurrency,
    /// Reprocess files even when the cache says they are up to date
    pub force: bool,
    /// Dry run - report what would be uploaded, touch nothing
    pub dry_run: bool,
    /// Optional resize applied to the optimized result
    pub resize: Option<ResizeSpec>,
    /// Only process images whose larger side is at least this many pixels
    pub min_dimension: Option<u32>,
    /// Only process files of at least this many bytes
    pub min_file_size: Option<u64>,
    /// Location of the cache snapshot
    pub cache_path: PathBuf,
    /// Shrink endpoint of the compression service
    pub endpoint: String,
    /// Show a progress bar on stderr
    pub show_progress: bool,
    #[serde(skip)]
    pub drain: DrainPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            concurrency: Concurrency::Unbounded,
            force: false,
            dry_run: false,
            resize: None,
            min_dimension: None,
            min_file_size: None,
            cache_path: default_cache_path(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            show_progress: true,
            drain: DrainPolicy::default(),
        }
    }
}

/// `~/.tinypng-cache.json`, or the current directory if no home is known
pub fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_FILE_NAME)
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "No API key specified. You can get one at https://tinypng.com/developers."
            ));
        }

        if let Some(ref resize) = self.resize {
            resize.validate()?;
        }

        if self.min_dimension == Some(0) {
            return Err(anyhow::anyhow!("Invalid size specified. Please use a number (in pixels) greater than 0"));
        }

        if self.min_file_size == Some(0) {
            return Err(anyhow::anyhow!("Invalid weight specified. Please use a number (in bytes) greater than 0"));
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(anyhow::anyhow!("Invalid service endpoint: {}", self.endpoint));
        }

        if self.cache_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Cache location must not be empty"));
        }

        Ok(())
    }

    /// Load configuration from file.
    ///
    /// A missing file yields the defaults. Validation is left to the caller
    /// since command-line flags are merged on top first.
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
