//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Distingue gli errori del servizio remoto (limite mensile, credenziali, generico)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `NoResponse`: Nessuna risposta dal servizio (errore di rete)
//! - `InvalidResponse`: Body della risposta non è JSON valido
//! - `RateLimited` / `Unauthorized` / `Service`: Errori riportati dal servizio
//! - `Download`: Download del risultato ottimizzato fallito
//! - `Cache`: Errori di gestione dello snapshot della cache
//! - `Validation`: Errori di validazione input
//!
//! ## Esempio:
//! ```rust,ignore
//! if body.error == "Unauthorized" {
//!     return Err(OptimizeError::Unauthorized);
//! }
//! ```

/// Custom error types for image optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Got no response: {0}")]
    NoResponse(String),

    #[error("Not a valid JSON response: {0}")]
    InvalidResponse(String),

    #[error("Monthly compression limit has been exceeded")]
    RateLimited,

    #[error("Credentials are invalid")]
    Unauthorized,

    #[error("Compression failed ({code}): {message}")]
    Service { code: String, message: String },

    #[error("Download of optimized image failed: {0}")]
    Download(String),

    #[error("Cache snapshot error: {0}")]
    Cache(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
