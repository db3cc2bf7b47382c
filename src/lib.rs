//! # TinyPNG Batch Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per le operazioni sui file e sul servizio
//! - `cache`: Indice dei file già ottimizzati (impronta SHA-256) e persistenza
//! - `client`: Client HTTP del servizio di compressione
//! - `file_manager`: Operazioni sui file e discovery delle immagini
//! - `optimizer`: Scheduler, job e orchestratore del processo
//! - `progress`: Progress bar e statistiche
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use tinypng_batch::{Config, FileManager, Optimizer};
//!
//! let config = Config { api_key: key, ..Default::default() };
//! let files = FileManager::find_images(&[PathBuf::from(".")], false);
//! let stats = Optimizer::new(config)?.run(files).await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod optimizer;
pub mod progress;

pub use cache::CacheIndex;
pub use client::{CompressionService, ShrinkResult, TinifyClient};
pub use config::{Concurrency, Config, ResizeMethod, ResizeSpec};
pub use error::OptimizeError;
pub use file_manager::FileManager;
pub use optimizer::Optimizer;
pub use progress::OptimizationStats;
