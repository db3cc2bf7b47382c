//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `pipeline`: Orchestratore principale (filtri, cache, sottomissione)
//! - `job`: Macchina a stati per il singolo file
//! - `scheduler`: Ammissione con limite di concorrenza e drain
//! - `shutdown`: Drain seguito da un'unica scrittura della cache
//! - `progress_tracker`: Gestione progress unificata

pub mod job;
pub mod pipeline;
pub mod progress_tracker;
pub mod scheduler;
pub mod shutdown;

pub use job::{Job, JobOutcome, JobState, OptimizeJob};
pub use pipeline::{Optimizer, Screening};
pub use progress_tracker::ProgressTracker;
pub use scheduler::{Admission, JobScheduler};
pub use shutdown::{FlushOutcome, ShutdownCoordinator};
