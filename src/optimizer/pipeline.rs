//! # Optimizer Main Orchestrator
//!
//! Orchestratore principale che collega cache, scheduler e coordinatore di shutdown.
//!
//! ## Flusso:
//! 1. Carica la cache (mai bloccante: snapshot assente = cache vuota)
//! 2. Per ogni candidato: filtri di peso/dimensione, poi controllo in cache
//! 3. Sottomette i file rimasti allo scheduler
//! 4. Attende il drain e scrive la cache una sola volta

use crate::{
    cache::CacheIndex,
    client::{CompressionService, TinifyClient},
    config::Config,
    file_manager::FileManager,
    optimizer::{
        job::{Job, JobContext},
        progress_tracker::ProgressTracker,
        scheduler::{Admission, JobScheduler},
        shutdown::ShutdownCoordinator,
    },
    progress::OptimizationStats,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Decision taken for a candidate before admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Process,
    /// Content unchanged since the last optimization
    AlreadyOptimized,
    /// Larger side below `--if-larger-than`
    TooSmall { width: u32, height: u32 },
    /// File below `--if-bigger-than`
    TooLight { size: u64 },
}

/// Orchestratore della sessione di ottimizzazione
pub struct Optimizer {
    config: Config,
    service: Arc<dyn CompressionService>,
}

impl Optimizer {
    /// Crea un optimizer che parla con il servizio reale
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let service = Arc::new(TinifyClient::new(&config.api_key, &config.endpoint)?);
        Ok(Self {
            config,
            service,
        })
    }

    /// Crea un optimizer con un servizio a scelta
    pub fn with_service(config: Config, service: Arc<dyn CompressionService>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            service,
        })
    }

    /// Esegue il processo di ottimizzazione su una lista di candidati
    pub async fn run(&self, files: Vec<PathBuf>) -> Result<OptimizationStats> {
        self.log_configuration(&files);

        let cache = Arc::new(CacheIndex::load(&self.config.cache_path).await);
        let tracker = if self.config.show_progress {
            ProgressTracker::new(files.len())
        } else {
            ProgressTracker::hidden()
        };

        let context = Arc::new(JobContext {
            service: self.service.clone(),
            cache: cache.clone(),
            tracker: tracker.clone(),
        });
        let scheduler = JobScheduler::new(self.config.concurrency, self.config.dry_run, context);
        let mut coordinator = ShutdownCoordinator::new(
            scheduler,
            cache.clone(),
            self.config.cache_path.clone(),
            self.config.drain,
        );
        if self.config.dry_run {
            coordinator = coordinator.without_persist();
        }

        for file in files {
            match self.screen(&cache, &file).await {
                Ok(Screening::Process) => {
                    let job = Job::new(file, &self.config);
                    if coordinator.scheduler().submit(job).await == Admission::Rejected {
                        warn!("Stopping submission, the scheduler admits no jobs");
                        break;
                    }
                }
                Ok(Screening::AlreadyOptimized) => {
                    debug!("File already packed: {}", file.display());
                    tracker.add_cached(&file).await;
                }
                Ok(Screening::TooSmall { width, height }) => {
                    debug!("Image is too small ({}x{}): `{}`", width, height, file.display());
                    tracker.add_filtered(&file).await;
                }
                Ok(Screening::TooLight { size }) => {
                    debug!(
                        "File is too light {}: `{}`",
                        FileManager::format_size(size),
                        file.display()
                    );
                    tracker.add_filtered(&file).await;
                }
                Err(e) => {
                    error!("Cannot read `{}`: {}", file.display(), e);
                    tracker.add_error(&file).await;
                }
            }
        }

        coordinator.shutdown().await;

        // Il riepilogo esce una sola volta: sulla barra oppure nel log
        let stats = tracker.stats().await;
        let summary = stats.format_summary();
        if self.config.show_progress {
            tracker.finish(&summary);
        } else {
            info!("{}", summary);
        }
        Ok(stats)
    }

    /// Filtri e controllo cache per un candidato
    pub async fn screen(&self, cache: &CacheIndex, file: &Path) -> Result<Screening> {
        if let Some(min_size) = self.config.min_file_size {
            let size = FileManager::file_size(file).await?;
            if size < min_size {
                return Ok(Screening::TooLight { size });
            }
        }

        if let Some(min_dimension) = self.config.min_dimension {
            // Header illeggibile: il file viene comunque inviato al servizio
            match image::image_dimensions(file) {
                Ok((width, height)) if width.max(height) < min_dimension => {
                    return Ok(Screening::TooSmall { width, height });
                }
                Ok(_) => {}
                Err(e) => debug!("Cannot read dimensions of `{}`: {}", file.display(), e),
            }
        }

        if cache.should_process(file, self.config.force).await? {
            Ok(Screening::Process)
        } else {
            Ok(Screening::AlreadyOptimized)
        }
    }

    /// Logga configurazione
    fn log_configuration(&self, files: &[PathBuf]) {
        info!("Found {} image{}", files.len(), if files.len() == 1 { "" } else { "s" });
        info!("Concurrency: {}", self.config.concurrency);

        if let Some(resize) = self.config.resize {
            info!(
                "Resize: {} (width: {}, height: {})",
                resize.method,
                resize.width.map_or("-".to_string(), |w| w.to_string()),
                resize.height.map_or("-".to_string(), |h| h.to_string())
            );
        }
        if let Some(min_dimension) = self.config.min_dimension {
            info!("Image(s) should be larger than {} pixels (width or height) to be processed", min_dimension);
        }
        if let Some(min_file_size) = self.config.min_file_size {
            info!("Files should be bigger than {} to be processed", FileManager::format_size(min_file_size));
        }
        if self.config.force {
            info!("Force mode: cached files will be uploaded again");
        }
        if self.config.dry_run {
            info!("Dry run mode: No files will be modified");
        }
        debug!("Cache snapshot: {}", self.config.cache_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockReply, MockService};
    use crate::config::Concurrency;
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn file(&self, name: &str, content: &[u8]) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn config(&self) -> Config {
            Config {
                api_key: "test-key".to_string(),
                cache_path: self.dir.path().join("cache.json"),
                show_progress: false,
                ..Default::default()
            }
        }
    }

    fn shrinkable() -> MockReply {
        MockReply::Shrunk {
            input_size: 1000,
            output_size: 300,
            optimized: b"optimized a".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_with_bound_one() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let b = ws.file("b.png", b"already optimal b");

        let service = Arc::new(
            MockService::new()
                .reply("a.png", shrinkable())
                .reply(
                    "b.png",
                    MockReply::Shrunk {
                        input_size: 17,
                        output_size: 17,
                        optimized: b"never downloaded".to_vec(),
                    },
                ),
        );
        let config = Config {
            concurrency: Concurrency::Limited(1),
            ..ws.config()
        };

        let optimizer = Optimizer::with_service(config.clone(), service.clone()).unwrap();
        let stats = optimizer.run(vec![a.clone(), b.clone()]).await.unwrap();

        assert_eq!(stats.files_optimized, 1);
        assert_eq!(stats.files_no_gain, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(service.max_in_flight(), 1);
        assert_eq!(service.fetch_calls(), 1);

        assert_eq!(std::fs::read(&a).unwrap(), b"optimized a");
        assert_eq!(std::fs::read(&b).unwrap(), b"already optimal b");

        let cache = CacheIndex::load(&config.cache_path).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&a).await, Some(CacheIndex::fingerprint(&a).await.unwrap()));
        assert_eq!(cache.get(&b).await, None);
    }

    #[tokio::test]
    async fn test_second_run_is_a_cache_hit() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let service = Arc::new(MockService::new().reply("a.png", shrinkable()));

        let optimizer = Optimizer::with_service(ws.config(), service.clone()).unwrap();
        let first = optimizer.run(vec![a.clone()]).await.unwrap();
        let second = optimizer.run(vec![a.clone()]).await.unwrap();

        assert_eq!(first.files_optimized, 1);
        assert!(first.format_summary().contains("Compressions this month: 1"));
        assert_eq!(second.files_optimized, 0);
        assert_eq!(second.files_cached, 1);
        assert_eq!(service.shrink_calls(), 1);
    }

    #[tokio::test]
    async fn test_force_bypasses_cache() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let service = Arc::new(MockService::new().reply("a.png", shrinkable()));

        Optimizer::with_service(ws.config(), service.clone())
            .unwrap()
            .run(vec![a.clone()])
            .await
            .unwrap();

        let forced = Config {
            force: true,
            ..ws.config()
        };
        let stats = Optimizer::with_service(forced, service.clone())
            .unwrap()
            .run(vec![a])
            .await
            .unwrap();

        assert_eq!(stats.files_cached, 0);
        assert_eq!(service.shrink_calls(), 2);
    }

    #[tokio::test]
    async fn test_modified_file_is_uploaded_again() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let service = Arc::new(MockService::new().reply("a.png", shrinkable()));
        let optimizer = Optimizer::with_service(ws.config(), service.clone()).unwrap();

        optimizer.run(vec![a.clone()]).await.unwrap();
        std::fs::write(&a, b"edited by the designer").unwrap();
        let stats = optimizer.run(vec![a]).await.unwrap();

        assert_eq!(stats.files_optimized, 1);
        assert_eq!(service.shrink_calls(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_is_pure() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let b = ws.file("b.jpg", b"another one");
        let service = Arc::new(
            MockService::new()
                .reply("a.png", shrinkable())
                .reply("b.jpg", shrinkable()),
        );
        let config = Config {
            dry_run: true,
            ..ws.config()
        };

        let stats = Optimizer::with_service(config.clone(), service.clone())
            .unwrap()
            .run(vec![a.clone(), b.clone()])
            .await
            .unwrap();

        assert_eq!(stats.files_would_run, 2);
        assert!(stats.format_summary().contains("Would optimize: 2"));
        assert_eq!(service.shrink_calls(), 0);
        assert_eq!(service.fetch_calls(), 0);
        assert_eq!(std::fs::read(&a).unwrap(), b"shrinkable original a");
        assert_eq!(std::fs::read(&b).unwrap(), b"another one");
        assert!(!config.cache_path.exists());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_siblings() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let limited = ws.file("limited.png", b"x");
        let denied = ws.file("denied.png", b"y");
        let service = Arc::new(
            MockService::new()
                .reply("a.png", shrinkable())
                .reply("limited.png", MockReply::RateLimited)
                .reply("denied.png", MockReply::Unauthorized),
        );

        let stats = Optimizer::with_service(ws.config(), service.clone())
            .unwrap()
            .run(vec![limited, a, denied])
            .await
            .unwrap();

        assert_eq!(stats.errors, 2);
        assert_eq!(stats.files_optimized, 1);
        assert_eq!(CacheIndex::load(&ws.config().cache_path).await.len().await, 1);
    }

    #[tokio::test]
    async fn test_weight_filter() {
        let ws = Workspace::new();
        let light = ws.file("light.png", b"tiny");
        let service = Arc::new(MockService::new().reply("light.png", shrinkable()));
        let config = Config {
            min_file_size: Some(1024),
            ..ws.config()
        };

        let optimizer = Optimizer::with_service(config, service.clone()).unwrap();
        let screening = optimizer.screen(&CacheIndex::default(), &light).await.unwrap();
        assert_eq!(screening, Screening::TooLight { size: 4 });

        let stats = optimizer.run(vec![light]).await.unwrap();
        assert_eq!(stats.files_filtered, 1);
        assert_eq!(service.shrink_calls(), 0);
    }

    #[tokio::test]
    async fn test_dimension_filter() {
        let ws = Workspace::new();
        let small = ws.dir.path().join("small.png");
        let large = ws.dir.path().join("large.png");
        image::RgbImage::new(8, 4).save(&small).unwrap();
        image::RgbImage::new(4, 64).save(&large).unwrap();

        let service = Arc::new(
            MockService::new()
                .reply("small.png", shrinkable())
                .reply("large.png", shrinkable()),
        );
        let config = Config {
            min_dimension: Some(32),
            ..ws.config()
        };
        let optimizer = Optimizer::with_service(config, service.clone()).unwrap();

        let cache = CacheIndex::default();
        assert_eq!(
            optimizer.screen(&cache, &small).await.unwrap(),
            Screening::TooSmall { width: 8, height: 4 }
        );
        assert_eq!(optimizer.screen(&cache, &large).await.unwrap(), Screening::Process);

        let stats = optimizer.run(vec![small, large]).await.unwrap();
        assert_eq!(stats.files_filtered, 1);
        assert_eq!(stats.files_optimized, 1);
        assert_eq!(service.shrink_calls(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_header_is_still_uploaded() {
        let ws = Workspace::new();
        let corrupt = ws.file("corrupt.png", b"definitely not a png header");
        let service = Arc::new(MockService::new().reply("corrupt.png", shrinkable()));
        let config = Config {
            min_dimension: Some(32),
            ..ws.config()
        };
        let optimizer = Optimizer::with_service(config, service.clone()).unwrap();

        assert_eq!(
            optimizer.screen(&CacheIndex::default(), &corrupt).await.unwrap(),
            Screening::Process
        );

        let stats = optimizer.run(vec![corrupt]).await.unwrap();
        assert_eq!(stats.files_filtered, 0);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.files_optimized, 1);
        assert_eq!(service.shrink_calls(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_candidate_is_reported() {
        let ws = Workspace::new();
        let missing = ws.dir.path().join("gone.png");
        let service = Arc::new(MockService::new());
        let config = Config {
            min_file_size: Some(1),
            ..ws.config()
        };

        let stats = Optimizer::with_service(config, service.clone())
            .unwrap()
            .run(vec![missing])
            .await
            .unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(service.shrink_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_concurrency_submits_nothing() {
        let ws = Workspace::new();
        let a = ws.file("a.png", b"shrinkable original a");
        let service = Arc::new(MockService::new().reply("a.png", shrinkable()));
        let config = Config {
            concurrency: Concurrency::Limited(0),
            ..ws.config()
        };

        let stats = Optimizer::with_service(config, service.clone())
            .unwrap()
            .run(vec![a])
            .await
            .unwrap();

        assert_eq!(stats.files_processed(), 0);
        assert_eq!(service.shrink_calls(), 0);
    }

    #[tokio::test]
    async fn test_many_files_unbounded() {
        let ws = Workspace::new();
        let mut service = MockService::new();
        let mut files = Vec::new();
        for i in 0..20 {
            let name = format!("img{}.png", i);
            files.push(ws.file(&name, format!("content {}", i).as_bytes()));
            service = service.reply(&name, shrinkable());
        }
        let service = Arc::new(service);

        let stats = Optimizer::with_service(ws.config(), service.clone())
            .unwrap()
            .run(files.clone())
            .await
            .unwrap();

        assert_eq!(stats.files_optimized, 20);
        assert_eq!(CacheIndex::load(&ws.config().cache_path).await.len().await, 20);

        let cache = CacheIndex::load(&ws.config().cache_path).await;
        let cache = &cache;
        let rechecks = futures::future::join_all(
            files
                .iter()
                .map(|f| async move { cache.should_process(f, false).await.unwrap() }),
        )
        .await;
        assert!(rechecks.iter().all(|needs_work| !needs_work));
    }
}
