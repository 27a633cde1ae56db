//! Worker pool (spec §4.8, §5): a bounded OS-thread pool sharing one job
//! queue, each thread driving a dedicated single-threaded tokio runtime.
//!
//! Grounded on the teacher's `main.rs` (`tokio::runtime::Runtime::new()`
//! then `rt.block_on(...)`, and `std::thread::spawn(move || rt.block_on(...))`
//! for a background server) for the per-thread dedicated-runtime pattern,
//! and `import/service.rs`'s queue-plus-worker shape for shared-queue
//! dispatch — there a single async task draining an `mpsc` channel; here N
//! blocking OS threads draining one `std::sync::mpsc` queue, per spec
//! §4.8's "parallel OS threads... one shared job queue".

pub mod pipeline;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::config::Config;
use crate::db::duplicates_db::DuplicatesDb;
use crate::db::metadata_db::MetadataDb;
use crate::db::state_db::StateDb;
use crate::enrich::cache::DiskCache;
use crate::enrich::primary::PrimaryClient;
use crate::enrich::ratelimit::{self, RateLimiter};
use crate::enrich::secondary::SecondaryClient;
use crate::enrich::EnrichmentClient;
use crate::error::AppError;

/// Shared, mostly-read-only state handed to every worker thread (spec §9:
/// "an explicit Context value carrying configuration, database handles,
/// logger, and rate limiters... No process-wide mutables except the
/// instance lock and the log writer").
pub struct Context {
    pub config: Config,
    pub state_db: StateDb,
    pub metadata_db: MetadataDb,
    pub duplicates_db: DuplicatesDb,
    pub primary: Option<Box<dyn EnrichmentClient>>,
    pub primary_cache: DiskCache,
    pub primary_limiter: RateLimiter,
    pub secondary: Option<Box<dyn EnrichmentClient>>,
    pub secondary_cache: DiskCache,
    pub secondary_limiter: RateLimiter,
    /// Any write transaction on any of the three databases (spec §4.8).
    pub db_lock: Mutex<()>,
    /// Held for the duration of one outbound enrichment call plus its
    /// rate-limiter sleep (spec §4.8).
    pub enrichment_lock: Mutex<()>,
    stop: AtomicBool,
}

impl Context {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let state_db = StateDb::open(&config.state_db_path).await?;
        let metadata_db = MetadataDb::open(&config.metadata_db_path).await?;
        let duplicates_db = DuplicatesDb::open(&config.duplicates_db_path).await?;

        let primary: Option<Box<dyn EnrichmentClient>> = if config.primary.enabled {
            Some(Box::new(PrimaryClient::new().map_err(AppError::from)?))
        } else {
            None
        };

        let secondary: Option<Box<dyn EnrichmentClient>> = if config.secondary.enabled {
            match config.secondary.key.clone().or_else(|| config.secondary.token.clone()) {
                Some(key) => Some(Box::new(SecondaryClient::new(key))),
                None => {
                    warn!("secondary enrichment enabled but no key/token configured, disabling it");
                    None
                }
            }
        } else {
            None
        };

        let primary_cache_dir = config
            .primary
            .cache_dir
            .clone()
            .unwrap_or_else(|| config.duplicates_dir.join(".cache").join("primary"));
        let secondary_cache_dir = config
            .secondary
            .cache_dir
            .clone()
            .unwrap_or_else(|| config.duplicates_dir.join(".cache").join("secondary"));

        let primary_limiter = RateLimiter::new(
            ratelimit::marker_path_for(&primary_cache_dir, "primary"),
            config.primary.rate_limit_per_minute,
        );
        let primary_cache = DiskCache::new(primary_cache_dir, config.primary.cache_expiry_hours);
        let secondary_limiter = RateLimiter::new(
            ratelimit::marker_path_for(&secondary_cache_dir, "secondary"),
            config.secondary.rate_limit_per_minute,
        );
        let secondary_cache = DiskCache::new(secondary_cache_dir, config.secondary.cache_expiry_hours);

        Ok(Context {
            config,
            state_db,
            metadata_db,
            duplicates_db,
            primary,
            primary_cache,
            primary_limiter,
            secondary,
            secondary_cache,
            secondary_limiter,
            db_lock: Mutex::new(()),
            enrichment_lock: Mutex::new(()),
            stop: AtomicBool::new(false),
        })
    }

    /// Polled cooperatively between pipeline steps (spec §5: "signals
    /// convert into a cooperative stop flag read by workers between
    /// steps").
    pub fn should_cancel(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// `min(configured_workers, cpu_cores)` (spec §4.8).
pub fn effective_worker_count(config: &Config) -> usize {
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    config.worker_count.max(1).min(cores)
}

/// The bounded OS-thread pool itself. Each worker owns a dedicated
/// single-threaded tokio runtime and blocks on it to drive the async
/// pipeline steps (DB queries, enrichment HTTP calls) — one album at a
/// time, no nested parallelism inside an album (spec §4.8).
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` threads sharing `jobs_rx` behind a mutex (spec
    /// §4.8: "one shared job queue"). Each dequeued album directory is run
    /// through `pipeline::process_one` and its outcome sent on
    /// `results_tx`; the pool drains until `jobs_rx` is exhausted or
    /// `ctx.should_cancel()` becomes true.
    pub fn spawn(
        worker_count: usize,
        ctx: Arc<Context>,
        jobs_rx: mpsc::Receiver<PathBuf>,
        results_tx: mpsc::Sender<pipeline::JobOutcome>,
    ) -> WorkerPool {
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let mut handles = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let jobs_rx = Arc::clone(&jobs_rx);
            let results_tx = results_tx.clone();
            let ctx = Arc::clone(&ctx);

            let handle = thread::Builder::new()
                .name(format!("shelfkeeper-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, ctx, jobs_rx, results_tx))
                .expect("failed to spawn worker thread");

            handles.push(handle);
        }

        WorkerPool { handles }
    }

    /// Wait for every worker thread to exit (queue drained or cancelled).
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    worker_id: usize,
    ctx: Arc<Context>,
    jobs_rx: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    results_tx: mpsc::Sender<pipeline::JobOutcome>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            warn!("worker {worker_id} failed to start its runtime: {e}");
            return;
        }
    };

    loop {
        if ctx.should_cancel() {
            break;
        }

        let job = jobs_rx.lock().unwrap().recv();
        let Ok(dir) = job else { break };

        if ctx.should_cancel() {
            break;
        }

        let outcome = rt.block_on(pipeline::process_one(&ctx, &dir));
        if results_tx.send(outcome).is_err() {
            break;
        }
    }

    info!("worker {worker_id} exiting");
}
