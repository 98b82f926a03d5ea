//! Generation job orchestrator
//!
//! Owns the in-memory job registry, the waiting queue, the serialized
//! work chain, and the per-job inactivity timers. Created once at process
//! start and shared through `AppState`; torn down at shutdown.
//!
//! Concurrency model: lines of one job resolve concurrently, interleaved
//! at await points, and the timeout supervisor can delete a job at any
//! time, so every mutation path re-checks the job status immediately
//! after resuming from a suspension. Jobs with uncached work are chained
//! one after another so at most one expensive body runs at a time; fully
//! cached jobs are read-only and bypass the chain.

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use lyrivis_common::config::TomlConfig;
use lyrivis_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{GenerationJob, JobSnapshot, JobStatus, LineImage, LyricLine};
use crate::services::dedup_cache::{phrase_hash, pick_random, DedupCache};
use crate::services::image_store::{data_uri, ImageStore};
use crate::services::throttle::throttle_delay;
use crate::services::ImageGenerator;

/// Orchestrator tunables, loaded from the service TOML
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Window without a poll before an abandoned job is reclaimed
    pub inactivity_timeout: Duration,
    /// Newly discovered phrases allowed per throttle interval
    pub throttle_phrases_per_interval: usize,
    /// Throttle interval
    pub throttle_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(120),
            throttle_phrases_per_interval: 3,
            throttle_interval: Duration::from_secs(10),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
            throttle_phrases_per_interval: config.throttle_phrases_per_interval,
            throttle_interval: Duration::from_secs(config.throttle_interval_secs),
        }
    }
}

/// Tail of the serialized work chain; each queued body is a continuation
/// of the previous body's completion
type ChainTail = Shared<BoxFuture<'static, ()>>;

/// Shared in-flight generation for one phrase of one job. The String
/// error keeps the output cloneable for every awaiting line.
type PendingGeneration = Shared<BoxFuture<'static, std::result::Result<Vec<Uuid>, String>>>;

type PendingMap = Arc<Mutex<HashMap<String, PendingGeneration>>>;

type JobRef = Arc<RwLock<GenerationJob>>;

pub struct Orchestrator {
    cache: DedupCache,
    store: ImageStore,
    generator: Arc<dyn ImageGenerator>,
    settings: OrchestratorSettings,

    /// Registry of live jobs; exclusive owner of job records
    jobs: RwLock<HashMap<Uuid, JobRef>>,

    /// FIFO of jobs not yet started, holding non-owning references into
    /// the registry. Source of queue-position reporting.
    waiting: StdMutex<Vec<Uuid>>,

    /// One outstanding inactivity timer per job, tagged with an arming
    /// epoch so a stale timer that lost a reset race can detect it
    timers: StdMutex<HashMap<Uuid, (u64, JoinHandle<()>)>>,
    timer_epoch: AtomicU64,

    chain_tail: StdMutex<ChainTail>,
}

impl Orchestrator {
    pub fn new(
        cache: DedupCache,
        store: ImageStore,
        generator: Arc<dyn ImageGenerator>,
        settings: OrchestratorSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            store,
            generator,
            settings,
            jobs: RwLock::new(HashMap::new()),
            waiting: StdMutex::new(Vec::new()),
            timers: StdMutex::new(HashMap::new()),
            timer_epoch: AtomicU64::new(0),
            chain_tail: StdMutex::new(futures::future::ready(()).boxed().shared()),
        })
    }

    /// Create a job for the given lines and start its body.
    ///
    /// Classifies the job against the dedup cache: a fully cached job
    /// starts `InProgress` immediately and runs concurrently with
    /// whatever else is active; a job with uncached work enters the
    /// waiting queue and its body is chained behind the previous queued
    /// job. Returns the job id right away in either case.
    pub async fn submit(self: Arc<Self>, lines: Vec<LyricLine>) -> Result<Uuid> {
        let unique_hashes: HashSet<String> =
            lines.iter().map(|line| phrase_hash(&line.words)).collect();
        let present = self.cache.count_distinct_present(&unique_hashes).await?;
        let all_cached = present == unique_hashes.len();

        let id = Uuid::new_v4();
        let job = Arc::new(RwLock::new(GenerationJob::new(id, lines, all_cached)));
        self.jobs.write().await.insert(id, job.clone());
        self.clone().arm_timer(id);

        if all_cached {
            tracing::info!(job_id = %id, "All phrases cached, starting immediately");
            let orch = self.clone();
            tokio::spawn(async move { orch.execute_body(job).await });
        } else {
            tracing::info!(job_id = %id, "Queued generation job with uncached work");
            // Waiting-queue insert and chain-tail swap must be atomic so
            // queue order and body start order are identical
            let chained: ChainTail = {
                let mut tail = self.chain_tail.lock().expect("chain tail lock poisoned");
                self.waiting
                    .lock()
                    .expect("waiting queue lock poisoned")
                    .push(id);
                let prev = tail.clone();
                let orch = self.clone();
                let fut = async move {
                    prev.await;
                    orch.run_queued(id).await;
                }
                .boxed()
                .shared();
                *tail = fut.clone();
                fut
            };
            tokio::spawn(chained);
        }

        Ok(id)
    }

    /// Idempotent-looking status snapshot; resets the inactivity timer.
    ///
    /// Returns `None` once the job has been deleted (never existed,
    /// already delivered `Done`, or reclaimed by timeout). A `Done`
    /// snapshot is delivered at most once: the registry remove is the
    /// atomic point, so of any number of concurrent polls observing the
    /// finished job exactly one wins the remove and carries the
    /// snapshot; the rest report not-found.
    pub async fn poll(self: Arc<Self>, id: Uuid) -> Option<JobSnapshot> {
        let job = self.jobs.read().await.get(&id).cloned()?;

        // Every poll, regardless of resulting status, resets the timer
        self.clone().arm_timer(id);

        let snapshot = {
            let j = job.read().await;
            match j.status {
                JobStatus::Waiting => JobSnapshot::Waiting {
                    // Recomputed against the live waiting list, never
                    // cached; an absent entry means the job is starting
                    queue_position: self.position_of(id).unwrap_or(2),
                },
                JobStatus::InProgress => JobSnapshot::InProgress {
                    done: j.done,
                    total: j.total,
                },
                JobStatus::Error => JobSnapshot::Error,
                JobStatus::Cancelled => JobSnapshot::Cancelled,
                JobStatus::Done => JobSnapshot::Done {
                    lyrics: j.result.clone().unwrap_or_default(),
                },
            }
        };

        if matches!(snapshot, JobSnapshot::Done { .. }) {
            // Terminal delivery: first deliverer wins. A poll racing us
            // here finds the registry entry already gone and returns
            // not-found instead of a second DONE.
            if self.jobs.write().await.remove(&id).is_none() {
                return None;
            }
            self.reclaim(id).await;
        }

        Some(snapshot)
    }

    /// Hard delete of a job: registry entry, waiting-queue entry, and
    /// timer. Used for terminal delivery and timeout reclamation; there
    /// is no user-facing cancellation.
    pub async fn reclaim(&self, id: Uuid) {
        if let Some((_, handle)) = self
            .timers
            .lock()
            .expect("timer lock poisoned")
            .remove(&id)
        {
            handle.abort();
        }
        self.jobs.write().await.remove(&id);
        let mut waiting = self.waiting.lock().expect("waiting queue lock poisoned");
        if let Some(pos) = waiting.iter().position(|j| *j == id) {
            waiting.remove(pos);
        }
    }

    /// 1-based queue position of a waiting job, with slot 1 reserved for
    /// the job currently in progress
    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.waiting
            .lock()
            .expect("waiting queue lock poisoned")
            .iter()
            .position(|j| *j == id)
            .map(|index| index + 2)
    }

    /// (Re)arm the inactivity timer for a job. The previous timer, if
    /// any, is aborted; a timer that already fired and lost the race
    /// bails out on the epoch check before reclaiming.
    fn arm_timer(self: Arc<Self>, id: Uuid) {
        let epoch = self.timer_epoch.fetch_add(1, Ordering::SeqCst);
        let window = self.settings.inactivity_timeout;
        let orch = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut timers = orch.timers.lock().expect("timer lock poisoned");
                let current = timers.get(&id).map(|(e, _)| *e);
                if current != Some(epoch) {
                    // Re-armed by a poll while this timer slept
                    return;
                }
                timers.remove(&id);
            }
            tracing::info!(job_id = %id, "Reclaiming abandoned generation job");
            orch.reclaim(id).await;
        });
        let mut timers = self.timers.lock().expect("timer lock poisoned");
        if let Some((_, old)) = timers.insert(id, (epoch, handle)) {
            old.abort();
        }
    }

    /// Body of a queued job, run as a continuation of the previous
    /// queued body. Never propagates failures into the chain.
    async fn run_queued(self: Arc<Self>, id: Uuid) {
        // The job may have been reclaimed while waiting
        let Some(job) = self.jobs.read().await.get(&id).cloned() else {
            return;
        };

        {
            let mut waiting = self.waiting.lock().expect("waiting queue lock poisoned");
            if let Some(pos) = waiting.iter().position(|j| *j == id) {
                waiting.remove(pos);
            }
        }

        {
            let mut j = job.write().await;
            if j.status != JobStatus::Waiting {
                return;
            }
            j.status = JobStatus::InProgress;
        }
        tracing::info!(job_id = %id, "Generation job started");

        self.execute_body(job).await;
    }

    /// Resolve every line of a job concurrently and assemble the result
    /// in original line order
    async fn execute_body(self: Arc<Self>, job: JobRef) {
        let (id, lines) = {
            let j = job.read().await;
            (j.id, j.lines.clone())
        };

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let discovered = Arc::new(AtomicUsize::new(0));

        let mut line_futures = Vec::with_capacity(lines.len());
        for line in lines {
            line_futures.push(self.clone().resolve_line(
                job.clone(),
                line,
                pending.clone(),
                discovered.clone(),
            ));
        }
        let results = join_all(line_futures).await;

        let mut j = job.write().await;
        if j.status != JobStatus::InProgress {
            tracing::debug!(job_id = %id, status = ?j.status, "Job no longer in progress, discarding results");
            return;
        }
        // Still in progress after every line settled, so none were skipped
        j.result = Some(results.into_iter().flatten().collect());
        j.status = JobStatus::Done;
        tracing::info!(job_id = %id, total = j.total, "Generation job complete");
    }

    /// Resolve one line; returns `None` when the line was skipped (job
    /// already aborted or deleted). Any failure aborts the whole job.
    async fn resolve_line(
        self: Arc<Self>,
        job: JobRef,
        line: LyricLine,
        pending: PendingMap,
        discovered: Arc<AtomicUsize>,
    ) -> Option<LineImage> {
        match self
            .clone()
            .resolve_image_uri(&job, &line.words, &pending, &discovered)
            .await
        {
            Ok(Some(image_uri)) => {
                let mut j = job.write().await;
                if j.status != JobStatus::InProgress {
                    return None;
                }
                j.done += 1;
                Some(LineImage {
                    image_uri,
                    start_time_ms: line.start_time_ms,
                    words: line.words,
                })
            }
            Ok(None) => None,
            Err(e) => {
                let mut j = job.write().await;
                if j.status == JobStatus::InProgress {
                    tracing::warn!(job_id = %j.id, error = %e, "Line resolution failed, aborting job");
                    j.status = JobStatus::Error;
                }
                // Swallowed when the job is already non-InProgress
                None
            }
        }
    }

    /// Produce the data URI for one line's image: shared in-flight
    /// request, then dedup cache, then a fresh throttled generation
    async fn resolve_image_uri(
        self: Arc<Self>,
        job: &JobRef,
        words: &str,
        pending: &PendingMap,
        discovered: &Arc<AtomicUsize>,
    ) -> Result<Option<String>> {
        if job.read().await.status != JobStatus::InProgress {
            return Ok(None);
        }
        let hash = phrase_hash(words);

        // Another line of this job may already have this phrase in flight
        let in_flight = pending.lock().await.get(&hash).cloned();
        if let Some(generation) = in_flight {
            return self.await_generation(job, generation).await;
        }

        // Cross-job cache hit resolves without an external call or delay
        let records = self.cache.records_for(&hash).await?;
        if job.read().await.status != JobStatus::InProgress {
            return Ok(None);
        }
        if !records.is_empty() {
            let image_id = pick_random(&records)?;
            let bytes = self.store.read(image_id).await?;
            return Ok(Some(data_uri(&bytes)));
        }

        // New phrase. Check-and-insert under one lock so identical lines
        // that both missed the cache collapse onto a single request.
        let generation = {
            let mut map = pending.lock().await;
            if let Some(existing) = map.get(&hash) {
                existing.clone()
            } else {
                let ordinal = discovered.fetch_add(1, Ordering::SeqCst);
                let delay = throttle_delay(
                    ordinal,
                    self.settings.throttle_phrases_per_interval,
                    self.settings.throttle_interval,
                );
                let orch = self.clone();
                let prompt = words.to_string();
                let record_hash = hash.clone();
                let fut: PendingGeneration = async move {
                    if !delay.is_zero() {
                        tracing::debug!(
                            ordinal,
                            delay_ms = delay.as_millis() as u64,
                            "Throttling new phrase"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    let blobs = orch
                        .generator
                        .generate(&prompt)
                        .await
                        .map_err(|e| e.to_string())?;
                    let mut ids = Vec::with_capacity(blobs.len());
                    for bytes in blobs {
                        let image_id = Uuid::new_v4();
                        orch.store
                            .write(image_id, &bytes)
                            .await
                            .map_err(|e| e.to_string())?;
                        orch.cache
                            .insert(image_id, &record_hash)
                            .await
                            .map_err(|e| e.to_string())?;
                        ids.push(image_id);
                    }
                    Ok(ids)
                }
                .boxed()
                .shared();
                map.insert(hash, fut.clone());
                fut
            }
        };

        self.await_generation(job, generation).await
    }

    /// Await a (possibly shared) generation and pick one of its images
    async fn await_generation(
        &self,
        job: &JobRef,
        generation: PendingGeneration,
    ) -> Result<Option<String>> {
        let ids = generation.await.map_err(Error::Upstream)?;
        if job.read().await.status != JobStatus::InProgress {
            return Ok(None);
        }
        let image_id = pick_random(&ids)?;
        let bytes = self.store.read(image_id).await?;
        Ok(Some(data_uri(&bytes)))
    }
}
