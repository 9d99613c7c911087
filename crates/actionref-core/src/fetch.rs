//! Download coordination for remote manifests.
//!
//! One [`FetchRecord`] exists per manifest URL. The [`FetchCoordinator`] is the
//! only component that mutates records: it starts downloads through a
//! [`RemoteProvider`], restarts failed ones when the retry generation moves,
//! and lets callers wait for a record to settle.
//!
//! # Locking
//!
//! ```text
//! FetchCoordinator.records   Mutex<HashMap<url, Arc<FetchRecord>>>   index only
//! FetchRecord.inner          Mutex<RecordInner> + Condvar             per URL
//! FetchCoordinator.generation AtomicU64                               lock-free
//! ```
//!
//! The index lock is never held while a record lock is taken, and no lock is
//! held while calling into the provider or notifying consumers.

use crate::manifest::ActionManifest;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// FetchState / FetchFailure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    NotStarted,
    InProgress,
    Downloaded,
    Error,
}

impl FetchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FetchState::Downloaded | FetchState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchState::NotStarted => "not_started",
            FetchState::InProgress => "in_progress",
            FetchState::Downloaded => "downloaded",
            FetchState::Error => "error",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a download failed. `status` is set when the server answered with a
/// non-success HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl FetchFailure {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ---------------------------------------------------------------------------
// Consumers
// ---------------------------------------------------------------------------

/// Something that wants to re-evaluate once a pending download settles,
/// typically an open document in an editor.
pub trait Consumer: Send + Sync {
    fn notify(&self, url: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(pub u64);

/// A consumer plus the identity used to deduplicate and unsubscribe it.
#[derive(Clone)]
pub struct Subscriber {
    pub id: ConsumerId,
    pub consumer: Arc<dyn Consumer>,
}

impl Subscriber {
    pub fn new(id: ConsumerId, consumer: Arc<dyn Consumer>) -> Self {
        Self { id, consumer }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// Execution context / cancellation
// ---------------------------------------------------------------------------

/// Whether the calling thread may block. Supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Blocking,
    /// e.g. a UI dispatch thread: never wait, subscribe instead.
    NonBlocking,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything `await_settled` needs to know about its caller.
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    pub subscriber: Option<Subscriber>,
    pub exec: ExecutionContext,
    pub cancel: CancellationToken,
}

// ---------------------------------------------------------------------------
// Provider capability
// ---------------------------------------------------------------------------

/// Transport used to fetch manifest bodies. Implementations must not block
/// inside `start_download`; the result is delivered through the sink, from
/// any thread.
pub trait RemoteProvider: Send + Sync {
    fn start_download(&self, url: &str, sink: DownloadSink);
}

/// One-shot completion handle for a single download attempt.
///
/// Dropping a sink without calling [`DownloadSink::complete`] fails the
/// attempt, so a provider that loses a download never leaves its record
/// stuck in progress.
pub struct DownloadSink {
    record: Option<Arc<FetchRecord>>,
    attempt: u64,
}

impl DownloadSink {
    pub fn url(&self) -> &str {
        self.record.as_ref().map(|r| r.url.as_str()).unwrap_or_default()
    }

    pub fn complete(mut self, outcome: Result<String, FetchFailure>) {
        if let Some(record) = self.record.take() {
            record.finish(self.attempt, outcome);
        }
    }
}

impl Drop for DownloadSink {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            record.finish(
                self.attempt,
                Err(FetchFailure::transport("download abandoned")),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// FetchRecord
// ---------------------------------------------------------------------------

/// Point-in-time view of a record.
#[derive(Debug, Clone)]
pub struct FetchSnapshot {
    pub state: FetchState,
    pub failure: Option<FetchFailure>,
    /// Parsed manifest; `None` unless downloaded and parseable.
    pub manifest: Option<Arc<ActionManifest>>,
    pub generation: u64,
}

struct RecordInner {
    state: FetchState,
    failure: Option<FetchFailure>,
    manifest: Option<Arc<ActionManifest>>,
    generation: u64,
    attempt: u64,
    subscribers: BTreeMap<ConsumerId, Arc<dyn Consumer>>,
}

pub struct FetchRecord {
    url: String,
    inner: Mutex<RecordInner>,
    settled: Condvar,
}

impl fmt::Debug for FetchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRecord")
            .field("url", &self.url)
            .field("state", &self.lock().state)
            .finish()
    }
}

impl FetchRecord {
    fn new(url: String) -> Self {
        Self {
            url,
            inner: Mutex::new(RecordInner {
                state: FetchState::NotStarted,
                failure: None,
                manifest: None,
                generation: 0,
                attempt: 0,
                subscribers: BTreeMap::new(),
            }),
            settled: Condvar::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn lock(&self) -> MutexGuard<'_, RecordInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> FetchSnapshot {
        Self::snapshot_of(&self.lock())
    }

    fn snapshot_of(inner: &RecordInner) -> FetchSnapshot {
        FetchSnapshot {
            state: inner.state,
            failure: inner.failure.clone(),
            manifest: inner.manifest.clone(),
            generation: inner.generation,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Move to `InProgress` for a new attempt and return its number.
    fn begin_attempt(inner: &mut RecordInner, generation: u64) -> u64 {
        inner.state = FetchState::InProgress;
        inner.failure = None;
        inner.manifest = None;
        inner.generation = generation;
        inner.attempt += 1;
        inner.attempt
    }

    fn finish(&self, attempt: u64, outcome: Result<String, FetchFailure>) {
        // Parse outside the lock; manifests can be large.
        let outcome = outcome.map(|body| match ActionManifest::parse(&body) {
            Ok(manifest) => Some(Arc::new(manifest)),
            Err(e) => {
                debug!(url = %self.url, error = %e, "downloaded manifest does not parse");
                None
            }
        });

        let subscribers = {
            let mut inner = self.lock();
            if inner.attempt != attempt || inner.state != FetchState::InProgress {
                debug!(url = %self.url, attempt, "ignoring stale download result");
                return;
            }
            match outcome {
                Ok(manifest) => {
                    info!(url = %self.url, "downloaded");
                    inner.state = FetchState::Downloaded;
                    inner.manifest = manifest;
                }
                Err(failure) => {
                    info!(url = %self.url, error = %failure, "download failed");
                    inner.state = FetchState::Error;
                    inner.failure = Some(failure);
                }
            }
            std::mem::take(&mut inner.subscribers)
        };
        self.settled.notify_all();

        for consumer in subscribers.values() {
            consumer.notify(&self.url);
        }
    }

    fn subscribe(inner: &mut RecordInner, subscriber: Option<&Subscriber>) {
        if let Some(s) = subscriber {
            inner.subscribers.insert(s.id, Arc::clone(&s.consumer));
        }
    }

    fn unsubscribe(&self, id: ConsumerId) {
        self.lock().subscribers.remove(&id);
    }

    /// Block while in progress, in slices of `poll`, until settled, cancelled
    /// or `max_wait` elapses. The subscriber is registered when the wait ends
    /// with the download still pending.
    fn wait(
        &self,
        max_wait: Duration,
        poll: Duration,
        ctx: &WaitContext,
    ) -> FetchSnapshot {
        let deadline = Instant::now() + max_wait;
        let mut inner = self.lock();
        while inner.state == FetchState::InProgress {
            if ctx.cancel.is_cancelled() {
                debug!(url = %self.url, "wait cancelled");
                Self::subscribe(&mut inner, ctx.subscriber.as_ref());
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(url = %self.url, "waited too long for download");
                Self::subscribe(&mut inner, ctx.subscriber.as_ref());
                break;
            }
            let slice = poll.min(deadline - now);
            inner = match self.settled.wait_timeout(inner, slice) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        Self::snapshot_of(&inner)
    }
}

// ---------------------------------------------------------------------------
// FetchCoordinator
// ---------------------------------------------------------------------------

pub struct FetchCoordinator {
    provider: Arc<dyn RemoteProvider>,
    records: Mutex<HashMap<String, Arc<FetchRecord>>>,
    generation: AtomicU64,
    poll_interval: Duration,
}

impl fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("generation", &self.generation())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    pub fn new(provider: Arc<dyn RemoteProvider>) -> Self {
        Self::with_poll_interval(provider, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(provider: Arc<dyn RemoteProvider>, poll_interval: Duration) -> Self {
        Self {
            provider,
            records: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Current retry generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Make every failed record eligible for one more attempt. Starts nothing.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The record for `url`, created on first use.
    pub fn record(&self, url: &str) -> Arc<FetchRecord> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            records
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(FetchRecord::new(url.to_string()))),
        )
    }

    pub fn snapshot(&self, url: &str) -> FetchSnapshot {
        self.record(url).snapshot()
    }

    /// Start the download if it never started, or restart it if it failed
    /// under an older retry generation.
    pub fn ensure_started(&self, url: &str) -> Arc<FetchRecord> {
        let record = self.record(url);
        let generation = self.generation();
        let attempt = {
            let mut inner = record.lock();
            match inner.state {
                FetchState::NotStarted => {
                    info!(url = %url, "started downloading");
                    Some(FetchRecord::begin_attempt(&mut inner, generation))
                }
                FetchState::Error if inner.generation != generation => {
                    info!(url = %url, generation, "restarting download");
                    Some(FetchRecord::begin_attempt(&mut inner, generation))
                }
                _ => None,
            }
        };
        if let Some(attempt) = attempt {
            self.dispatch(&record, attempt);
        }
        record
    }

    /// Start a fresh attempt whatever the record's state. A still-running
    /// earlier attempt is superseded and its result discarded.
    pub fn restart(&self, url: &str) -> Arc<FetchRecord> {
        let record = self.record(url);
        let generation = self.generation();
        let attempt = {
            let mut inner = record.lock();
            info!(url = %url, "refresh requested");
            FetchRecord::begin_attempt(&mut inner, generation)
        };
        self.dispatch(&record, attempt);
        record
    }

    fn dispatch(&self, record: &Arc<FetchRecord>, attempt: u64) {
        let sink = DownloadSink {
            record: Some(Arc::clone(record)),
            attempt,
        };
        self.provider.start_download(&record.url, sink);
    }

    /// Wait for `url` to leave `InProgress`.
    ///
    /// Non-blocking callers return immediately; if the download is pending
    /// their subscriber is registered for a wake-up instead. Blocking callers
    /// wait up to `max_wait`, checking the cancellation token every poll
    /// interval. Cancellation aborts only the wait, never the download.
    pub fn await_settled(&self, url: &str, ctx: &WaitContext, max_wait: Duration) -> FetchSnapshot {
        let record = self.record(url);
        if ctx.exec == ExecutionContext::NonBlocking {
            let mut inner = record.lock();
            if inner.state == FetchState::InProgress {
                warn!(url = %url, "download pending on a non-blocking context");
                FetchRecord::subscribe(&mut inner, ctx.subscriber.as_ref());
            }
            return FetchRecord::snapshot_of(&inner);
        }
        record.wait(max_wait, self.poll_interval, ctx)
    }

    /// Drop `id` from every record's wake-up list.
    pub fn unsubscribe(&self, id: ConsumerId) {
        let records: Vec<_> = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for record in records {
            record.unsubscribe(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
