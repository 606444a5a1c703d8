//! The resource loader state machine.
//!
//! ```text
//! Unloaded ──acquire──▶ Loading ──ok──▶ Loaded
//!     ▲                    │
//!     └──reset── Failed ◀──┘ error / panic / timeout
//! ```
//!
//! The slot mutex is held only to inspect or swap state, never across an
//! await. Construction itself runs on a detached driver task, so a caller
//! that goes away does not cancel the load: the driver always settles the
//! slot into `Loaded` or `Failed`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use deepresearch_core::{CapabilityFactory, InitError, MemoryProfile, ResearchCapability};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{error, info, warn};

use crate::hints::{HintApplier, ProcessEnv};

/// Default upper bound on a single construction.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(120);

type Handle = Arc<dyn ResearchCapability>;
type LoadOutcome = Result<Handle, InitError>;
type PendingLoad = Shared<BoxFuture<'static, LoadOutcome>>;

enum Slot {
    Unloaded,
    Loading(PendingLoad),
    Loaded(Handle),
    Failed(InitError),
}

/// Point-in-time view of the loader, safe to take from any handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nobody has asked for the capability yet
    Unloaded,
    /// Construction is in flight
    Loading,
    /// The capability is ready
    Loaded,
    /// Construction failed; the error is replayed to every caller
    Failed(InitError),
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Unloaded => "unloaded",
            LoadStatus::Loading => "loading",
            LoadStatus::Loaded => "loaded",
            LoadStatus::Failed(_) => "failed",
        }
    }
}

/// Counters exposed for status reporting and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Number of times the factory's `build` was entered
    pub constructions: usize,
    /// Number of times the memory profile was applied (0 or 1)
    pub hint_applications: usize,
}

struct LoaderInner {
    slot: Mutex<Slot>,
    constructions: AtomicUsize,
    hint_applications: AtomicUsize,
    hints_consumed: AtomicBool,
    exited: AtomicBool,
    /// Set while a `factory.build` is running, including one abandoned by
    /// the timeout watchdog.
    build_in_flight: AtomicBool,
}

/// Clears `build_in_flight` when the blocking build ends, however it ends.
struct BuildGuard(Arc<LoaderInner>);

impl Drop for BuildGuard {
    fn drop(&mut self) {
        self.0.build_in_flight.store(false, Ordering::SeqCst);
    }
}

impl LoaderInner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move `Loading` into its terminal state. Any other state is left alone,
    /// so a loaded capability is never replaced.
    fn settle(&self, outcome: &LoadOutcome) {
        let mut slot = self.slot();
        if matches!(*slot, Slot::Loading(_)) {
            *slot = match outcome {
                Ok(capability) => Slot::Loaded(Arc::clone(capability)),
                Err(err) => Slot::Failed(err.clone()),
            };
        }
    }
}

/// Owns the single research capability of the process.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ResourceLoader {
    factory: Arc<dyn CapabilityFactory>,
    hints: Arc<dyn HintApplier>,
    profile: MemoryProfile,
    init_timeout: Duration,
    inner: Arc<LoaderInner>,
}

impl ResourceLoader {
    /// Create an unloaded loader. Nothing is constructed until the first
    /// [`acquire`](Self::acquire).
    pub fn new(factory: Arc<dyn CapabilityFactory>) -> Self {
        Self {
            factory,
            hints: Arc::new(ProcessEnv),
            profile: MemoryProfile::constrained(),
            init_timeout: DEFAULT_INIT_TIMEOUT,
            inner: Arc::new(LoaderInner {
                slot: Mutex::new(Slot::Unloaded),
                constructions: AtomicUsize::new(0),
                hint_applications: AtomicUsize::new(0),
                hints_consumed: AtomicBool::new(false),
                exited: AtomicBool::new(false),
                build_in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Override the memory profile handed to the factory.
    pub fn with_profile(mut self, profile: MemoryProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Override how the memory profile is applied to the process.
    pub fn with_hint_applier(mut self, hints: Arc<dyn HintApplier>) -> Self {
        self.hints = hints;
        self
    }

    /// Bound construction time. A construction that overruns is marked failed.
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Name of the capability this loader builds.
    pub fn capability_name(&self) -> &str {
        self.factory.name()
    }

    /// Get the capability, constructing it on first demand.
    ///
    /// - `Loaded`: returns the cached handle.
    /// - `Failed`: returns the cached error; construction is not retried.
    /// - `Loading`: waits for the in-flight construction.
    /// - `Unloaded`: starts construction and waits for it.
    pub async fn acquire(&self) -> Result<Arc<dyn ResearchCapability>, InitError> {
        let pending = {
            let mut slot = self.inner.slot();
            match &*slot {
                Slot::Loaded(capability) => return Ok(Arc::clone(capability)),
                Slot::Failed(err) => return Err(err.clone()),
                Slot::Loading(pending) => pending.clone(),
                Slot::Unloaded => {
                    let pending = self.start_load();
                    *slot = Slot::Loading(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Non-blocking snapshot. Never triggers construction.
    pub fn status(&self) -> LoadStatus {
        match &*self.inner.slot() {
            Slot::Unloaded => LoadStatus::Unloaded,
            Slot::Loading(_) => LoadStatus::Loading,
            Slot::Loaded(_) => LoadStatus::Loaded,
            Slot::Failed(err) => LoadStatus::Failed(err.clone()),
        }
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            constructions: self.inner.constructions.load(Ordering::SeqCst),
            hint_applications: self.inner.hint_applications.load(Ordering::SeqCst),
        }
    }

    /// Explicitly clear a failed load so the next `acquire` tries again.
    ///
    /// Returns `false` (and changes nothing) unless the loader is `Failed`
    /// and no earlier build is still running. A build abandoned by the timeout
    /// keeps its memory until it returns, so a retry must wait for it.
    /// Memory hints are not re-applied on the retry.
    pub fn reset(&self) -> bool {
        let mut slot = self.inner.slot();
        if let Slot::Failed(err) = &*slot {
            if self.inner.build_in_flight.load(Ordering::SeqCst) {
                warn!(error = %err, "Not resetting: timed-out build is still running");
                return false;
            }
            warn!(error = %err, "Resetting failed research capability");
            *slot = Slot::Unloaded;
            return true;
        }
        false
    }

    /// Leave the capability's scoped lifecycle. Only the first call on a
    /// loaded capability has any effect; the loader stays `Loaded`.
    pub fn shutdown(&self) {
        let capability = match &*self.inner.slot() {
            Slot::Loaded(capability) => Some(Arc::clone(capability)),
            _ => None,
        };

        if let Some(capability) = capability {
            if !self.inner.exited.swap(true, Ordering::SeqCst) {
                info!(capability = capability.name(), "Releasing research capability");
                capability.exit();
            }
        }
    }

    /// Spawn the driver task and wrap its outcome in a shareable future.
    ///
    /// Must be called with the slot lock held, so the driver cannot settle
    /// before the slot holds `Loading`.
    fn start_load(&self) -> PendingLoad {
        let inner = Arc::clone(&self.inner);
        let factory = Arc::clone(&self.factory);
        let hints = Arc::clone(&self.hints);
        let profile = self.profile.clone();
        let limit = self.init_timeout;

        let driver = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                let outcome = construct(Arc::clone(&inner), factory, hints, profile, limit).await;
                inner.settle(&outcome);
                outcome
            }
        });

        async move {
            match driver.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let err = InitError::Panicked(join_err.to_string());
                    inner.settle(&Err(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Apply hints (once per process), build, enter, and trim the capability,
/// bounded by `limit`.
///
/// On timeout the blocking build keeps running to completion in the
/// background; whatever it produces is dropped.
async fn construct(
    inner: Arc<LoaderInner>,
    factory: Arc<dyn CapabilityFactory>,
    hints: Arc<dyn HintApplier>,
    profile: MemoryProfile,
    limit: Duration,
) -> LoadOutcome {
    let started = Instant::now();
    let name = factory.name().to_string();
    info!(capability = %name, device = %profile.device, "Loading research capability (lazy)");

    inner.build_in_flight.store(true, Ordering::SeqCst);
    let guard = BuildGuard(inner);
    let build = tokio::task::spawn_blocking(move || -> LoadOutcome {
        let inner = &guard.0;
        if !inner.hints_consumed.swap(true, Ordering::SeqCst) {
            hints.apply(&profile);
            inner.hint_applications.fetch_add(1, Ordering::SeqCst);
        }

        inner.constructions.fetch_add(1, Ordering::SeqCst);
        let capability = factory.build(&profile)?;
        capability.enter()?;
        capability.trim_memory();
        Ok(capability)
    });

    let outcome = match tokio::time::timeout(limit, build).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => Err(InitError::Panicked(panic_message(join_err))),
        Err(_) => Err(InitError::Timeout {
            timeout_ms: limit.as_millis() as u64,
        }),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Ok(_) => info!(capability = %name, elapsed_ms, "Research capability loaded"),
        Err(err) => error!(capability = %name, elapsed_ms, error = %err, "Research capability failed to load"),
    }

    outcome
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".into()
    }
}
