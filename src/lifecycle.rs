//! Lazy, single-instance construction of the conversion engine.
//!
//! Building an engine is orders of magnitude more expensive than running one
//! conversion, so it must happen at most once per successful load. The
//! [`ConverterLifecycle`] owns that single instance and hands out clones of
//! its [`ConverterHandle`].
//!
//! ## States
//!
//! ```text
//!   Uninitialized ──acquire──▶ Loading ──ok──▶ Ready
//!                                 │
//!                                 └──err──▶ Failed ──acquire──▶ Loading
//! ```
//!
//! While `Loading`, the state holds a shared one-shot future. Every caller
//! that arrives during the load awaits a clone of it, so all of them see the
//! same handle or the same [`ConstructionError`]. Construction itself runs
//! in a spawned task and finishes even if the request that started it goes
//! away.
//!
//! There is no timeout on the wait: a factory that never returns leaves the
//! state in `Loading` and every converter-dependent request waits with it.

use crate::converter::{ConverterFactory, ConverterHandle};
use crate::error::ConstructionError;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{error, info};

type PendingLoad = Shared<BoxFuture<'static, Result<ConverterHandle, ConstructionError>>>;

enum LifecycleState {
    Uninitialized,
    Loading(PendingLoad),
    Ready(ConverterHandle),
    Failed(ConstructionError),
}

/// Observable summary of the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Owner of the process-wide conversion engine.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ConverterLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    factory: Arc<dyn ConverterFactory>,
    state: Mutex<LifecycleState>,
    attempts: AtomicUsize,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConverterLifecycle {
    pub fn new(factory: Arc<dyn ConverterFactory>) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                state: Mutex::new(LifecycleState::Uninitialized),
                attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Return the engine, constructing it first if needed.
    ///
    /// * Ready: returns the existing handle immediately.
    /// * Loading: waits for the in-flight attempt and returns its outcome.
    /// * Uninitialized / Failed: starts a new attempt and waits for it.
    pub async fn acquire(&self) -> Result<ConverterHandle, ConstructionError> {
        let pending = {
            let mut state = self.inner.lock_state();
            match &*state {
                LifecycleState::Ready(handle) => return Ok(Arc::clone(handle)),
                LifecycleState::Loading(pending) => pending.clone(),
                LifecycleState::Uninitialized | LifecycleState::Failed(_) => {
                    let pending = self.start_load();
                    *state = LifecycleState::Loading(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Current state, without triggering construction.
    pub fn status(&self) -> LifecycleStatus {
        match &*self.inner.lock_state() {
            LifecycleState::Uninitialized => LifecycleStatus::Uninitialized,
            LifecycleState::Loading(_) => LifecycleStatus::Loading,
            LifecycleState::Ready(_) => LifecycleStatus::Ready,
            LifecycleState::Failed(_) => LifecycleStatus::Failed,
        }
    }

    /// `true` once the engine has been constructed.
    pub fn is_ready(&self) -> bool {
        self.status() == LifecycleStatus::Ready
    }

    /// The error of the last attempt, if it failed.
    pub fn last_error(&self) -> Option<ConstructionError> {
        match &*self.inner.lock_state() {
            LifecycleState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Name of the engine the factory builds.
    pub fn engine_name(&self) -> &str {
        self.inner.factory.engine_name()
    }

    /// Number of construction attempts started so far.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Spawn a construction attempt. Called with the state lock held.
    fn start_load(&self) -> PendingLoad {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let engine = inner.factory.engine_name().to_string();
            info!(attempt, engine = %engine, "Loading conversion engine");
            let start = Instant::now();

            let outcome = inner.factory.create().await;
            let elapsed = start.elapsed().as_secs_f64();

            let mut state = inner.lock_state();
            match &outcome {
                Ok(handle) => {
                    info!(engine = %engine, "Conversion engine loaded in {:.1}s", elapsed);
                    *state = LifecycleState::Ready(Arc::clone(handle));
                }
                Err(e) => {
                    error!(engine = %engine, attempt, "Conversion engine failed to load after {:.1}s: {}", elapsed, e);
                    *state = LifecycleState::Failed(e.clone());
                }
            }
            outcome
        });

        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let err = ConstructionError::Aborted(join_err.to_string());
                    error!("Conversion engine construction task aborted: {}", join_err);
                    *inner.lock_state() = LifecycleState::Failed(err.clone());
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}
