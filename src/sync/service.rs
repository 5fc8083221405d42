//! Sync orchestrator: one-shot parallel load after login, debounced combined
//! pushes after local edits, and explicit manual pushes.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::common::error::{SyncError, SyncResult};
use crate::session::domain::Session;
use crate::session::service::SessionState;
use crate::store::domain::{ChangeOrigin, ConfigChanged, ConfigDomain};
use crate::store::service::Subscription;

use super::domain::{Gate, GatePhase, StillCurrent, SyncTarget};
use super::scheduler::Debouncer;

/// Per-domain result of a fan-out over every store.
pub type DomainResults = Vec<(ConfigDomain, bool)>;

struct Shared {
    session: SessionState,
    targets: Vec<Arc<dyn SyncTarget>>,
    gate: Mutex<Gate>,
    debouncer: Debouncer,
    debounce: Duration,
    runtime: Handle,
}

fn lock(gate: &Mutex<Gate>) -> MutexGuard<'_, Gate> {
    gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run `op` against every target concurrently. Each target runs in its own task,
/// so one failing or panicking domain never takes its siblings down.
async fn fan_out<F, Fut>(targets: &[Arc<dyn SyncTarget>], op: F) -> DomainResults
where
    F: Fn(Arc<dyn SyncTarget>) -> Fut,
    Fut: Future<Output = bool> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for target in targets {
        let domain = target.domain();
        let fut = op(target.clone());
        tasks.spawn(async move { (domain, fut.await) });
    }

    let mut results = Vec::with_capacity(targets.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) => error!("store task aborted: {err}"),
        }
    }
    results
}

async fn push_all(targets: &[Arc<dyn SyncTarget>], user_id: &str) -> DomainResults {
    fan_out(targets, |target| {
        let user_id = user_id.to_string();
        async move { target.sync_to_cloud(&user_id).await }
    })
    .await
}

fn all_ok(results: &DomainResults) -> bool {
    results.iter().all(|(_, ok)| *ok)
}

impl Shared {
    fn on_session(self: &Arc<Self>, session: &Session) {
        let mut gate = lock(&self.gate);
        if !session.authenticated || gate.generation != session.generation {
            if gate.phase != GatePhase::Idle {
                debug!(generation = session.generation, "session changed, gate reset");
            }
            *gate = Gate::idle(session.generation);
            self.debouncer.cancel();
        }

        let Some(user_id) = session.user_id() else {
            return;
        };
        if gate.phase != GatePhase::Idle {
            return;
        }
        gate.phase = GatePhase::Loading;
        drop(gate);

        let shared = self.clone();
        let user_id = user_id.to_string();
        let generation = session.generation;
        self.runtime
            .spawn(async move { shared.initial_load(user_id, generation).await });
    }

    async fn initial_load(&self, user_id: String, generation: u64) {
        let session = self.session.clone();
        let still_current: StillCurrent = Arc::new(move || {
            let current = session.snapshot();
            current.authenticated && current.generation == generation
        });
        let results = fan_out(&self.targets, |target| {
            let user_id = user_id.clone();
            let still_current = still_current.clone();
            async move { target.load_from_cloud(&user_id, still_current).await }
        })
        .await;

        let mut gate = lock(&self.gate);
        if gate.generation == generation && gate.phase == GatePhase::Loading {
            gate.phase = GatePhase::Loaded;
            info!(user_id = %user_id, ?results, "initial config load finished");
        } else {
            debug!(user_id = %user_id, "initial load outlived its session");
        }
    }

    fn on_config_changed(&self, event: &ConfigChanged) {
        if event.origin != ChangeOrigin::Local {
            return;
        }
        let session = self.session.snapshot();
        let Some(user_id) = session.user_id() else {
            return;
        };
        if !lock(&self.gate).allows_push(session.generation) {
            debug!(domain = %event.domain, "edit before initial load, not scheduling push");
            return;
        }
        self.schedule_push(user_id.to_string(), session.generation);
    }

    fn schedule_push(&self, user_id: String, generation: u64) {
        let targets = self.targets.clone();
        let session = self.session.clone();
        self.debouncer.arm(self.debounce, async move {
            let current = session.snapshot();
            if current.generation != generation || !current.authenticated {
                debug!(user_id = %user_id, "session changed before debounced push fired");
                return;
            }
            let results = push_all(&targets, &user_id).await;
            if all_ok(&results) {
                info!(user_id = %user_id, "configs pushed to cloud");
            } else {
                warn!(user_id = %user_id, ?results, "some configs failed to push");
            }
        });
    }
}

async fn watch_session(shared: Weak<Shared>, mut rx: watch::Receiver<Session>) {
    loop {
        let session = rx.borrow_and_update().clone();
        match shared.upgrade() {
            Some(shared) => shared.on_session(&session),
            None => return,
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Coordinates the session with every local store. Dropping it tears it down:
/// the session watcher stops, store subscriptions go away and a pending
/// debounced push is cancelled.
pub struct SyncOrchestrator {
    shared: Arc<Shared>,
    session_task: JoinHandle<()>,
    _subscriptions: Vec<Subscription>,
}

impl SyncOrchestrator {
    /// Start observing `session` and `targets`. Must be called inside a tokio runtime.
    pub fn start(
        session: SessionState,
        targets: Vec<Arc<dyn SyncTarget>>,
        debounce: Duration,
    ) -> SyncResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| SyncError::Internal("sync orchestrator needs a tokio runtime"))?;

        let initial = session.snapshot().generation;
        let shared = Arc::new(Shared {
            session,
            targets,
            gate: Mutex::new(Gate::idle(initial)),
            debouncer: Debouncer::new(runtime.clone()),
            debounce,
            runtime: runtime.clone(),
        });

        let subscriptions = shared
            .targets
            .iter()
            .map(|target| {
                let weak = Arc::downgrade(&shared);
                target.subscribe(Arc::new(move |event: &ConfigChanged| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_config_changed(event);
                    }
                }))
            })
            .collect();

        // Apply the current session before returning, so a restored session starts loading now.
        shared.on_session(&shared.session.snapshot());
        let session_task = runtime.spawn(watch_session(
            Arc::downgrade(&shared),
            shared.session.watch(),
        ));

        Ok(Self {
            shared,
            session_task,
            _subscriptions: subscriptions,
        })
    }

    pub fn gate(&self) -> Gate {
        *lock(&self.shared.gate)
    }

    pub fn gate_phase(&self) -> GatePhase {
        self.gate().phase
    }

    /// Whether a debounced push is waiting for its timer.
    pub fn push_pending(&self) -> bool {
        self.shared.debouncer.is_armed()
    }

    /// Push every domain now and wait for all of them. No-op while logged out.
    pub async fn manual_sync(&self, user_id: &str) -> bool {
        if user_id.is_empty() || !self.shared.session.is_authenticated() {
            return false;
        }
        let results = push_all(&self.shared.targets, user_id).await;
        info!(user_id, ?results, "manual sync finished");
        all_ok(&results)
    }

    /// [`manual_sync`](Self::manual_sync) for the current session's user.
    pub async fn sync_now(&self) -> bool {
        match self.shared.session.user_id() {
            Some(user_id) => self.manual_sync(&user_id).await,
            None => false,
        }
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.session_task.abort();
        self.shared.debouncer.cancel();
    }
}
