//! Scene engine: runs a scene's actions in order as its own task, with at
//! most one run per scene and cooperative cancellation.
//!
//! Run lifecycle: `Idle → Running → {Completed, Cancelled, Aborted} → Idle`.
//! The running flag is claimed with a compare-and-swap, so two concurrent
//! `run_scene` calls can never both start. Each run gets a fresh
//! [`CancellationToken`]; a cancel that arrived while the scene was idle is
//! therefore forgotten by the next run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use roomctl_domain::event::{EventKind, ReportReason};
use roomctl_domain::id::SceneId;
use roomctl_domain::scene::RunOutcome;

use super::Orchestrator;
use super::propagation::Flow;
use crate::registry::SceneSlot;

/// Run slot of one scene.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    running: AtomicBool,
    token: Mutex<CancellationToken>,
    needs_report: AtomicBool,
}

impl RunState {
    /// Claim the slot. Returns the token of the new run, or `None` when a
    /// run is already active.
    ///
    /// The token lock is held across the claim so a concurrent `cancel`
    /// lands either before the run exists or on the new run's token.
    fn try_start(&self) -> Option<CancellationToken> {
        let mut current = self.lock_token();
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        let token = CancellationToken::new();
        *current = token.clone();
        Some(token)
    }

    fn release(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel(&self) {
        self.lock_token().cancel();
    }

    fn token(&self) -> CancellationToken {
        self.lock_token().clone()
    }

    fn lock_token(&self) -> MutexGuard<'_, CancellationToken> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the run slot when the run ends, including by panic.
struct RunGuard(Arc<SceneSlot>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.run.release();
    }
}

/// The scene on whose behalf a device is being executed.
#[derive(Debug, Clone)]
pub struct SceneRun {
    pub scene: SceneId,
    token: CancellationToken,
}

impl SceneRun {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Orchestrator {
    /// Start scene `id` unless it is already running.
    ///
    /// Returns the handle of the spawned run, or `None` when the scene does
    /// not exist, is already running, or no runtime is available. None of
    /// these is an error for the caller.
    #[tracing::instrument(skip(self))]
    pub fn run_scene(&self, id: SceneId) -> Option<JoinHandle<RunOutcome>> {
        let registry = self.registry();
        let Some(slot) = registry.scene(id) else {
            tracing::warn!(scene = %id, "scene not found");
            return None;
        };
        let Some(token) = slot.run.try_start() else {
            tracing::warn!(scene = %id, name = %slot.scene.name, "scene already running, skipped");
            return None;
        };
        let guard = RunGuard(Arc::clone(slot));

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!(scene = %id, error = %err, "cannot spawn scene run");
                return None;
            }
        };

        let ctx = self.context();
        let scene = &slot.scene;
        if scene.is_mode && ctx.enter_mode(&scene.name) {
            tracing::info!(mode = %scene.name, "entering mode");
            slot.run.needs_report.store(true, Ordering::SeqCst);
            self.publish(EventKind::ModeEntered {
                mode: scene.name.clone(),
            });
        }
        ctx.stamp_scene();
        let should_log = ctx.mode().is_empty();

        self.publish(EventKind::SceneStarted {
            scene: id,
            name: scene.name.clone(),
        });

        let engine = self.clone();
        let run = SceneRun { scene: id, token };
        Some(runtime.spawn(async move { engine.drive(guard, run, should_log).await }))
    }

    async fn drive(self, guard: RunGuard, run: SceneRun, should_log: bool) -> RunOutcome {
        let slot = Arc::clone(&guard.0);
        let scene = &slot.scene;
        tracing::debug!(scene = %scene.id, name = %scene.name, "scene run started");

        let mut outcome = RunOutcome::Completed;
        for action in &scene.actions {
            if run.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }
            match self.execute(
                action.device,
                &action.operation,
                &action.parameter,
                Some(&run),
                should_log,
            ) {
                Flow::Continue => {}
                Flow::Pause(duration) => {
                    if !self.pause_run(&run.token, duration).await {
                        tracing::info!(scene = %scene.id, "pause interrupted, remaining actions skipped");
                        outcome = RunOutcome::Cancelled;
                        break;
                    }
                }
                Flow::Abort => {
                    outcome = RunOutcome::Aborted;
                    break;
                }
            }
        }

        self.flush_indicators();
        if slot.run.needs_report.swap(false, Ordering::SeqCst) {
            self.publish(EventKind::StateReport {
                reason: ReportReason::ModeChange,
            });
        }
        self.publish(EventKind::SceneFinished {
            scene: scene.id,
            name: scene.name.clone(),
            outcome,
        });
        tracing::debug!(scene = %scene.id, ?outcome, "scene run finished");
        drop(guard);
        outcome
    }

    /// Request cooperative cancellation of scene `id`.
    ///
    /// Idempotent; on an idle scene it has no lasting effect.
    #[tracing::instrument(skip(self))]
    pub fn cancel_scene(&self, id: SceneId) {
        match self.registry().scene(id) {
            Some(slot) => {
                tracing::debug!(scene = %id, running = slot.is_running(), "cancelling scene");
                slot.run.cancel();
            }
            None => tracing::warn!(scene = %id, "cannot cancel unknown scene"),
        }
    }

    /// Cancellable sleep on behalf of scene `id`.
    ///
    /// Returns `true` if the whole duration elapsed, `false` if the scene
    /// was cancelled first. Queued indicator writes are published before
    /// sleeping.
    pub async fn pause_scene(&self, id: SceneId, duration: Duration) -> bool {
        let token = self.registry().scene(id).map(|slot| slot.run.token());
        match token {
            Some(token) => self.pause_run(&token, duration).await,
            None => {
                tracing::warn!(scene = %id, "pause for unknown scene");
                self.flush_indicators();
                tokio::time::sleep(duration).await;
                true
            }
        }
    }

    async fn pause_run(&self, token: &CancellationToken, duration: Duration) -> bool {
        self.flush_indicators();
        tokio::select! {
            biased;
            () = token.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}
