//! Background session validation
//!
//! A [`ValidationScheduler`] periodically drives the manager's full
//! validation sweep, independent of foreground traffic. The manager enables
//! it lazily on first session use, so a manager that never serves traffic
//! never spins up background work.

use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::manager::SessionManager;

/// Replaceable scheduling capability for the validation sweep.
#[async_trait]
pub trait ValidationScheduler: Send + Sync {
    /// Start periodic validation. Idempotent while already running.
    async fn enable(&self);

    /// Stop periodic validation, best-effort. Errors from the underlying
    /// task shutdown are swallowed and logged; this is called during
    /// teardown and must never block destruction.
    async fn disable(&self);

    async fn is_enabled(&self) -> bool;

    /// Change the sweep period. Takes effect immediately if running.
    async fn set_interval(&self, interval: Duration);
}

/// Default scheduler: a tokio task ticking at a fixed period and calling
/// [`SessionManager::validate_sessions`].
///
/// Holds only a `Weak` reference to the manager; the task exits on its own
/// once the manager is dropped.
pub struct PeriodicValidationScheduler {
    manager: Weak<SessionManager>,
    interval: RwLock<Duration>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicValidationScheduler {
    pub fn new(manager: Weak<SessionManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval: RwLock::new(interval),
            task: Mutex::new(None),
        }
    }

    fn spawn_sweep_task(&self, period: Duration) -> JoinHandle<()> {
        let manager = self.manager.clone();
        // tokio::time::interval panics on zero
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately; the first sweep should
            // happen one full period from enablement
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match manager.upgrade() {
                    Some(manager) => manager.validate_sessions().await,
                    None => break,
                }
            }
        })
    }

    async fn stop_task(task: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = task.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_cancelled() {
                    tracing::debug!("validation sweep task cancelled");
                } else {
                    tracing::warn!("error shutting down validation sweep task, ignoring: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl ValidationScheduler for PeriodicValidationScheduler {
    async fn enable(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let period = *self.interval.read().await;
        tracing::info!(
            "enabling periodic session validation every {}ms",
            period.as_millis()
        );
        *task = Some(self.spawn_sweep_task(period));
    }

    async fn disable(&self) {
        let mut task = self.task.lock().await;
        Self::stop_task(&mut task).await;
    }

    async fn is_enabled(&self) -> bool {
        let task = self.task.lock().await;
        task.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn set_interval(&self, interval: Duration) {
        *self.interval.write().await = interval;
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            Self::stop_task(&mut task).await;
            *task = Some(self.spawn_sweep_task(interval));
        }
    }
}
