use crate::error::ServiceError;
use crate::resources::{ResourceError, ResourceHandle, ResourceKind};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Rejects new orchestration calls once shutdown has begun.
///
/// Cloning shares the flag; closing is one-way.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGate {
    closed: Arc<AtomicBool>,
}

impl ShutdownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the gate. Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `Err(ShuttingDown)` once the gate is closed.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.is_closed() {
            Err(ServiceError::ShuttingDown)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{kind} ({name}) failed to connect: {source}")]
    Connect {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ResourceError,
    },

    #[error("{kind} ({name}) failed its health probe: {source}")]
    Probe {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ResourceError,
    },

    #[error("resources did not become ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("resources were already started or stopped")]
    AlreadyStarted,

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownFailure {
    pub kind: ResourceKind,
    pub name: String,
    pub reason: String,
}

/// Outcome of [`LifecycleManager::stop_all`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub closed: Vec<ResourceKind>,
    pub failures: Vec<ShutdownFailure>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Registered,
    Starting,
    Running,
    Stopped,
}

struct Managed {
    handle: Arc<dyn ResourceHandle>,
    healthy: AtomicBool,
}

/// Starts and stops the backing resources as one unit.
///
/// Startup is all-or-nothing: every handle is connected and probed
/// concurrently, and if any of them fails (or the startup timeout passes) all
/// of them are closed again before the error is returned. Shutdown closes every
/// handle concurrently under one deadline and collects failures instead of
/// stopping at the first. Both directions run at most once.
pub struct LifecycleManager {
    resources: Vec<Managed>,
    gate: ShutdownGate,
    startup_timeout: Duration,
    phase: Mutex<Phase>,
}

impl LifecycleManager {
    pub fn new(startup_timeout: Duration) -> Self {
        Self {
            resources: Vec::new(),
            gate: ShutdownGate::new(),
            startup_timeout,
            phase: Mutex::new(Phase::Registered),
        }
    }

    pub fn register(&mut self, handle: Arc<dyn ResourceHandle>) {
        self.resources.push(Managed {
            handle,
            healthy: AtomicBool::new(false),
        });
    }

    pub fn with_resource(mut self, handle: Arc<dyn ResourceHandle>) -> Self {
        self.register(handle);
        self
    }

    pub fn gate(&self) -> ShutdownGate {
        self.gate.clone()
    }

    /// Health of every registered handle, in registration order.
    pub fn health(&self) -> Vec<(ResourceKind, bool)> {
        self.resources
            .iter()
            .map(|m| (m.handle.kind(), m.healthy.load(Ordering::SeqCst)))
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.resources.iter().all(|m| m.healthy.load(Ordering::SeqCst))
    }

    pub async fn start_all(&self) -> Result<(), LifecycleError> {
        let mut phase = self.phase.lock().await;
        if *phase != Phase::Registered {
            return Err(LifecycleError::AlreadyStarted);
        }
        *phase = Phase::Starting;

        info!(resources = self.resources.len(), "Starting resources");
        let outcome = match tokio::time::timeout(self.startup_timeout, self.connect_and_probe()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(LifecycleError::StartupTimeout(self.startup_timeout)),
        };

        match outcome {
            Ok(()) => {
                *phase = Phase::Running;
                info!("All resources ready");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Startup failed, closing every resource");
                self.gate.close();
                *phase = Phase::Stopped;
                let report = self.close_all(Instant::now() + self.startup_timeout).await;
                if !report.is_clean() {
                    warn!(failures = report.failures.len(), "Some resources failed to close after aborted startup");
                }
                Err(e)
            }
        }
    }

    async fn connect_and_probe(&self) -> Result<(), LifecycleError> {
        let results = join_all(self.resources.iter().map(|managed| async move {
            let handle = &managed.handle;
            let (kind, name) = (handle.kind(), handle.name());

            handle.connect().await.map_err(|source| LifecycleError::Connect {
                kind,
                name: name.clone(),
                source,
            })?;
            info!(%kind, name = %name, "Connected");

            handle.health_probe().await.map_err(|source| LifecycleError::Probe {
                kind,
                name: name.clone(),
                source,
            })?;
            managed.healthy.store(true, Ordering::SeqCst);
            info!(%kind, name = %name, "Health probe passed");
            Ok::<(), LifecycleError>(())
        }))
        .await;

        let mut first = None;
        for result in results {
            if let Err(e) = result {
                warn!(error = %e, "Resource failed to start");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Closes the gate, then closes every handle before `deadline`.
    ///
    /// Calling this again returns an empty report.
    pub async fn stop_all(&self, deadline: Instant) -> ShutdownReport {
        self.gate.close();
        {
            let mut phase = self.phase.lock().await;
            if *phase == Phase::Stopped {
                return ShutdownReport::default();
            }
            *phase = Phase::Stopped;
        }

        info!(resources = self.resources.len(), "Stopping resources");
        let report = self.close_all(deadline).await;
        if report.is_clean() {
            info!(closed = report.closed.len(), "All resources closed");
        } else {
            warn!(
                closed = report.closed.len(),
                failed = report.failures.len(),
                "Shutdown finished with failures"
            );
        }
        report
    }

    async fn close_all(&self, deadline: Instant) -> ShutdownReport {
        let results = join_all(self.resources.iter().map(|managed| async move {
            let handle = &managed.handle;
            managed.healthy.store(false, Ordering::SeqCst);
            let outcome = tokio::time::timeout_at(deadline, handle.close()).await;
            (handle.kind(), handle.name(), outcome)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (kind, name, outcome) in results {
            let reason = match outcome {
                Ok(Ok(())) => {
                    report.closed.push(kind);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "did not close before the shutdown deadline".to_string(),
            };
            warn!(%kind, name = %name, reason = %reason, "Resource failed to close");
            report.failures.push(ShutdownFailure { kind, name, reason });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_closes_once() {
        let gate = ShutdownGate::new();
        let shared = gate.clone();
        assert!(gate.check().is_ok());

        assert!(shared.close());
        assert!(!gate.close());
        assert!(matches!(gate.check(), Err(ServiceError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_stop_without_resources_is_clean_and_idempotent() {
        let manager = LifecycleManager::new(Duration::from_secs(1));
        manager.start_all().await.unwrap();
        assert!(matches!(manager.start_all().await, Err(LifecycleError::AlreadyStarted)));

        let deadline = Instant::now() + Duration::from_secs(1);
        assert!(manager.stop_all(deadline).await.is_clean());
        assert!(manager.gate().is_closed());
        assert!(manager.stop_all(deadline).await.closed.is_empty());
    }
}
