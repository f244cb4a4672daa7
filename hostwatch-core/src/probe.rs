//! Deadline-bounded execution of blocking probes.
//!
//! A probe is one blocking system call against one resource, such as
//! `statvfs(2)` on a mount point. On a hung network or FUSE mount that call
//! can block for minutes, and it cannot be interrupted. The executor runs each
//! probe on a blocking worker and stops waiting once the deadline passes.
//! The worker itself keeps running until the kernel lets the call return.
//!
//! ```text
//!  targets ──> [permit: W per run] ──> spawn_blocking(probe) ──> result
//!                     │                         │
//!          no permit within T             running longer than T
//!                     │                         │
//!                  Skipped              Timeout (worker abandoned)
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A resource to probe: one mount point and the attributes reported with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    /// Mount source (e.g. `/dev/sda1`, `server:/export`).
    pub device: String,
    /// Mount point; also the resource identifier used for quarantine.
    pub mount_point: String,
    /// Filesystem type (e.g. `ext4`, `nfs4`).
    pub fs_type: String,
    /// Per-mount options (e.g. `rw`, `noatime`).
    pub options: Vec<String>,
}

impl ProbeTarget {
    pub fn new(
        device: impl Into<String>,
        mount_point: impl Into<String>,
        fs_type: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            mount_point: mount_point.into(),
            fs_type: fs_type.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Identifier used by the quarantine registry.
    pub fn id(&self) -> &str {
        &self.mount_point
    }

    /// True when the mount carries the `ro` option.
    pub fn is_read_only(&self) -> bool {
        self.options.iter().any(|o| o == "ro")
    }
}

/// A blocking query executed once per target.
pub trait Probe: Send + Sync + 'static {
    /// Statistics returned by a successful probe.
    type Output: Send + 'static;

    /// Run the query. May block for an unbounded amount of time.
    fn probe(&self, target: &ProbeTarget) -> io::Result<Self::Output>;
}

/// Why a probe produced no statistics.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The system call itself failed (permission denied, stale handle, ...).
    #[error("probe failed: {0}")]
    Io(#[from] io::Error),

    /// The worker running the probe panicked or was shut down.
    #[error("probe worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for ProbeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

/// Outcome of probing one target.
#[derive(Debug)]
pub enum ProbeResult<T> {
    Success(T),
    /// The probe ran for the whole deadline without returning; the worker
    /// may still be running.
    Timeout,
    /// No worker became free within the deadline, so the probe never ran.
    Skipped,
    Error(ProbeError),
}

impl<T> ProbeResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeResult::Timeout)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProbeResult::Skipped)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProbeResult::Error(_))
    }
}

/// Runs a [`Probe`] over many targets with bounded concurrency and a
/// per-target deadline.
///
/// Every call to [`run`](Self::run) gets its own pool of `workers` permits.
/// A permit stays with its worker until the blocking call returns, so hung
/// probes from an earlier run never eat into the capacity of a later one.
///
/// A target must obtain a permit within one timeout of the run starting,
/// otherwise it is reported as [`ProbeResult::Skipped`]. Once running, it
/// has a full timeout of its own, evaluated independently of its siblings.
/// A run therefore ends within one timeout when no target waits for a
/// worker, and within two in the worst case.
pub struct ProbeExecutor<P: Probe> {
    probe: Arc<P>,
    workers: usize,
    timeout: Duration,
}

impl<P: Probe> ProbeExecutor<P> {
    /// Create an executor. A worker count of zero is raised to one.
    pub fn new(probe: P, workers: usize, timeout: Duration) -> Self {
        Self::from_shared(Arc::new(probe), workers, timeout)
    }

    /// Create an executor around a probe that is also held elsewhere.
    pub fn from_shared(probe: Arc<P>, workers: usize, timeout: Duration) -> Self {
        Self {
            probe,
            workers: workers.max(1),
            timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe all targets, returning exactly one result per target in input
    /// order.
    ///
    /// Probe failures never escape as errors: they are reported as
    /// [`ProbeResult::Error`] next to their target.
    pub async fn run(
        &self,
        targets: Vec<ProbeTarget>,
    ) -> Vec<(ProbeTarget, ProbeResult<P::Output>)> {
        let permits = Arc::new(Semaphore::new(self.workers));
        let dispatch_by = Instant::now() + self.timeout;

        let pending: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let probe = Arc::clone(&self.probe);
                let permits = Arc::clone(&permits);
                let timeout = self.timeout;
                let job = target.clone();

                let handle = tokio::spawn(async move {
                    let permit =
                        match tokio::time::timeout_at(dispatch_by, permits.acquire_owned()).await {
                            Ok(Ok(permit)) => permit,
                            Ok(Err(e)) => return ProbeResult::Error(ProbeError::Worker(e.to_string())),
                            Err(_) => return ProbeResult::Skipped,
                        };

                    let worker = tokio::task::spawn_blocking(move || {
                        // Released when the call returns, not when the caller gives up.
                        let _permit = permit;
                        probe.probe(&job)
                    });

                    match tokio::time::timeout(timeout, worker).await {
                        Ok(Ok(Ok(output))) => ProbeResult::Success(output),
                        Ok(Ok(Err(err))) => ProbeResult::Error(err.into()),
                        Ok(Err(err)) => ProbeResult::Error(err.into()),
                        Err(_) => ProbeResult::Timeout,
                    }
                });

                (target, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for (target, handle) in pending {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => ProbeResult::Error(err.into()),
            };

            match &result {
                ProbeResult::Timeout => warn!(
                    mount = %target.mount_point,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out, abandoning worker"
                ),
                ProbeResult::Skipped => warn!(
                    mount = %target.mount_point,
                    workers = self.workers,
                    "No probe worker free before the deadline, skipping"
                ),
                ProbeResult::Error(err) => debug!(
                    mount = %target.mount_point,
                    error = %err,
                    "Probe failed"
                ),
                ProbeResult::Success(_) => {}
            }

            results.push((target, result));
        }

        results
    }
}
