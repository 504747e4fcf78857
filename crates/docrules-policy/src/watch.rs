//! Hot reload of a policy definition file.
//!
//! The watcher observes the directory containing the definition (editors often
//! replace files instead of writing in place), debounces bursts of events, and
//! reloads the [`PolicyStore`] whenever the definition file changes. A reload
//! that fails is logged and counted; the previous rules stay active.
//!
//! # Example
//!
//! ```ignore
//! use docrules_policy::watch::PolicyFileWatcher;
//!
//! let watcher = PolicyFileWatcher::new(store.clone(), "policies/app.rules.json")
//!     .with_debounce(Duration::from_millis(200));
//! watcher.reload_now()?;
//!
//! let mut outcomes = watcher.subscribe();
//! let handle = watcher.start()?;
//! while let Ok(outcome) = outcomes.recv().await { /* ... */ }
//! handle.stop().await;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::ConfigError;
use crate::loader::reload_from_file;
use crate::store::PolicyStore;

/// Default quiet period before a burst of file events triggers a reload.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Interval at which the watcher task drains file events.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Errors
// =============================================================================

/// Errors starting the watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The file system watcher could not be created or attached.
    #[error("Failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The path has no file name to match events against.
    #[error("Not a file path: {0}")]
    NotAFile(PathBuf),
}

// =============================================================================
// Reload Statistics
// =============================================================================

/// Counters of the watcher's reload attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
    /// Total number of reload attempts.
    pub attempts: u64,
    /// Number of successful reloads.
    pub successes: u64,
    /// Number of rejected reloads.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct ReloadCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl ReloadCounters {
    fn snapshot(&self) -> ReloadStats {
        ReloadStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Result of one reload, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The definition was loaded and is now active.
    Reloaded { version: u64 },
    /// The definition was rejected; the previous rules stay active.
    Rejected { error: String },
}

// =============================================================================
// Watcher
// =============================================================================

/// Reloads a [`PolicyStore`] from a definition file when the file changes.
#[derive(Debug, Clone)]
pub struct PolicyFileWatcher {
    store: Arc<PolicyStore>,
    path: PathBuf,
    debounce: Duration,
    counters: Arc<ReloadCounters>,
    outcomes: broadcast::Sender<ReloadOutcome>,
}

impl PolicyFileWatcher {
    #[must_use]
    pub fn new(store: Arc<PolicyStore>, path: impl Into<PathBuf>) -> Self {
        let (outcomes, _) = broadcast::channel(16);
        Self {
            store,
            path: path.into(),
            debounce: DEFAULT_DEBOUNCE,
            counters: Arc::new(ReloadCounters::default()),
            outcomes,
        }
    }

    /// Set the debounce duration.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn stats(&self) -> ReloadStats {
        self.counters.snapshot()
    }

    /// Receive the outcome of every subsequent reload.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadOutcome> {
        self.outcomes.subscribe()
    }

    /// Reload the definition file immediately.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] that rejected the file; the store keeps its
    /// previous rules.
    pub fn reload_now(&self) -> Result<(), ConfigError> {
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);

        match reload_from_file(&self.store, &self.path) {
            Ok(()) => {
                self.counters.successes.fetch_add(1, Ordering::Relaxed);
                let version = self.store.version();
                info!(path = %self.path.display(), version, "Policy file reloaded");
                // No subscribers is fine.
                let _ = self.outcomes.send(ReloadOutcome::Reloaded { version });
                Ok(())
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "Policy file reload failed, keeping active rules"
                );
                let _ = self.outcomes.send(ReloadOutcome::Rejected {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Start watching in a background task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the file system watcher cannot be set up.
    pub fn start(&self) -> Result<WatchHandle, WatchError> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| WatchError::NotAFile(self.path.clone()))?;

        // Watch the parent directory so replaced files are picked up too.
        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut debouncer =
            new_debouncer(self.debounce, notify_tx).map_err(|source| WatchError::Notify {
                path: watch_dir.clone(),
                source,
            })?;
        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                path: watch_dir.clone(),
                source,
            })?;

        info!(path = %self.path.display(), "Started watching policy file");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let watcher = self.clone();

        let handle = tokio::spawn(async move {
            // Dropping the debouncer stops the OS watcher.
            let _debouncer = debouncer;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Policy file watcher shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(POLL_INTERVAL) => {
                        let mut changed = false;
                        while let Ok(events) = notify_rx.try_recv() {
                            match events {
                                Ok(events) => {
                                    changed |= events
                                        .iter()
                                        .any(|event| event.path.file_name() == Some(file_name.as_os_str()));
                                }
                                Err(e) => warn!("Policy file watcher error: {e:?}"),
                            }
                        }

                        if changed {
                            debug!(path = %watcher.path.display(), "Policy file changed");
                            // Failures are logged and counted by reload_now.
                            let _ = watcher.reload_now();
                        }
                    }
                }
            }
        });

        Ok(WatchHandle {
            handle,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle to a running watcher task.
#[derive(Debug)]
pub struct WatchHandle {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

// =============================================================================
// Tests
// =============================================================================
