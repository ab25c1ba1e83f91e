//! Bounded connection pool with leased, lazily-connected clients.
//!
//! Capacity is a `Semaphore`; wrapper bookkeeping is a short-lived
//! `std::sync::Mutex` over a FIFO available queue plus the set of leased
//! wrapper ids. The semaphore is always acquired before the lock and never
//! held across it, so a timed-out or cancelled waiter can never wedge the
//! pool. All network I/O (connect, authenticate, QUIT) happens outside the
//! lock.

use std::collections::{HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{PoolConfig, ServerConfig};
use crate::error::NntpError;
use crate::pooled::{Connector, PooledClient, TcpConnector};

pub struct SessionPool {
    inner: Arc<PoolInner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool").finish_non_exhaustive()
    }
}

struct PoolInner {
    server: Arc<ServerConfig>,
    config: PoolConfig,
    connector: Box<dyn Connector>,
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
    next_id: AtomicU64,
    disposed: AtomicBool,
    stop_sweeper: Notify,
}

struct PoolState {
    available: VecDeque<PooledClient>,
    in_use: HashSet<u64>,
}

impl SessionPool {
    /// Create a pool against the real network. Must be called from within a
    /// tokio runtime: construction spawns the idle-eviction sweeper.
    pub fn new(server: ServerConfig, config: PoolConfig) -> Result<Self, NntpError> {
        Self::with_connector(server, config, Box::new(TcpConnector))
    }

    /// Create a pool with an injected connector, for scripted tests.
    pub fn with_connector(
        server: ServerConfig,
        config: PoolConfig,
        connector: Box<dyn Connector>,
    ) -> Result<Self, NntpError> {
        config.validate()?;
        let inner = Arc::new(PoolInner {
            server: Arc::new(server),
            semaphore: Arc::new(Semaphore::new(config.max_size)),
            config,
            connector,
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                in_use: HashSet::new(),
            }),
            next_id: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
            stop_sweeper: Notify::new(),
        });
        let sweeper = spawn_sweeper(Arc::clone(&inner));
        Ok(Self {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Borrow a client, waiting up to `wait_timeout` for a free slot.
    ///
    /// An existing idle wrapper is reused FIFO; otherwise a fresh one is
    /// created, connected and authenticated before the lease is handed out.
    /// A wrapper that fails preparation goes back into the bookkeeping (so
    /// capacity accounting holds) and a [`NntpError::LeaseSetupFailed`]
    /// describes how far it got.
    pub async fn get_lease(&self) -> Result<Lease, NntpError> {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return Err(NntpError::PoolDisposed);
        }

        let permit = match timeout(
            inner.config.wait_timeout,
            Arc::clone(&inner.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(NntpError::PoolDisposed),
            Err(_) => return Err(NntpError::NoClientAvailable(inner.config.wait_timeout)),
        };

        // Pick or create a wrapper under the lock; skip poisoned ones. The
        // disposed flag is re-read here: a shutdown that finished while we
        // waited on the semaphore must not hand out a wrapper it can never
        // reach.
        let (mut wrapper, stale) = {
            let mut state = inner.state();
            if inner.disposed.load(Ordering::SeqCst) {
                return Err(NntpError::PoolDisposed);
            }
            let mut stale = Vec::new();
            let mut picked = None;
            while let Some(candidate) = state.available.pop_front() {
                if candidate.is_errored() || candidate.is_disposed() {
                    stale.push(candidate);
                } else {
                    picked = Some(candidate);
                    break;
                }
            }
            let wrapper = match picked {
                Some(wrapper) => wrapper,
                None => {
                    let live = state.available.len() + state.in_use.len();
                    if live >= inner.config.max_size {
                        return Err(NntpError::CapacityViolated {
                            live,
                            max_size: inner.config.max_size,
                        });
                    }
                    let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                    PooledClient::new(id, Arc::clone(&inner.server))
                }
            };
            state.in_use.insert(wrapper.id());
            (wrapper, stale)
        };

        for mut old in stale {
            debug!(id = old.id(), "dropping poisoned idle client");
            old.dispose().await;
        }

        if let Err(source) = wrapper.prepare(inner.connector.as_ref()).await {
            let err = NntpError::LeaseSetupFailed {
                host: inner.server.host.clone(),
                port: inner.server.port,
                tls: inner.server.use_tls,
                connected: wrapper.is_connected(),
                authenticated: wrapper.is_authenticated(),
                source: Box::new(source),
            };
            let to_dispose = {
                let mut state = inner.state();
                state.in_use.remove(&wrapper.id());
                if inner.disposed.load(Ordering::SeqCst) {
                    Some(wrapper)
                } else {
                    state.available.push_back(wrapper);
                    None
                }
            };
            if let Some(mut wrapper) = to_dispose {
                wrapper.dispose().await;
            }
            return Err(err);
        }

        // Shutdown may have completed while we were connecting; a wrapper
        // created in that window is invisible to its drain, so it is
        // disposed here instead of leased out.
        if inner.disposed.load(Ordering::SeqCst) {
            inner.state().in_use.remove(&wrapper.id());
            wrapper.dispose().await;
            return Err(NntpError::PoolDisposed);
        }

        Ok(Lease {
            pool: Arc::clone(inner),
            wrapper: Some(wrapper),
            permit: Some(permit),
        })
    }

    /// One idle-eviction pass, also run periodically by the sweeper task.
    pub async fn sweep_once(&self) {
        self.inner.sweep_once().await;
    }

    /// Idle wrappers waiting in the queue.
    pub fn available_count(&self) -> usize {
        self.inner.state().available.len()
    }

    /// Wrappers currently out on a lease.
    pub fn in_use_count(&self) -> usize {
        self.inner.state().in_use.len()
    }

    /// Tear the pool down: stop the sweeper, fail all waiters, dispose every
    /// idle client. Outstanding leases keep working; their wrappers are
    /// disposed when returned. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.stop_sweeper.notify_one();
        let handle = self.sweeper.lock().expect("sweeper handle poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.semaphore.close();

        let drained: Vec<PooledClient> = self.inner.state().available.drain(..).collect();
        for mut wrapper in drained {
            wrapper.dispose().await;
        }
        debug!("pool shut down");
    }
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().expect("pool state poisoned")
    }

    async fn sweep_once(&self) {
        let idle_timeout = self.config.idle_timeout;
        let now = tokio::time::Instant::now();
        let expired: Vec<PooledClient> = {
            let mut state = self.state();
            let mut keep = VecDeque::with_capacity(state.available.len());
            let mut expired = Vec::new();
            while let Some(wrapper) = state.available.pop_front() {
                let too_old = now.duration_since(wrapper.last_activity()) >= idle_timeout;
                if too_old || wrapper.is_errored() || wrapper.is_disposed() {
                    expired.push(wrapper);
                } else {
                    keep.push_back(wrapper);
                }
            }
            state.available = keep;
            expired
        };
        for mut wrapper in expired {
            debug!(id = wrapper.id(), "evicting idle client");
            wrapper.dispose().await;
        }
    }

    /// Return a wrapper from a lease. The graceful path can QUIT; the
    /// `Drop` path cannot await and just lets the transport close.
    async fn checkin(&self, wrapper: PooledClient) -> Result<(), NntpError> {
        match self.checkin_decision(wrapper) {
            CheckinOutcome::Requeued => Ok(()),
            CheckinOutcome::Dispose(mut wrapper) => {
                wrapper.dispose().await;
                Ok(())
            }
            CheckinOutcome::Foreign(wrapper) => {
                let id = wrapper.id();
                drop(wrapper);
                Err(NntpError::ForeignRelease(id))
            }
        }
    }

    fn checkin_sync(&self, wrapper: PooledClient) {
        match self.checkin_decision(wrapper) {
            CheckinOutcome::Requeued => {}
            CheckinOutcome::Dispose(wrapper) => drop(wrapper),
            CheckinOutcome::Foreign(wrapper) => {
                warn!(id = wrapper.id(), "released client was not leased from this pool");
            }
        }
    }

    fn checkin_decision(&self, mut wrapper: PooledClient) -> CheckinOutcome {
        let pool_disposed = self.disposed.load(Ordering::SeqCst);
        let mut state = self.state();
        if !state.in_use.remove(&wrapper.id()) {
            return CheckinOutcome::Foreign(wrapper);
        }
        if pool_disposed || wrapper.is_errored() || wrapper.is_disposed() {
            return CheckinOutcome::Dispose(wrapper);
        }
        wrapper.touch();
        state.available.push_back(wrapper);
        CheckinOutcome::Requeued
    }
}

enum CheckinOutcome {
    Requeued,
    Dispose(PooledClient),
    Foreign(PooledClient),
}

fn spawn_sweeper(inner: Arc<PoolInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner.config.monitor_interval);
        ticker.tick().await; // the first tick completes immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => inner.sweep_once().await,
                _ = inner.stop_sweeper.notified() => break,
            }
        }
    })
}

/// A one-shot handle to a pooled client.
///
/// Dereferences to [`PooledClient`]. Returning happens exactly once: either
/// through [`Lease::release`], which can say goodbye gracefully and report
/// bookkeeping errors, or through `Drop`, which returns the wrapper
/// silently. Ownership makes double release unrepresentable.
pub struct Lease {
    pool: Arc<PoolInner>,
    wrapper: Option<PooledClient>,
    permit: Option<OwnedSemaphorePermit>,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("held", &self.wrapper.is_some())
            .finish_non_exhaustive()
    }
}

impl Lease {
    /// Give the client back. An errored wrapper is disposed instead of
    /// re-queued; a healthy one rejoins the FIFO queue.
    pub async fn release(mut self) -> Result<(), NntpError> {
        let wrapper = match self.wrapper.take() {
            Some(wrapper) => wrapper,
            None => return Ok(()),
        };
        let permit = self.permit.take();
        let result = self.pool.checkin(wrapper).await;
        drop(permit);
        result
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(wrapper) = self.wrapper.take() {
            self.pool.checkin_sync(wrapper);
        }
    }
}

impl Deref for Lease {
    type Target = PooledClient;

    fn deref(&self) -> &PooledClient {
        self.wrapper.as_ref().expect("lease already released")
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut PooledClient {
        self.wrapper.as_mut().expect("lease already released")
    }
}
