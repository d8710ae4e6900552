//! Bounded connection pool.
//!
//! Connections are created lazily up to `max_size`, handed out one caller at
//! a time, and kept idle for reuse on release. Acquiring when every slot is
//! taken fails with [`PoolError::Exhausted`] rather than waiting.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::PoolError;

// == Connection Manager ==
/// Creates and tears down the pooled connections.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    type Connection: Send;

    async fn connect(&self) -> Result<Self::Connection, PoolError>;

    async fn close(&self, conn: Self::Connection);
}

struct PoolState<C> {
    idle: Vec<(u64, C)>,
    in_use: HashSet<u64>,
    next_id: u64,
    destroyed: bool,
}

type SharedState<C> = Arc<Mutex<PoolState<C>>>;

fn lock<C>(state: &Mutex<PoolState<C>>) -> MutexGuard<'_, PoolState<C>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Pooled Connection ==
/// A connection checked out of a [`ConnectionPool`].
///
/// Hand it back with [`ConnectionPool::release`]. A handle dropped without
/// being released (say, by a cancelled request) goes straight back to the
/// idle set; after [`ConnectionPool::destroy`] it is dropped unclosed.
pub struct PooledConnection<C> {
    id: u64,
    conn: Option<C>,
    pool: Weak<Mutex<PoolState<C>>>,
}

impl<C> PooledConnection<C> {
    /// Identity of the underlying connection, stable across reuse.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").field("id", &self.id).finish()
    }
}

impl<C> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let (Some(conn), Some(pool)) = (self.conn.take(), self.pool.upgrade()) else {
            return;
        };
        let mut state = lock(&pool);
        if state.in_use.remove(&self.id) && !state.destroyed {
            debug!("Reclaimed unreleased connection {}", self.id);
            state.idle.push((self.id, conn));
        }
    }
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub max_size: usize,
}

// == Connection Pool ==
pub struct ConnectionPool<M: ConnectionManager> {
    manager: M,
    max_size: usize,
    state: SharedState<M::Connection>,
}

impl<M: ConnectionManager> ConnectionPool<M> {
    pub fn new(manager: M, max_size: usize) -> Self {
        Self {
            manager,
            max_size: max_size.max(1),
            state: Arc::new(Mutex::new(PoolState {
                idle: Vec::new(),
                in_use: HashSet::new(),
                next_id: 0,
                destroyed: false,
            })),
        }
    }

    fn handle(&self, id: u64, conn: M::Connection) -> PooledConnection<M::Connection> {
        PooledConnection {
            id,
            conn: Some(conn),
            pool: Arc::downgrade(&self.state),
        }
    }

    /// Checks out an idle connection, or opens a new one if below
    /// `max_size`.
    pub async fn acquire(&self) -> Result<PooledConnection<M::Connection>, PoolError> {
        let id = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return Err(PoolError::Destroyed);
            }
            if let Some((id, conn)) = state.idle.pop() {
                state.in_use.insert(id);
                drop(state);
                return Ok(self.handle(id, conn));
            }
            if state.in_use.len() >= self.max_size {
                return Err(PoolError::Exhausted {
                    max_size: self.max_size,
                });
            }
            // Reserve the slot before connecting so concurrent acquires
            // cannot overshoot
            let id = state.next_id;
            state.next_id += 1;
            state.in_use.insert(id);
            id
        };

        match self.manager.connect().await {
            Ok(conn) => {
                debug!("Opened pooled connection {}", id);
                Ok(self.handle(id, conn))
            }
            Err(e) => {
                lock(&self.state).in_use.remove(&id);
                Err(e)
            }
        }
    }

    /// Returns a connection to the pool. Connections released after
    /// [`ConnectionPool::destroy`] are closed instead.
    pub async fn release(&self, mut handle: PooledConnection<M::Connection>) {
        let id = handle.id;
        let Some(conn) = handle.conn.take() else {
            return;
        };
        drop(handle);

        let to_close = {
            let mut state = lock(&self.state);
            let tracked = state.in_use.remove(&id);
            if tracked && !state.destroyed && state.idle.len() < self.max_size {
                state.idle.push((id, conn));
                None
            } else {
                Some(conn)
            }
        };

        if let Some(conn) = to_close {
            debug!("Closing pooled connection {}", id);
            self.manager.close(conn).await;
        }
    }

    /// Closes every idle connection and refuses further acquires.
    pub async fn destroy(&self) {
        let idle = {
            let mut state = lock(&self.state);
            state.destroyed = true;
            std::mem::take(&mut state.idle)
        };

        for (_, conn) in idle {
            self.manager.close(conn).await;
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = lock(&self.state);
        PoolStatus {
            idle: state.idle.len(),
            in_use: state.in_use.len(),
            max_size: self.max_size,
        }
    }
}
