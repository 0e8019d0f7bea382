//! A lazy, bounded connection pool that releases waiters in arrival order.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};

use rusqlite::Connection;
use tracing::*;

use crate::error::Result;

type Factory = dyn Fn() -> Result<Connection> + Send + Sync;

struct State {
    available: Vec<Connection>,
    constructed: usize,
    /// Tickets of blocked acquirers, front is next to be served.
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

struct Inner {
    capacity: usize,
    factory: Box<Factory>,
    state: Mutex<State>,
    returned: Condvar,
}

/// Hands out up to `capacity` connections, constructing them on demand.
/// Once all are out, `acquire()` blocks; blocked callers are served FIFO.
///
/// Cloning the pool clones a handle; all clones share the connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

impl ConnectionPool {
    pub fn new<F: Fn() -> Result<Connection> + Send + Sync + 'static>(
        capacity: usize,
        factory: F,
    ) -> Self {
        assert!(capacity > 0);
        trace!("Connection pool created with capacity of {capacity}");
        Self {
            inner: Arc::new(Inner {
                capacity,
                factory: Box::new(factory),
                state: Mutex::new(State {
                    available: Vec::new(),
                    constructed: 0,
                    waiters: VecDeque::new(),
                    next_ticket: 0,
                }),
                returned: Condvar::new(),
            }),
        }
    }

    pub fn acquire(&self) -> Result<PooledConnection> {
        let inner = &self.inner;
        let mut state = inner.state.lock().unwrap();

        // Free connection and nobody queued ahead of us
        if state.waiters.is_empty() && !state.available.is_empty() {
            trace!("Pool immediate acquire");
            let conn = state.available.pop().unwrap();
            return Ok(self.wrap(conn));
        }

        // Room to construct another
        if state.constructed < inner.capacity {
            trace!("Pool factory acquire");
            state.constructed += 1;
            drop(state);
            match (inner.factory)() {
                Ok(conn) => return Ok(self.wrap(conn)),
                Err(e) => {
                    inner.state.lock().unwrap().constructed -= 1;
                    return Err(e);
                }
            }
        }

        // Wait our turn
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);
        trace!("Pool waiting for a returned connection");
        let mut state = inner
            .returned
            .wait_while(state, |s| {
                s.available.is_empty() || s.waiters.front() != Some(&ticket)
            })
            .unwrap();
        state.waiters.pop_front();
        let conn = state.available.pop().unwrap();
        // The next waiter in line may also have a connection ready.
        inner.returned.notify_all();
        Ok(self.wrap(conn))
    }

    /// How many acquirers are currently blocked.
    pub fn wait_count(&self) -> usize {
        self.inner.state.lock().unwrap().waiters.len()
    }

    fn wrap(&self, conn: Connection) -> PooledConnection {
        PooledConnection {
            pool: self.inner.clone(),
            conn: Some(conn),
        }
    }
}

impl Inner {
    fn put_back(&self, conn: Connection) {
        let mut state = self.state.lock().unwrap();
        trace!("Pool had a connection returned");
        state.available.push(conn);
        self.returned.notify_all();
    }
}

/// A borrowed connection; returns itself to the pool on drop.
pub struct PooledConnection {
    pool: Arc<Inner>,
    conn: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().unwrap()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn memory_pool(capacity: usize) -> ConnectionPool {
        ConnectionPool::new(capacity, || Ok(Connection::open_in_memory()?))
    }

    #[test]
    fn constructs_lazily_up_to_capacity() -> Result<()> {
        let pool = memory_pool(2);
        let a = pool.acquire()?;
        let b = pool.acquire()?;
        assert_eq!(pool.wait_count(), 0);
        drop(a);
        drop(b);
        // Both live in the pool now; a third acquire reuses one.
        let _c = pool.acquire()?;
        Ok(())
    }

    #[test]
    fn blocks_at_capacity_and_serves_waiters_in_order() -> Result<()> {
        let pool = memory_pool(1);
        let held = pool.acquire()?;

        let (tx, rx) = mpsc::channel();
        let mut workers = Vec::new();
        for tag in 0..3usize {
            let worker_pool = pool.clone();
            let tx = tx.clone();
            workers.push(thread::spawn(move || {
                let conn = worker_pool.acquire().unwrap();
                tx.send(tag).unwrap();
                drop(conn);
            }));
            // Give each thread time to enqueue so arrival order is known.
            while pool.wait_count() <= tag {
                thread::sleep(Duration::from_millis(5));
            }
        }
        assert_eq!(pool.wait_count(), 3);

        drop(held);
        let order: Vec<usize> = (0..3).map(|_| rx.recv().unwrap()).collect();
        assert_eq!(order, [0, 1, 2]);
        for w in workers {
            w.join().unwrap();
        }
        Ok(())
    }
}
