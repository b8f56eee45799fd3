use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connection::DccConnection;

/// Live client sessions, shared by the accept loop, reader threads and the
/// link pump.
pub struct SessionTable<S> {
    inner: Mutex<Vec<Arc<DccConnection<S>>>>,
}

impl<S> SessionTable<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, conn: Arc<DccConnection<S>>) {
        self.lock().push(conn);
    }

    /// Remove a session. Only the first caller for a given id gets it back.
    pub fn remove(&self, id: u64) -> Option<Arc<DccConnection<S>>> {
        let mut sessions = self.lock();
        let pos = sessions.iter().position(|conn| conn.id() == id)?;
        Some(sessions.swap_remove(pos))
    }

    /// Clone the current session list so callers can do I/O without the lock.
    pub fn snapshot(&self) -> Vec<Arc<DccConnection<S>>> {
        self.lock().clone()
    }

    /// Take every session out of the table.
    pub fn drain(&self) -> Vec<Arc<DccConnection<S>>> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<DccConnection<S>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Default for SessionTable<S> {
    fn default() -> Self {
        Self::new()
    }
}
