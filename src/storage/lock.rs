// Per-database reader/writer locks held across a command's execution window

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One `RwLock` per logical database.
///
/// The lock guards no data of its own; it orders whole commands against each
/// other while the storage engine keeps its own fine-grained locking.
pub struct DbLocks {
    locks: Vec<RwLock<()>>,
}

/// Held for the duration of one command
pub enum DbGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
    /// Exclusive hold on every database, taken in index order
    All(Vec<RwLockWriteGuard<'a, ()>>),
}

impl DbGuard<'_> {
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, DbGuard::Shared(_))
    }
}

impl DbLocks {
    pub fn new(num_dbs: usize) -> Self {
        Self {
            locks: (0..num_dbs).map(|_| RwLock::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Shared access to `db`, `None` for an unknown index
    pub fn lock_shared(&self, db: usize) -> Option<DbGuard<'_>> {
        let lock = self.locks.get(db)?;
        // A command that panicked must not wedge the database
        Some(DbGuard::Shared(lock.read().unwrap_or_else(PoisonError::into_inner)))
    }

    pub fn lock_exclusive(&self, db: usize) -> Option<DbGuard<'_>> {
        let lock = self.locks.get(db)?;
        Some(DbGuard::Exclusive(
            lock.write().unwrap_or_else(PoisonError::into_inner),
        ))
    }

    /// Exclusive access to every database
    pub fn lock_all(&self) -> DbGuard<'_> {
        DbGuard::All(
            self.locks
                .iter()
                .map(|lock| lock.write().unwrap_or_else(PoisonError::into_inner))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_shared_holders_coexist() {
        let locks = DbLocks::new(2);
        let a = locks.lock_shared(0).unwrap();
        let b = locks.lock_shared(0).unwrap();
        assert!(!a.is_exclusive());
        assert!(!b.is_exclusive());
        // Different database is independent
        let c = locks.lock_exclusive(1).unwrap();
        assert!(c.is_exclusive());
    }

    #[test]
    fn test_unknown_database() {
        let locks = DbLocks::new(1);
        assert!(locks.lock_shared(3).is_none());
        assert!(locks.lock_exclusive(3).is_none());
    }

    #[test]
    fn test_exclusive_waits_for_shared() {
        let locks = Arc::new(DbLocks::new(1));
        let acquired = Arc::new(AtomicBool::new(false));

        let shared = locks.lock_shared(0).unwrap();

        let handle = {
            let locks = Arc::clone(&locks);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _guard = locks.lock_exclusive(0).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(shared);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_lock_all() {
        let locks = DbLocks::new(4);
        let guard = locks.lock_all();
        assert!(guard.is_exclusive());
        if let DbGuard::All(guards) = &guard {
            assert_eq!(guards.len(), 4);
        } else {
            panic!("Expected all-database guard");
        }
    }
}
