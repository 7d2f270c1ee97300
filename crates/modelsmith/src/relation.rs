//! Lazy relationship cells.
//!
//! Each singular relationship field on an instance owns one [`RelationCell`]
//! holding the foreign-key value and the cache state for the related
//! instance. The cell starts unresolved; the first read through a session
//! resolves it and caches the result, and every later read returns the same
//! `Arc` without touching the store. Assigning a related instance (or
//! rewriting the foreign key when hydrating from a row) drops the cache back
//! to unresolved.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use modelsmith_core::{Result, Value};

use crate::instance::Instance;

/// Cache state for one relationship cell.
#[derive(Debug, Clone)]
enum CellState {
    /// Never resolved, or invalidated by a foreign-key rewrite. The next
    /// read goes through the store.
    Unresolved,
    /// Resolved. `None` records a definitive "no related row" answer; it is
    /// cached the same way a hit is.
    Cached(Option<Arc<Instance>>),
}

#[derive(Debug)]
struct CellInner {
    fk: Value,
    state: CellState,
}

/// One relationship slot: the foreign-key value plus the lazily resolved
/// related instance. The fk and the cache state always change together under
/// one lock.
pub struct RelationCell {
    inner: Mutex<CellInner>,
}

impl RelationCell {
    /// A cell that has never been resolved, carrying the given foreign key.
    #[must_use]
    pub fn unresolved(fk: Value) -> Self {
        Self {
            inner: Mutex::new(CellInner {
                fk,
                state: CellState::Unresolved,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Assign a related instance (or clear the slot with `None`).
    ///
    /// The foreign key is taken from the related instance's primary key;
    /// an unsaved instance contributes a null foreign key until save time,
    /// when keys are re-derived. The assignment itself becomes the cached
    /// answer, so a later read returns exactly this `Arc`.
    pub fn assign(&self, related: Option<Arc<Instance>>) {
        let mut inner = self.lock();
        inner.fk = related.as_ref().map_or(Value::Null, |r| r.primary_key());
        inner.state = CellState::Cached(related);
    }

    /// Rewrite the foreign key directly, dropping any cached answer.
    pub fn set_fk(&self, fk: Value) {
        let mut inner = self.lock();
        inner.fk = fk;
        inner.state = CellState::Unresolved;
    }

    /// The current foreign-key value.
    #[must_use]
    pub fn fk(&self) -> Value {
        self.lock().fk.clone()
    }

    /// Re-derive the foreign key from the cached related instance.
    ///
    /// Called at save time so that a related instance saved after it was
    /// assigned still contributes its primary key. An unresolved cell keeps
    /// whatever key it already carries.
    pub fn rederive_fk(&self) {
        let mut inner = self.lock();
        match &inner.state {
            CellState::Cached(Some(related)) => inner.fk = related.primary_key(),
            CellState::Cached(None) => inner.fk = Value::Null,
            CellState::Unresolved => {}
        }
    }

    /// The cached related instance, without resolving. `None` when the cell
    /// is unresolved or cached a "no related row" answer.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<Instance>> {
        match &self.lock().state {
            CellState::Cached(related) => related.clone(),
            CellState::Unresolved => None,
        }
    }

    /// Resolve the cell, loading through `load` at most once.
    ///
    /// A cached answer (including a cached `None`) is returned as-is. A null
    /// foreign key resolves to `None` immediately with no load. A load error
    /// leaves the cell unresolved so a later read retries.
    pub fn resolve_with(
        &self,
        load: impl FnOnce(&Value) -> Result<Option<Instance>>,
    ) -> Result<Option<Arc<Instance>>> {
        let fk = {
            let inner = self.lock();
            match &inner.state {
                CellState::Cached(related) => return Ok(related.clone()),
                CellState::Unresolved => inner.fk.clone(),
            }
        };
        // The lock is released across the load so the loader may touch
        // other cells on the same instance.
        if fk.is_null() {
            let mut inner = self.lock();
            if let CellState::Cached(related) = &inner.state {
                return Ok(related.clone());
            }
            inner.state = CellState::Cached(None);
            return Ok(None);
        }
        let related = load(&fk)?.map(Arc::new);
        let mut inner = self.lock();
        if let CellState::Cached(existing) = &inner.state {
            return Ok(existing.clone());
        }
        inner.state = CellState::Cached(related.clone());
        Ok(related)
    }
}

impl Clone for RelationCell {
    fn clone(&self) -> Self {
        let inner = self.lock();
        Self {
            inner: Mutex::new(CellInner {
                fk: inner.fk.clone(),
                state: inner.state.clone(),
            }),
        }
    }
}

impl fmt::Debug for RelationCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        let state = match &inner.state {
            CellState::Unresolved => "unresolved",
            CellState::Cached(Some(_)) => "cached",
            CellState::Cached(None) => "cached-none",
        };
        f.debug_struct("RelationCell")
            .field("fk", &inner.fk)
            .field("state", &state)
            .finish()
    }
}
