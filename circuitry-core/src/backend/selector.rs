//! Process-wide choice of backend.
//!
//! Compilation scopes hold a [`BackendHandle`] for their whole lifetime.
//! Switching backends is refused while any handle is alive, so a scope never
//! observes a backend change midway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use super::{Backend, BackendKind, OptimizationLevel};
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

static GLOBAL_SELECTOR: Lazy<BackendSelector> =
    Lazy::new(|| BackendSelector::new(BackendKind::default()));

#[derive(Debug)]
struct SelectorState {
    current: RwLock<BackendKind>,
    active: AtomicUsize,
}

#[derive(Clone, Debug)]
pub struct BackendSelector {
    state: Arc<SelectorState>,
}

impl BackendSelector {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            state: Arc::new(SelectorState {
                current: RwLock::new(kind),
                active: AtomicUsize::new(0),
            }),
        }
    }

    pub fn global() -> &'static BackendSelector {
        &GLOBAL_SELECTOR
    }

    pub fn current(&self) -> BackendKind {
        *self
            .state
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active_compilations(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Registers a compilation against the current backend. The registration
    /// is released when the handle is dropped.
    pub fn handle(&self) -> BackendHandle {
        let current = self
            .state
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.state.active.fetch_add(1, Ordering::SeqCst);
        BackendHandle {
            kind: *current,
            registration: Some(self.state.clone()),
        }
    }

    /// Changes the backend used by subsequently opened scopes.
    pub fn switch_to(&self, kind: BackendKind) -> Result<BackendKind, CircuitError> {
        let mut current = self
            .state
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let active = self.state.active.load(Ordering::SeqCst);
        if active > 0 && *current != kind {
            tracing::warn!(requested = %kind, active, "refused backend switch");
            return Err(CircuitError::BackendBusy {
                requested: kind,
                active,
            });
        }
        let previous = std::mem::replace(&mut *current, kind);
        if previous != kind {
            tracing::info!(from = %previous, to = %kind, "switched backend");
        }
        Ok(previous)
    }
}

/// A backend choice pinned for the lifetime of one compilation.
#[derive(Debug)]
pub struct BackendHandle {
    kind: BackendKind,
    registration: Option<Arc<SelectorState>>,
}

impl BackendHandle {
    /// A handle that is not tied to any selector.
    pub fn detached(kind: BackendKind) -> Self {
        Self {
            kind,
            registration: None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn instantiate<F: CircuitField>(&self, optimization: OptimizationLevel) -> Backend<F> {
        self.kind.instantiate(optimization)
    }
}

impl Clone for BackendHandle {
    fn clone(&self) -> Self {
        if let Some(state) = &self.registration {
            state.active.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            kind: self.kind,
            registration: self.registration.clone(),
        }
    }
}

impl Drop for BackendHandle {
    fn drop(&mut self) {
        if let Some(state) = &self.registration {
            state.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
