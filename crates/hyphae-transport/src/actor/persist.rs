//! Persistent actor state
//!
//! [`Persistent<S>`] wraps a piece of actor state and keeps an injected
//! [`Persister`] in step with it: loaded when the actor starts, saved after
//! every `modify` and when the actor stops, deleted by `clear`. Persistence
//! failures go to the actor's error handler and never abort the run loop.

use super::context::ActorContext;
use super::handle::LifecycleHook;
use dashmap::DashMap;
use hyphae_protocol::Tagged;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to load state '{key}': {source}")]
    Load {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to save state '{key}': {source}")]
    Save {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to delete state '{key}': {source}")]
    Delete {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Storage backend for persistent state
pub trait Persister<S>: Send + Sync + 'static {
    /// Stored state for `key`, `None` if nothing was saved yet
    fn load(&self, key: &str) -> anyhow::Result<Option<S>>;

    fn save(&self, key: &str, state: &S) -> anyhow::Result<()>;

    fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// In-memory persister for tests and non-durable deployments
pub struct MemoryPersister<S> {
    entries: DashMap<String, S>,
}

impl<S: Clone> MemoryPersister<S> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Currently stored value for `key`
    pub fn get(&self, key: &str) -> Option<S> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Clone> Default for MemoryPersister<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Persister<S> for MemoryPersister<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn load(&self, key: &str) -> anyhow::Result<Option<S>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn save(&self, key: &str, state: &S) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), state.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// State kept in step with a [`Persister`]
///
/// Clones share the same state, so a handler and the actor's lifecycle hook
/// can each hold one.
///
/// # Example
///
/// ```rust,ignore
/// let inventory = Persistent::new("inventory", Inventory::default(), persister);
/// let actor = Actor::builder("market-maker")
///     .persist(inventory.clone())
///     .handle_with(move |fill: Fill, ctx| {
///         inventory.modify(ctx, |inv| inv.apply(&fill));
///         Ok(())
///     })
///     .build();
/// ```
pub struct Persistent<S> {
    key: Arc<str>,
    state: Arc<Mutex<S>>,
    initial: Arc<S>,
    persister: Arc<dyn Persister<S>>,
}

impl<S> Clone for Persistent<S> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            state: Arc::clone(&self.state),
            initial: Arc::clone(&self.initial),
            persister: Arc::clone(&self.persister),
        }
    }
}

impl<S> Persistent<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Wrap `initial` under `key`. `clear` resets to `initial`.
    pub fn new(key: impl Into<String>, initial: S, persister: Arc<dyn Persister<S>>) -> Self {
        Self {
            key: Arc::from(key.into()),
            state: Arc::new(Mutex::new(initial.clone())),
            initial: Arc::new(initial),
            persister,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the current state
    pub fn get(&self) -> S {
        self.state.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.lock())
    }

    /// Mutate the state and save it. A failed save is reported to the
    /// actor's error handler; the in-memory change is kept.
    pub fn modify<M: Tagged, R>(
        &self,
        ctx: &mut ActorContext<M>,
        f: impl FnOnce(&mut S) -> R,
    ) -> R {
        let (result, saved) = self.apply(f);
        if let Err(err) = saved {
            ctx.report_error(err);
        }
        result
    }

    /// Mutate the state and save it, returning the save error to the caller
    pub fn try_modify<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, PersistError> {
        let (result, saved) = self.apply(f);
        saved.map(|_| result)
    }

    fn apply<R>(&self, f: impl FnOnce(&mut S) -> R) -> (R, Result<(), PersistError>) {
        let mut state = self.state.lock();
        let result = f(&mut state);
        let saved = self
            .persister
            .save(&self.key, &state)
            .map_err(|source| PersistError::Save {
                key: self.key.to_string(),
                source,
            });
        (result, saved)
    }

    /// Replace the in-memory state with the stored one, if any.
    /// Returns whether stored state was found.
    pub fn load(&self) -> Result<bool, PersistError> {
        let stored = self
            .persister
            .load(&self.key)
            .map_err(|source| PersistError::Load {
                key: self.key.to_string(),
                source,
            })?;
        match stored {
            Some(state) => {
                *self.state.lock() = state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn save(&self) -> Result<(), PersistError> {
        let state = self.state.lock();
        self.persister
            .save(&self.key, &state)
            .map_err(|source| PersistError::Save {
                key: self.key.to_string(),
                source,
            })
    }

    /// Delete the stored state and reset to the initial value
    pub fn clear(&self) -> Result<(), PersistError> {
        *self.state.lock() = (*self.initial).clone();
        self.persister
            .delete(&self.key)
            .map_err(|source| PersistError::Delete {
                key: self.key.to_string(),
                source,
            })
    }
}

impl<S, M> LifecycleHook<M> for Persistent<S>
where
    S: Clone + Send + Sync + 'static,
    M: Tagged,
{
    fn on_start(&mut self, ctx: &mut ActorContext<M>) {
        match self.load() {
            Ok(true) => tracing::debug!(key = %self.key, "Restored persistent state"),
            Ok(false) => {}
            Err(err) => ctx.report_error(err),
        }
    }

    fn on_stop(&mut self, ctx: &mut ActorContext<M>) {
        if let Err(err) = self.save() {
            ctx.report_error(err);
        }
    }
}
