//! "Changed" notification for noise sources.
//!
//! A [`ChangeSignal`] holds a list of callbacks keyed by [`ListenerId`].
//! Subscribers connect when they start observing a source and must
//! disconnect before releasing it; [`crate::texture::NoiseTexture`] does so
//! on replacement and on drop.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

/// Token returned by [`ChangeSignal::connect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct ChangeSignal {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Callback)>>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to run on every [`emit`](Self::emit).
    pub fn connect<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener.  Returns `false` if `id` was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    /// Invoke every connected callback.
    ///
    /// The listener list is snapshotted first, so callbacks may connect,
    /// disconnect or emit again without deadlocking.
    pub fn emit(&self) {
        let snapshot: Vec<Callback> = self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for cb in snapshot {
            cb();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Callback)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
