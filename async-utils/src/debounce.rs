use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::OrCancelExt;

struct Pending {
    generation: u64,
    token: CancellationToken,
}

struct State<K> {
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

/// Per-key debouncer: each key has at most one armed timer.
///
/// Scheduling an action for a key cancels that key's armed timer and
/// replaces it, so only the last action scheduled inside a quiet period
/// runs. Only the timer is cancellable; once an action starts it runs to
/// completion even if a newer action is scheduled for the same key.
///
/// Must be used from within a tokio runtime.
pub struct KeyedDebouncer<K> {
    delay: Duration,
    state: Arc<Mutex<State<K>>>,
}

impl<K> Clone for KeyedDebouncer<K> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            state: Arc::clone(&self.state),
        }
    }
}

fn lock<K>(state: &Mutex<State<K>>) -> MutexGuard<'_, State<K>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K> KeyedDebouncer<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(State {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }

    /// Arm (or re-arm) the timer for `key`. `action` runs once the delay
    /// elapses without another `schedule` or `cancel` for the same key.
    pub fn schedule<F>(&self, key: K, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut state = lock(&self.state);
            state.next_generation += 1;
            let generation = state.next_generation;
            let previous = state.pending.insert(
                key.clone(),
                Pending {
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                tracing::trace!(?key, "debounce timer replaced");
                previous.token.cancel();
            }
            generation
        };

        let state = Arc::clone(&self.state);
        let delay = self.delay;
        tokio::spawn(async move {
            if tokio::time::sleep(delay).or_cancel(&token).await.is_err() {
                return;
            }
            {
                let mut state = lock(&state);
                match state.pending.get(&key) {
                    Some(pending) if pending.generation == generation => {
                        state.pending.remove(&key);
                    }
                    // Superseded between the timer firing and taking the lock.
                    _ => return,
                }
            }
            action.await;
        });
    }

    /// Disarm the timer for `key`. Returns whether a timer was armed.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = lock(&self.state).pending.remove(key);
        match removed {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Disarm every timer.
    pub fn cancel_all(&self) {
        let drained: Vec<Pending> = lock(&self.state).pending.drain().map(|(_, p)| p).collect();
        for pending in drained {
            pending.token.cancel();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.state).pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }
}
