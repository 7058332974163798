//! Snippet cache with reference counting
//!
//! Memoizes derivations by source URL and hands out shared handle URLs.
//!
//! ```text
//!   acquire(url) ──► Ready     ──► ref_count += 1, return handle
//!                ──► Pending   ──► waiters += 1, await the same derivation
//!                ──► (absent)  ──► insert Pending, spawn derivation, await
//!
//!   derivation done ──► ok, waiters > 0  ──► Ready { ref_count: waiters }
//!                   ──► ok, waiters == 0 ──► revoke immediately
//!                   ──► error            ──► remove entry (next acquire retries)
//!                   ──► never ran/panicked ──► same as error
//!
//!   release(handle) ──► ref_count -= 1 ──► 0? revoke + evict
//! ```
//!
//! A waiter whose `acquire` future is dropped before the derivation settles
//! withdraws itself from `waiters`; if it is dropped after settling but before
//! observing the result, it gives its reference back. Either way the count
//! settles to the number of callers that actually received the handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use super::derive::SnippetDeriver;
use super::handles::HandleStore;

/// Result broadcast to every waiter of one derivation
/// (`None` while pending, `Some(None)` on failure)
type Settlement = Option<Option<String>>;

enum Slot {
    Pending {
        generation: u64,
        waiters: usize,
        done: watch::Receiver<Settlement>,
    },
    Ready {
        handle: String,
        ref_count: usize,
    },
}

#[derive(Default)]
struct CacheState {
    by_source: HashMap<String, Slot>,
    /// handle URL -> source URL
    by_handle: HashMap<String, String>,
    next_generation: u64,
}

impl CacheState {
    /// Drop one reference to `handle`, revoking it at zero
    fn release(&mut self, handles: &HandleStore, handle_url: &str) -> bool {
        let Some(source_url) = self.by_handle.get(handle_url).cloned() else {
            log::trace!("release: Unknown handle {}, ignoring", handle_url);
            return false;
        };

        let reclaim = match self.by_source.get_mut(&source_url) {
            Some(Slot::Ready { ref_count, .. }) => {
                *ref_count = ref_count.saturating_sub(1);
                *ref_count == 0
            }
            _ => true,
        };

        if reclaim {
            self.by_handle.remove(handle_url);
            if matches!(self.by_source.get(&source_url), Some(Slot::Ready { .. })) {
                self.by_source.remove(&source_url);
            }
            handles.revoke(handle_url);
            log::debug!("release: Last reference to {} dropped, reclaimed", source_url);
        }
        true
    }
}

/// Shared, reference-counted cache of derived snippets
pub struct SnippetCache {
    deriver: Arc<SnippetDeriver>,
    state: Arc<Mutex<CacheState>>,
}

impl SnippetCache {
    pub fn new(deriver: Arc<SnippetDeriver>) -> Self {
        Self {
            deriver,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Store the cached handles live in
    pub fn handles(&self) -> &Arc<HandleStore> {
        self.deriver.handles()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        lock_state(&self.state)
    }

    /// Get a handle for the snippet of `source_url`, deriving it if needed
    ///
    /// Returns `None` when derivation fails; nothing is cached in that case so
    /// a later call retries. Each `Some` must be balanced by one [`release`].
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// [`release`]: SnippetCache::release
    pub async fn acquire(&self, source_url: &str) -> Option<String> {
        let (generation, mut done) = {
            let mut state = self.lock();
            match state.by_source.get_mut(source_url) {
                Some(Slot::Ready { handle, ref_count }) => {
                    *ref_count += 1;
                    log::debug!("acquire: Cache hit for {} (refs: {})", source_url, ref_count);
                    return Some(handle.clone());
                }
                Some(Slot::Pending {
                    generation,
                    waiters,
                    done,
                }) => {
                    *waiters += 1;
                    log::debug!("acquire: Joining in-flight derivation of {}", source_url);
                    (*generation, done.clone())
                }
                None => {
                    state.next_generation += 1;
                    let generation = state.next_generation;
                    let (tx, rx) = watch::channel(None);
                    state.by_source.insert(
                        source_url.to_string(),
                        Slot::Pending {
                            generation,
                            waiters: 1,
                            done: rx.clone(),
                        },
                    );
                    log::debug!("acquire: Cache miss for {}, deriving", source_url);
                    self.spawn_derivation(source_url.to_string(), generation, tx);
                    (generation, rx)
                }
            }
        };

        let mut waiter = Waiter {
            state: &self.state,
            handles: self.handles(),
            source_url,
            generation,
            done: done.clone(),
            claimed: false,
        };

        let outcome = match done.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone().flatten(),
            Err(_) => None,
        };
        waiter.claimed = true;
        outcome
    }

    fn spawn_derivation(&self, source_url: String, generation: u64, tx: watch::Sender<Settlement>) {
        let deriver = self.deriver.clone();
        let pending = PendingDerivation {
            state: self.state.clone(),
            handles: self.handles().clone(),
            source_url,
            generation,
            tx: Some(tx),
        };

        // Detached; the guard settles the slot from the blocking thread
        tokio::task::spawn_blocking(move || {
            let outcome = match deriver.derive(&pending.source_url) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("acquire: No snippet for {}: {}", pending.source_url, e);
                    None
                }
            };
            pending.finish(outcome);
        });
    }

    /// Give back one reference obtained from [`acquire`](SnippetCache::acquire)
    ///
    /// Unknown handles and surplus releases are ignored.
    pub fn release(&self, handle_url: &str) {
        let handles = self.handles().clone();
        self.lock().release(&handles, handle_url);
    }

    /// Current reference count for a source (0 if absent or pending)
    pub fn ref_count(&self, source_url: &str) -> usize {
        match self.lock().by_source.get(source_url) {
            Some(Slot::Ready { ref_count, .. }) => *ref_count,
            _ => 0,
        }
    }

    /// Cached handle for a source, without taking a reference
    pub fn peek(&self, source_url: &str) -> Option<String> {
        match self.lock().by_source.get(source_url) {
            Some(Slot::Ready { handle, .. }) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Whether a derivation for the source is in flight
    pub fn is_pending(&self, source_url: &str) -> bool {
        matches!(self.lock().by_source.get(source_url), Some(Slot::Pending { .. }))
    }

    /// Number of entries, pending ones included
    pub fn len(&self) -> usize {
        self.lock().by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_state(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolve a pending slot and wake its waiters
///
/// The broadcast happens under the lock so a dropped waiter always sees
/// either the pending slot or the final settlement.
fn settle(
    state: &Mutex<CacheState>,
    handles: &HandleStore,
    source_url: &str,
    generation: u64,
    outcome: Option<String>,
    tx: &watch::Sender<Settlement>,
) {
    let mut state = lock_state(state);

    let waiters = match state.by_source.get(source_url) {
        Some(Slot::Pending {
            generation: pending,
            waiters,
            ..
        }) if *pending == generation => Some(*waiters),
        _ => None,
    };
    if waiters.is_some() {
        state.by_source.remove(source_url);
    }
    let waiters = waiters.unwrap_or(0);

    match &outcome {
        Some(handle) if waiters > 0 => {
            state.by_source.insert(
                source_url.to_string(),
                Slot::Ready {
                    handle: handle.clone(),
                    ref_count: waiters,
                },
            );
            state.by_handle.insert(handle.clone(), source_url.to_string());
            log::debug!("settle: {} cached with {} reference(s)", source_url, waiters);
        }
        Some(handle) => {
            log::debug!("settle: Nobody is waiting for {} anymore, reclaiming", source_url);
            handles.revoke(handle);
        }
        None => {}
    }

    tx.send_replace(Some(outcome));
}

/// Owner of a pending slot's sender; settles the slot exactly once
///
/// Dropping it unfinished (the blocking task was discarded at runtime
/// shutdown, or the derivation panicked) settles as a failure so the slot
/// never outlives its derivation.
struct PendingDerivation {
    state: Arc<Mutex<CacheState>>,
    handles: Arc<HandleStore>,
    source_url: String,
    generation: u64,
    tx: Option<watch::Sender<Settlement>>,
}

impl PendingDerivation {
    fn finish(mut self, outcome: Option<String>) {
        if let Some(tx) = self.tx.take() {
            settle(&self.state, &self.handles, &self.source_url, self.generation, outcome, &tx);
        }
    }
}

impl Drop for PendingDerivation {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            log::error!("acquire: Derivation of {} ended without a result", self.source_url);
            settle(&self.state, &self.handles, &self.source_url, self.generation, None, &tx);
        }
    }
}

/// Bookkeeping for one caller awaiting a pending derivation
struct Waiter<'a> {
    state: &'a Mutex<CacheState>,
    handles: &'a HandleStore,
    source_url: &'a str,
    generation: u64,
    done: watch::Receiver<Settlement>,
    claimed: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.claimed {
            return;
        }

        let mut state = lock_state(self.state);
        if let Some(Slot::Pending {
            generation, waiters, ..
        }) = state.by_source.get_mut(self.source_url)
        {
            if *generation == self.generation {
                *waiters = waiters.saturating_sub(1);
                log::debug!("acquire: Caller for {} went away before derivation finished", self.source_url);
                return;
            }
        }

        // Settled before we could observe it: our reference was counted
        let settled = self.done.borrow().clone().flatten();
        if let Some(handle) = settled {
            state.release(self.handles, &handle);
        }
    }
}
