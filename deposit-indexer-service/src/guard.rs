use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Committed keys remembered in memory; older ones fall back to the
/// storage primary key for duplicate detection.
pub const SEEN_CAPACITY: usize = 100_000;
pub const SEEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
enum KeyState {
    /// Closes when the permit holder commits or releases the key.
    InFlight(watch::Receiver<()>),
    Seen(Instant),
}

#[derive(Debug, Default)]
struct GuardState {
    keys: HashMap<String, KeyState>,
    seen_order: VecDeque<(String, Instant)>,
}

impl GuardState {
    fn prune(&mut self, capacity: usize, ttl: Duration, now: Instant) {
        while let Some((key, seen_at)) = self.seen_order.front() {
            let over_capacity = self.seen_order.len() > capacity;
            let expired = now.duration_since(*seen_at) >= ttl;
            if !over_capacity && !expired {
                break;
            }
            // a key evicted and re-admitted since has a newer entry further back
            if matches!(self.keys.get(key), Some(KeyState::Seen(at)) if at == seen_at) {
                self.keys.remove(key);
            }
            self.seen_order.pop_front();
        }
    }
}

/// Admits each natural key to persistence at most once.
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    state: Arc<Mutex<GuardState>>,
    capacity: usize,
    ttl: Duration,
}

#[derive(Debug)]
pub enum Admission {
    Accepted(AdmissionPermit),
    /// Another producer holds the key and has not finished persisting it.
    InFlight(InFlightKey),
    Duplicate,
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::with_limits(SEEN_CAPACITY, SEEN_TTL)
    }
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::default())),
            capacity,
            ttl,
        }
    }

    pub fn admit(&self, natural_key: &str) -> Admission {
        let now = Instant::now();
        let mut state = lock(&self.state);
        state.prune(self.capacity, self.ttl, now);
        match state.keys.get(natural_key) {
            Some(KeyState::Seen(_)) => {
                debug!("Duplicate deposit {}", natural_key);
                Admission::Duplicate
            }
            Some(KeyState::InFlight(settled)) => {
                debug!("Deposit {} in flight", natural_key);
                Admission::InFlight(InFlightKey {
                    settled: settled.clone(),
                })
            }
            None => {
                let (sender, receiver) = watch::channel(());
                state
                    .keys
                    .insert(natural_key.to_owned(), KeyState::InFlight(receiver));
                Admission::Accepted(AdmissionPermit {
                    key: natural_key.to_owned(),
                    guard: self.clone(),
                    committed: false,
                    _settle: sender,
                })
            }
        }
    }

    /// Keys currently tracked, in flight or committed.
    pub fn tracked(&self) -> usize {
        lock(&self.state).keys.len()
    }
}

/// Exclusive right to persist one key. Dropping it uncommitted releases
/// the key so a later delivery can be admitted again.
#[derive(Debug)]
pub struct AdmissionPermit {
    key: String,
    guard: IdempotencyGuard,
    committed: bool,
    // dropped after the state update in `Drop`, waking `InFlightKey` waiters
    _settle: watch::Sender<()>,
}

impl AdmissionPermit {
    pub fn commit(mut self) {
        let now = Instant::now();
        let mut state = lock(&self.guard.state);
        state.keys.insert(self.key.to_owned(), KeyState::Seen(now));
        state.seen_order.push_back((self.key.to_owned(), now));
        state.prune(self.guard.capacity, self.guard.ttl, now);
        self.committed = true;
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut state = lock(&self.guard.state);
        if matches!(state.keys.get(&self.key), Some(KeyState::InFlight(_))) {
            state.keys.remove(&self.key);
            debug!("Released deposit {}", self.key);
        }
    }
}

/// Handle on a key someone else is persisting.
#[derive(Debug)]
pub struct InFlightKey {
    settled: watch::Receiver<()>,
}

impl InFlightKey {
    /// Resolves once the holder has committed or released the key; admit
    /// again to learn which.
    pub async fn settled(mut self) {
        // the sender never sends, so this only returns once it is dropped
        while self.settled.changed().await.is_ok() {}
    }
}

// state stays consistent across a panicking holder: every mutation is a single insert/remove
fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(guard: &IdempotencyGuard, key: &str) -> AdmissionPermit {
        match guard.admit(key) {
            Admission::Accepted(permit) => permit,
            other => panic!("{} should be admitted, got {:?}", key, other),
        }
    }

    fn is_duplicate(guard: &IdempotencyGuard, key: &str) -> bool {
        matches!(guard.admit(key), Admission::Duplicate)
    }

    fn in_flight(guard: &IdempotencyGuard, key: &str) -> InFlightKey {
        match guard.admit(key) {
            Admission::InFlight(pending) => pending,
            other => panic!("{} should be in flight, got {:?}", key, other),
        }
    }

    #[tokio::test]
    async fn test_committed_key_is_duplicate() {
        let guard = IdempotencyGuard::new();

        accept(&guard, "0xaa:0").commit();

        assert!(is_duplicate(&guard, "0xaa:0"));
        assert!(!is_duplicate(&guard, "0xaa:1"));
    }

    #[tokio::test]
    async fn test_in_flight_key_is_not_admitted_twice() {
        let guard = IdempotencyGuard::new();

        let permit = accept(&guard, "0xaa:0");

        in_flight(&guard, "0xaa:0");
        permit.commit();
        assert!(is_duplicate(&guard, "0xaa:0"));
    }

    #[tokio::test]
    async fn test_in_flight_key_settles_on_commit() {
        let guard = IdempotencyGuard::new();
        let permit = accept(&guard, "0xaa:0");
        let pending = in_flight(&guard, "0xaa:0");

        let waiter = tokio::spawn(pending.settled());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        permit.commit();

        waiter.await.unwrap();
        assert!(is_duplicate(&guard, "0xaa:0"));
    }

    #[tokio::test]
    async fn test_in_flight_key_settles_on_release() {
        let guard = IdempotencyGuard::new();
        let permit = accept(&guard, "0xaa:0");
        let pending = in_flight(&guard, "0xaa:0");

        drop(permit);
        pending.settled().await;

        accept(&guard, "0xaa:0");
    }

    #[tokio::test]
    async fn test_dropped_permit_releases_key() {
        let guard = IdempotencyGuard::new();

        let permit = accept(&guard, "0xaa:0");
        drop(permit);

        assert_eq!(guard.tracked(), 0);
        accept(&guard, "0xaa:0").commit();
        assert!(is_duplicate(&guard, "0xaa:0"));
    }

    #[tokio::test]
    async fn test_capacity_forgets_oldest_committed_key() {
        let guard = IdempotencyGuard::with_limits(2, SEEN_TTL);

        accept(&guard, "a").commit();
        accept(&guard, "b").commit();
        accept(&guard, "c").commit();

        assert_eq!(guard.tracked(), 2);
        assert!(is_duplicate(&guard, "b"));
        assert!(is_duplicate(&guard, "c"));
        // forgotten in memory; storage uniqueness takes over from here
        accept(&guard, "a");
    }

    #[tokio::test]
    async fn test_capacity_never_evicts_in_flight_keys() {
        let guard = IdempotencyGuard::with_limits(1, SEEN_TTL);

        let pending = accept(&guard, "pending");
        accept(&guard, "a").commit();
        accept(&guard, "b").commit();

        in_flight(&guard, "pending");
        drop(pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seen_key_expires_after_ttl() {
        let guard = IdempotencyGuard::with_limits(10, Duration::from_secs(60));

        accept(&guard, "a").commit();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(is_duplicate(&guard, "a"));

        tokio::time::advance(Duration::from_secs(1)).await;
        accept(&guard, "a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_accepts_one() {
        let guard = IdempotencyGuard::new();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    match guard.admit("0xrace:0") {
                        Admission::Accepted(permit) => {
                            permit.commit();
                            true
                        }
                        Admission::InFlight(_) | Admission::Duplicate => false,
                    }
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }
}
