use std::{
    fmt,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam::utils::Backoff;
use prioq::{
    Cfg, Compare, DEFAULT_INITIAL_CAPACITY, Error, Export, Job, Natural, Result, WorkQueue,
    growth, heap::HeapStore,
};
use tracing::{debug, trace, warn};

use crate::{
    CancelToken,
    cancel::Wake,
    growth::AllocationFlag,
    snapshot::Iter,
};

/// An element plus the insertion sequence number that identifies it for snapshot removal.
#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    value: T,
}

/// Orders entries by their values only.
struct ByValue<'a, C>(&'a C);

impl<T, C: Compare<T>> Compare<Entry<T>> for ByValue<'_, C> {
    #[inline]
    fn compare(&self, a: &Entry<T>, b: &Entry<T>) -> std::cmp::Ordering {
        self.0.compare(&a.value, &b.value)
    }
}

struct State<T> {
    store: HeapStore<Entry<T>>,
    next_seq: u64,
}

struct Shared<T, C> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    allocation: AllocationFlag,
    /// Bumped, under the lock, every time the live store is replaced by a larger one.
    store_epoch: AtomicU64,
    order: C,
    max_capacity: usize,
}

impl<T, C> Shared<T, C> {
    /// A panicking comparator can only leave the heap permuted, never torn, so poisoning is
    /// ignored.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn order(&self) -> ByValue<'_, C> {
        ByValue(&self.order)
    }
}

impl<T: Send, C: Send + Sync> Wake for Shared<T, C> {
    fn wake_all(&self) {
        let _state = self.lock();
        self.not_empty.notify_all();
    }
}

/// Thread-safe, unbounded priority queue with blocking retrieval.
///
/// Handles are cheap to clone and all clones operate on the same queue. All state is guarded
/// by one lock; inserts never block on capacity, they grow the store instead.
///
/// Growing releases the lock while the larger store is allocated, so other producers and
/// consumers are only held up by the final copy. One thread at a time is elected to allocate
/// through a compare-and-swap flag; everybody else backs off until the new store is visible.
pub struct BlockingPriorityQueue<T, C = Natural> {
    shared: Arc<Shared<T, C>>,
}

impl<T, C> Clone for BlockingPriorityQueue<T, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Ord> BlockingPriorityQueue<T> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }

    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        Self::with_cfg(
            Cfg::for_type::<T>().with_initial_capacity(initial_capacity),
            Natural,
        )
    }
}

impl<T: Ord> Default for BlockingPriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compare<T>> BlockingPriorityQueue<T, C> {
    pub fn with_comparator(order: C) -> Self {
        Self::from_store(
            HeapStore::new(DEFAULT_INITIAL_CAPACITY),
            0,
            order,
            growth::max_capacity::<Entry<T>>(),
        )
    }

    pub fn with_cfg(cfg: Cfg, order: C) -> Result<Self> {
        cfg.validate()?;
        let store = HeapStore::with_capacity(cfg.initial_capacity)?;
        let max_capacity = cfg.max_capacity.min(growth::max_capacity::<Entry<T>>());
        Ok(Self::from_store(store, 0, order, max_capacity))
    }

    /// Builds a queue from elements in arbitrary order in linear time.
    pub fn from_vec(elements: Vec<T>, order: C) -> Self {
        let entries: Vec<Entry<T>> = elements
            .into_iter()
            .enumerate()
            .map(|(seq, value)| Entry {
                seq: seq as u64,
                value,
            })
            .collect();
        let next_seq = entries.len() as u64;
        let store = HeapStore::from_vec(entries, &ByValue(&order));
        Self::from_store(store, next_seq, order, growth::max_capacity::<Entry<T>>())
    }

    fn from_store(store: HeapStore<Entry<T>>, next_seq: u64, order: C, max_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State { store, next_seq }),
                not_empty: Condvar::new(),
                allocation: AllocationFlag::default(),
                store_epoch: AtomicU64::new(0),
                order,
                max_capacity,
            }),
        }
    }

    pub fn comparator(&self) -> &C {
        &self.shared.order
    }

    // region:    --- Insertion

    /// Inserts `value` and wakes one waiting consumer. Never blocks on capacity.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] when the queue is full at its maximum capacity; the value is
    /// dropped and the queue is unchanged.
    pub fn offer(&self, value: T) -> Result<()> {
        self.insert(value).map_err(|(e, _)| e)
    }

    /// Same as [`offer`](Self::offer); the queue is unbounded so there is nothing to wait for.
    pub fn put(&self, value: T) -> Result<()> {
        self.offer(value)
    }

    pub fn add(&self, value: T) -> Result<()> {
        self.offer(value)
    }

    /// Hands the value back on failure.
    fn insert(&self, value: T) -> std::result::Result<(), (Error, T)> {
        let shared = &*self.shared;
        let mut state = shared.lock();
        let mut entry = Entry { seq: 0, value };
        loop {
            // The lock may have been released while growing, so take the number afresh.
            entry.seq = state.next_seq;
            let pushed = state.store.push(entry, &shared.order());
            match pushed {
                Ok(_) => break,
                Err(rejected) => {
                    entry = rejected;
                    state = match self.grow(state) {
                        Ok(state) => state,
                        Err(e) => {
                            warn!(error = %e, "rejecting insert");
                            return Err((e, entry.value));
                        }
                    };
                }
            }
        }
        state.next_seq += 1;
        shared.not_empty.notify_one();
        Ok(())
    }

    /// Replaces the full store with a larger one.
    ///
    /// The lock is released for the allocation and re-acquired for the copy. Only the thread
    /// holding the allocation flag allocates; it keeps the flag until the new store is live,
    /// so a growth event allocates exactly once. The caller re-checks fullness.
    fn grow<'a>(&'a self, state: MutexGuard<'a, State<T>>) -> Result<MutexGuard<'a, State<T>>> {
        let shared = &*self.shared;
        let observed_epoch = shared.store_epoch.load(Ordering::Relaxed);
        let old_capacity = state.store.capacity();
        drop(state);

        let backoff = Backoff::new();
        let claim = loop {
            if shared.store_epoch.load(Ordering::Acquire) != observed_epoch {
                // Someone else's growth is already visible.
                return Ok(shared.lock());
            }
            if let Some(claim) = shared.allocation.try_claim() {
                break claim;
            }
            backoff.snooze();
        };

        if shared.store_epoch.load(Ordering::Acquire) != observed_epoch {
            // Grown and released between our last look and the claim.
            drop(claim);
            return Ok(shared.lock());
        }

        let fresh = growth::next_capacity(old_capacity, shared.max_capacity)
            .and_then(HeapStore::with_capacity);

        let mut state = shared.lock();
        let fresh = fresh?;
        // Only the claim holder replaces the store, so nobody can have done it meanwhile.
        debug_assert_eq!(shared.store_epoch.load(Ordering::Relaxed), observed_epoch);
        let new_capacity = fresh.capacity();
        state.store.migrate(fresh);
        shared
            .store_epoch
            .store(observed_epoch + 1, Ordering::Release);
        debug!(old_capacity, new_capacity, "grew blocking priority queue");
        drop(claim);
        Ok(state)
    }

    // endregion: --- Insertion

    // region:    --- Retrieval

    /// Removes the smallest element without waiting.
    pub fn poll(&self) -> Option<T> {
        let shared = &*self.shared;
        let mut state = shared.lock();
        state.store.extract_root(&shared.order()).map(|e| e.value)
    }

    /// Removes the smallest element, waiting as long as it takes for one to arrive.
    pub fn take(&self) -> T {
        loop {
            if let Ok(Some(value)) = self.wait(None, None) {
                return value;
            }
        }
    }

    /// Removes the smallest element, waiting at most `timeout`. Returns `None` on timeout.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        self.wait(deadline_after(timeout), None).ok().flatten()
    }

    /// Waits on the not-empty condition until an element can be extracted, `deadline` passes
    /// (`Ok(None)`), or `token` is cancelled. A failed wait leaves the queue untouched.
    fn wait(&self, deadline: Option<Instant>, token: Option<&CancelToken>) -> Result<Option<T>> {
        let shared = &*self.shared;
        let order = shared.order();
        let mut state = shared.lock();
        loop {
            if token.is_some_and(CancelToken::is_cancelled) {
                trace!("wait cancelled");
                Self::pass_on_signal(shared, &state);
                return Err(Error::CancelledWait);
            }
            if let Some(entry) = state.store.extract_root(&order) {
                return Ok(Some(entry.value));
            }
            state = match deadline {
                None => shared
                    .not_empty
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    // Recomputed on every wakeup so spurious wakeups do not extend the wait.
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        Self::pass_on_signal(shared, &state);
                        return Ok(None);
                    }
                    shared
                        .not_empty
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// A waiter leaving without an element may have consumed the signal meant for an element
    /// that is still queued; hand it to the next waiter.
    fn pass_on_signal(shared: &Shared<T, C>, state: &State<T>) {
        if !state.store.is_empty() {
            shared.not_empty.notify_one();
        }
    }

    // endregion: --- Retrieval

    // region:    --- Bulk operations

    /// Moves every element into `sink` in priority order under one lock acquisition.
    pub fn drain_to(&self, sink: &mut impl Extend<T>) -> usize {
        self.drain_to_max(sink, usize::MAX)
    }

    /// Moves at most `max` elements into `sink` in priority order under one lock acquisition.
    /// Returns how many were moved.
    pub fn drain_to_max(&self, sink: &mut impl Extend<T>, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        let shared = &*self.shared;
        let order = shared.order();
        let mut state = shared.lock();
        let mut moved = 0;
        sink.extend(std::iter::from_fn(|| {
            if moved == max {
                return None;
            }
            let entry = state.store.extract_root(&order)?;
            moved += 1;
            Some(entry.value)
        }));
        moved
    }

    /// Removes up to `n` elements in priority order.
    pub fn drain(&self, n: usize) -> Vec<T> {
        let mut drained = Vec::with_capacity(n.min(self.len()));
        self.drain_to_max(&mut drained, n);
        drained
    }

    /// Drains at most `max` elements from this queue into `target`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `target` is this queue. If `target` rejects an element,
    /// that element and every one not yet moved are put back into this queue and the error
    /// is returned.
    pub fn transfer_to(&self, target: &Self, max: usize) -> Result<usize> {
        if Arc::ptr_eq(&self.shared, &target.shared) {
            return Err(Error::InvalidArgument("cannot transfer a queue into itself"));
        }
        let batch = self.drain(max);
        let mut pending = batch.into_iter();
        let mut moved = 0;
        while let Some(value) = pending.next() {
            if let Err((e, value)) = target.insert(value) {
                for value in std::iter::once(value).chain(pending) {
                    if let Err((e, _)) = self.insert(value) {
                        warn!(error = %e, "element lost while restoring a failed transfer");
                    }
                }
                return Err(e);
            }
            moved += 1;
        }
        Ok(moved)
    }

    /// Drops every element. The capacity is retained.
    pub fn clear(&self) {
        self.shared.lock().store.clear();
    }

    // endregion: --- Bulk operations

    // region:    --- Inspection

    pub fn len(&self) -> usize {
        self.shared.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().store.capacity()
    }

    /// Always `usize::MAX`: the queue never refuses an insert for being full.
    pub fn remaining_capacity(&self) -> usize {
        usize::MAX
    }

    /// Removes the element inserted with sequence number `seq`, if it is still queued.
    pub(crate) fn remove_seq(&self, seq: u64) -> bool {
        let shared = &*self.shared;
        let mut state = shared.lock();
        match state.store.position(|e| e.seq == seq) {
            Some(index) => {
                state.store.remove_at(index, &shared.order());
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn is_heap(&self) -> bool {
        let shared = &*self.shared;
        shared.lock().store.is_heap(&shared.order())
    }

    // endregion: --- Inspection
}

impl<T, C> BlockingPriorityQueue<T, C>
where
    T: Send + 'static,
    C: Compare<T> + Send + Sync + 'static,
{
    /// Like [`take`](Self::take), but gives up with [`Error::CancelledWait`] once `token` is
    /// cancelled. A token cancelled before the call fails immediately.
    pub fn take_cancellable(&self, token: &CancelToken) -> Result<T> {
        let _registration = token.register(self.waker());
        loop {
            if let Some(value) = self.wait(None, Some(token))? {
                return Ok(value);
            }
        }
    }

    /// Like [`poll_timeout`](Self::poll_timeout), but gives up with [`Error::CancelledWait`]
    /// once `token` is cancelled.
    pub fn poll_timeout_cancellable(
        &self,
        timeout: Duration,
        token: &CancelToken,
    ) -> Result<Option<T>> {
        let _registration = token.register(self.waker());
        self.wait(deadline_after(timeout), Some(token))
    }

    fn waker(&self) -> Weak<dyn Wake> {
        Arc::downgrade(&self.shared) as Weak<dyn Wake>
    }
}

impl<T: Clone, C: Compare<T>> BlockingPriorityQueue<T, C> {
    pub fn peek(&self) -> Option<T> {
        self.shared.lock().store.peek().map(|e| e.value.clone())
    }

    /// Snapshot in heap-array order; callers must not assume it is sorted.
    pub fn to_vec(&self) -> Vec<T> {
        self.shared
            .lock()
            .store
            .as_slice()
            .iter()
            .map(|e| e.value.clone())
            .collect()
    }

    /// Weakly consistent iterator over a copy of the queue taken now.
    ///
    /// Later changes to the queue are not reflected and never make the iterator fail.
    /// [`Iter::remove`] removes the last yielded element from the live queue.
    pub fn iter(&self) -> Iter<'_, T, C> {
        let snapshot = self
            .shared
            .lock()
            .store
            .as_slice()
            .iter()
            .map(|e| (e.seq, e.value.clone()))
            .collect();
        Iter::new(self, snapshot)
    }
}

impl<T: PartialEq, C: Compare<T>> BlockingPriorityQueue<T, C> {
    pub fn contains(&self, value: &T) -> bool {
        self.shared
            .lock()
            .store
            .position(|e| e.value == *value)
            .is_some()
    }

    /// Removes one element equal to `value`. Returns whether one was found.
    pub fn remove_value(&self, value: &T) -> bool {
        let shared = &*self.shared;
        let mut state = shared.lock();
        match state.store.position(|e| e.value == *value) {
            Some(index) => {
                state.store.remove_at(index, &shared.order());
                true
            }
            None => false,
        }
    }
}

impl<T: Clone, C: Compare<T> + Clone> BlockingPriorityQueue<T, C> {
    pub fn export(&self) -> Export<T, C> {
        Export {
            comparator: self.shared.order.clone(),
            elements: self.to_vec(),
        }
    }
}

impl<T, C: Compare<T>> BlockingPriorityQueue<T, C> {
    pub fn import(export: Export<T, C>) -> Self {
        Self::from_vec(export.elements, export.comparator)
    }
}

impl<T: fmt::Debug, C> fmt::Debug for BlockingPriorityQueue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_list()
            .entries(state.store.as_slice().iter().map(|e| &e.value))
            .finish()
    }
}

impl WorkQueue for BlockingPriorityQueue<Job> {
    fn submit(&self, job: Job) -> Result<()> {
        self.offer(job)
    }

    fn drain(&self, n: usize) -> Vec<Job> {
        BlockingPriorityQueue::drain(self, n)
    }

    fn wait_next(&self, timeout: Duration) -> Result<Option<Job>> {
        Ok(self.poll_timeout(timeout))
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    // An unrepresentable deadline is as good as none.
    Instant::now().checked_add(timeout)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::Barrier,
        thread,
    };

    use prioq::{FnComparator, Reverse};
    use rand::seq::SliceRandom;

    use super::*;

    #[test]
    fn scenario_a_natural_order() {
        let queue = BlockingPriorityQueue::new();
        for v in [8, 4, 5, 7, 1, 3, 6, 2] {
            queue.offer(v).unwrap();
        }
        let polled: Vec<i32> = std::iter::from_fn(|| queue.poll()).collect();
        assert_eq!(polled, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn scenario_b_growth_from_unit_capacity() {
        let queue = BlockingPriorityQueue::with_capacity(1).unwrap();
        let mut last_capacity = queue.capacity();
        for v in 0..100 {
            queue.put(v).unwrap();
            assert!(queue.is_heap());
            assert!(queue.capacity() >= last_capacity);
            last_capacity = queue.capacity();
        }
        assert!(queue.capacity() >= 100);
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.drain(usize::MAX), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn scenario_c_take_wakes_on_offer() {
        let queue = BlockingPriorityQueue::new();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                queue.offer(42).unwrap();
            })
        };

        let start = Instant::now();
        assert_eq!(queue.take(), 42);
        let waited = start.elapsed();
        producer.join().unwrap();

        assert!(waited >= Duration::from_millis(40), "woke after {waited:?}");
        assert!(waited < Duration::from_secs(2), "woke after {waited:?}");
    }

    #[test]
    fn scenario_d_drain_to_max() {
        let queue = BlockingPriorityQueue::from_vec((1..=10).collect(), Natural);
        let mut sink = Vec::new();
        assert_eq!(queue.drain_to_max(&mut sink, 3), 3);
        assert_eq!(sink, vec![1, 2, 3]);
        assert!(queue.is_heap());

        let mut rest: Vec<i32> = queue.to_vec();
        rest.sort_unstable();
        assert_eq!(rest, (4..=10).collect::<Vec<_>>());
    }

    #[test]
    fn drain_to_everything_and_nothing() {
        let queue = BlockingPriorityQueue::from_vec(vec![3, 1, 2], Natural);
        let mut sink = vec![0];
        assert_eq!(queue.drain_to_max(&mut sink, 0), 0);
        assert_eq!(queue.drain_to(&mut sink), 3);
        assert_eq!(sink, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn peek_contains_remove() {
        let queue = BlockingPriorityQueue::with_comparator(Reverse);
        for v in [4, 9, 2] {
            queue.add(v).unwrap();
        }
        assert_eq!(queue.peek(), Some(9));
        assert!(queue.contains(&4));
        assert!(queue.remove_value(&4));
        assert!(!queue.remove_value(&4));
        assert!(!queue.contains(&4));
        assert_eq!(queue.drain(10), vec![9, 2]);
        assert_eq!(queue.peek(), None);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            BlockingPriorityQueue::<u8>::with_capacity(0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn offer_past_max_capacity_fails_without_change() {
        let cfg = Cfg::for_type::<u32>()
            .with_initial_capacity(1)
            .with_max_capacity(3);
        let queue = BlockingPriorityQueue::with_cfg(cfg, Natural).unwrap();
        for v in [3, 1, 2] {
            queue.offer(v).unwrap();
        }
        assert_eq!(queue.offer(0), Err(Error::CapacityExceeded { max: 3 }));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.drain(10), vec![1, 2, 3]);
    }

    #[test]
    fn clear_retains_capacity() {
        let queue = BlockingPriorityQueue::with_capacity(1).unwrap();
        for v in 0..20 {
            queue.offer(v).unwrap();
        }
        let capacity = queue.capacity();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), capacity);
        assert_eq!(queue.remaining_capacity(), usize::MAX);
    }

    #[test]
    fn poll_timeout_on_empty_queue() {
        let queue: BlockingPriorityQueue<u32> = BlockingPriorityQueue::new();
        let timeout = Duration::from_millis(60);
        let start = Instant::now();
        assert_eq!(queue.poll_timeout(timeout), None);
        let waited = start.elapsed();
        assert!(waited >= timeout, "returned early after {waited:?}");
        assert!(waited < timeout + Duration::from_millis(500), "took {waited:?}");
    }

    #[test]
    fn poll_timeout_returns_available_element_immediately() {
        let queue = BlockingPriorityQueue::new();
        queue.offer(5).unwrap();
        assert_eq!(queue.poll_timeout(Duration::ZERO), Some(5));
        assert_eq!(queue.poll_timeout(Duration::ZERO), None);
    }

    #[test]
    fn cancelling_blocked_take_leaves_queue_unchanged() {
        let queue: BlockingPriorityQueue<u32> = BlockingPriorityQueue::new();
        let token = CancelToken::new();
        let waiter = {
            let (queue, token) = (queue.clone(), token.clone());
            thread::spawn(move || queue.take_cancellable(&token))
        };

        thread::sleep(Duration::from_millis(50));
        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(Error::CancelledWait));
        assert_eq!(queue.len(), 0);

        // The queue is still fully usable afterwards.
        queue.offer(7).unwrap();
        assert_eq!(queue.take(), 7);
    }

    #[test]
    fn cancelling_timed_wait() {
        let queue: BlockingPriorityQueue<u32> = BlockingPriorityQueue::new();
        let token = CancelToken::new();
        let waiter = {
            let (queue, token) = (queue.clone(), token.clone());
            thread::spawn(move || {
                let start = Instant::now();
                let res = queue.poll_timeout_cancellable(Duration::from_secs(30), &token);
                (res, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(30));
        token.cancel();
        let (res, waited) = waiter.join().unwrap();
        assert_eq!(res, Err(Error::CancelledWait));
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn cancelled_token_fails_immediately_even_with_elements() {
        let queue = BlockingPriorityQueue::new();
        queue.offer(1).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(queue.take_cancellable(&token), Err(Error::CancelledWait));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn uncancelled_token_behaves_like_take() {
        let queue = BlockingPriorityQueue::new();
        queue.offer(3).unwrap();
        let token = CancelToken::new();
        assert_eq!(queue.take_cancellable(&token), Ok(3));
        assert_eq!(
            queue.poll_timeout_cancellable(Duration::from_millis(10), &token),
            Ok(None)
        );
    }

    #[test]
    fn transfer_between_queues() {
        let source = BlockingPriorityQueue::from_vec(vec![5, 3, 9, 1], Natural);
        let target = BlockingPriorityQueue::new();
        assert_eq!(source.transfer_to(&target, 2), Ok(2));
        assert_eq!(target.drain(10), vec![1, 3]);
        assert_eq!(source.drain(10), vec![5, 9]);
    }

    #[test]
    fn transfer_into_itself_is_rejected() {
        let queue = BlockingPriorityQueue::from_vec(vec![1, 2], Natural);
        let same = queue.clone();
        assert!(matches!(
            queue.transfer_to(&same, 10),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn failed_transfer_restores_source() {
        let source = BlockingPriorityQueue::from_vec(vec![4, 1, 3, 2], Natural);
        let cfg = Cfg::for_type::<u32>()
            .with_initial_capacity(1)
            .with_max_capacity(2);
        let target = BlockingPriorityQueue::with_cfg(cfg, Natural).unwrap();

        assert_eq!(
            source.transfer_to(&target, 10),
            Err(Error::CapacityExceeded { max: 2 })
        );
        assert_eq!(target.drain(10), vec![1, 2]);
        assert_eq!(source.drain(10), vec![3, 4]);
    }

    #[test]
    fn snapshot_iterator_ignores_later_changes() {
        let queue = BlockingPriorityQueue::from_vec(vec![3, 1, 2], Natural);
        let iter = queue.iter();
        queue.offer(0).unwrap();
        queue.poll();
        let mut seen: Vec<i32> = iter.collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_remove_uses_identity() {
        let queue = BlockingPriorityQueue::from_vec(vec![7, 7, 7], Natural);
        let mut iter = queue.iter();
        assert_eq!(iter.remove(), Err(Error::IllegalIteratorState));
        assert_eq!(iter.next(), Some(7));
        iter.remove().unwrap();
        assert_eq!(iter.remove(), Err(Error::IllegalIteratorState));
        assert_eq!(queue.len(), 2);

        assert_eq!(iter.next(), Some(7));
        iter.remove().unwrap();
        assert_eq!(iter.len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn snapshot_remove_of_drained_element_is_noop() {
        let queue = BlockingPriorityQueue::from_vec(vec![1, 2], Natural);
        let mut iter = queue.iter();
        let first = iter.next();
        assert_eq!(first, Some(1));
        assert_eq!(queue.poll(), Some(1));
        queue.offer(1).unwrap();
        iter.remove().unwrap();
        // The re-inserted 1 is a different element and stays.
        assert_eq!(queue.drain(10), vec![1, 2]);
    }

    #[test]
    fn export_import_round_trip() {
        let queue = BlockingPriorityQueue::with_comparator(Reverse);
        for v in [2, 8, 5, 1] {
            queue.offer(v).unwrap();
        }
        let export = queue.export();
        let restored = BlockingPriorityQueue::import(export);
        assert_eq!(restored.drain(10), queue.drain(10));
    }

    #[test]
    fn debug_lists_elements() {
        let queue = BlockingPriorityQueue::from_vec(vec![1], Natural);
        assert_eq!(format!("{queue:?}"), "[1]");
    }

    #[test]
    fn concurrent_growth_keeps_every_element() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 2_000;

        let queue = BlockingPriorityQueue::with_capacity(1).unwrap();
        let start = Arc::new(Barrier::new(PRODUCERS));
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let (queue, start) = (queue.clone(), Arc::clone(&start));
                thread::spawn(move || {
                    let mut values: Vec<usize> =
                        (p * PER_PRODUCER..(p + 1) * PER_PRODUCER).collect();
                    values.shuffle(&mut rand::rng());
                    start.wait();
                    for v in values {
                        queue.offer(v).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(queue.is_heap());
        assert!(queue.capacity() >= PRODUCERS * PER_PRODUCER);
        assert_eq!(
            queue.drain(usize::MAX),
            (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>()
        );
    }

    #[test]
    fn contended_growth_allocates_once_per_step() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 1_000;

        for _ in 0..10 {
            let queue = BlockingPriorityQueue::with_capacity(1).unwrap();
            let start = Arc::new(Barrier::new(PRODUCERS));
            let handles: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let (queue, start) = (queue.clone(), Arc::clone(&start));
                    thread::spawn(move || {
                        start.wait();
                        for v in p * PER_PRODUCER..(p + 1) * PER_PRODUCER {
                            queue.offer(v).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let max = growth::max_capacity::<Entry<usize>>();
            let (mut capacity, mut steps) = (1, 0);
            while capacity < queue.capacity() {
                capacity = growth::next_capacity(capacity, max).unwrap();
                steps += 1;
            }
            assert_eq!(capacity, queue.capacity());
            assert_eq!(queue.shared.store_epoch.load(Ordering::SeqCst), steps);
            assert_eq!(queue.len(), PRODUCERS * PER_PRODUCER);
        }
    }

    #[test]
    fn timed_wait_survives_repeated_wakeups() {
        let queue: BlockingPriorityQueue<u32> = BlockingPriorityQueue::new();
        let timeout = Duration::from_millis(300);

        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let polled = queue.poll_timeout(timeout);
                (polled, start.elapsed())
            })
        };

        // Every cancellation notifies all waiters on the condition, the timed one included.
        for _ in 0..10 {
            thread::sleep(Duration::from_millis(20));
            let token = CancelToken::new();
            let canceller = {
                let (queue, token) = (queue.clone(), token.clone());
                thread::spawn(move || queue.take_cancellable(&token))
            };
            thread::sleep(Duration::from_millis(5));
            token.cancel();
            assert_eq!(canceller.join().unwrap(), Err(Error::CancelledWait));
        }

        let (polled, waited) = waiter.join().unwrap();
        assert_eq!(polled, None);
        assert!(waited >= timeout, "returned early after {waited:?}");
        assert!(waited < timeout * 2, "wait was reset, took {waited:?}");
        assert!(queue.is_empty());
    }

    #[test]
    fn producers_then_racing_consumers() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;
        const CONSUMERS: usize = 3;

        let by_key = FnComparator(|a: &(u32, usize), b: &(u32, usize)| a.0.cmp(&b.0));
        let queue = BlockingPriorityQueue::with_comparator(by_key);
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let id = p * PER_PRODUCER + i;
                        queue.offer(((id * 7_919 % 1_000) as u32, id)).unwrap();
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let remaining = Arc::new(AtomicU64::new((PRODUCERS * PER_PRODUCER) as u64));
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let (queue, remaining) = (queue.clone(), Arc::clone(&remaining));
                thread::spawn(move || {
                    let mut received = Vec::new();
                    // Claim a slot before taking so exactly P*M takes happen in total.
                    while remaining
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        received.push(queue.take());
                    }
                    received
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in consumers {
            let received = handle.join().unwrap();
            assert!(received.windows(2).all(|w| w[0].0 <= w[1].0));
            for (_, id) in received {
                assert!(ids.insert(id), "element {id} delivered twice");
            }
        }
        assert_eq!(ids.len(), PRODUCERS * PER_PRODUCER);
        assert!(queue.is_empty());
    }

    #[test]
    fn many_blocked_consumers_all_served() {
        let queue: BlockingPriorityQueue<u32> = BlockingPriorityQueue::new();
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.take())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        for v in [40, 10, 30, 20] {
            queue.offer(v).unwrap();
        }

        let mut taken: Vec<u32> = consumers.into_iter().map(|h| h.join().unwrap()).collect();
        taken.sort_unstable();
        assert_eq!(taken, vec![10, 20, 30, 40]);
    }
}
