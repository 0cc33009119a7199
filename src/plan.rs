//! A priority queue that stores arbitrary data sorted by time and phase
//!
//! Defines a `Queue<T, P>` that is intended to store a queue of items of type
//! T - sorted by `f64` time and definable priority `P` - called 'plans'.
//! This queue has methods for adding plans, cancelling plans, and retrieving
//! the earliest plan in the queue. Adding a plan is *O*(log(*n*)) while
//! cancellation and retrieval are *O*(1).
//!
//! This queue is used by `Context` to store the daily processes and one-off
//! day triggers. The priority is an `ExecutionPhase`, which is how the
//! "mobility first, layer edits second" contract is enforced.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::HashMap;

/// A priority queue that stores arbitrary data sorted by time
///
/// Items of type `T` are stored in order by `f64` time and called `Plan<T>`.
/// When plans are created they are sequentially assigned a `PlanId`. If two
/// plans are scheduled for the same time then the plan with the lowest
/// priority is placed earlier. If two plans have the same time and priority
/// then the plan that is scheduled first (i.e., that has the lowest id) is
/// placed earlier.
///
/// The time, plan id, and priority are stored in a binary heap of `Entry<P>`
/// objects. The data payload of the event is stored in a hash map by plan id.
/// Plan cancellation occurs by removing the corresponding entry from the data
/// hash map.
pub struct Queue<T, P: Eq + PartialEq + Ord> {
    queue: BinaryHeap<Entry<P>>,
    data_map: HashMap<u64, T>,
    plan_counter: u64,
}

impl<T, P: Eq + PartialEq + Ord> Queue<T, P> {
    /// Create a new empty `Queue<T, P>`
    #[must_use]
    pub fn new() -> Queue<T, P> {
        Queue {
            queue: BinaryHeap::new(),
            data_map: HashMap::default(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified time
    ///
    /// Returns a `PlanId` for the newly-added plan that can be used to cancel
    /// it if needed.
    pub fn add_plan(&mut self, time: f64, data: T, priority: P) -> PlanId {
        let id = self.plan_counter;
        self.queue.push(Entry { time, id, priority });
        self.data_map.insert(id, data);
        self.plan_counter += 1;
        PlanId(id)
    }

    /// Cancel a plan that has been added to the queue
    ///
    /// # Panics
    ///
    /// This function panics if you cancel a plan which has already
    /// been cancelled or executed.
    pub fn cancel_plan(&mut self, id: &PlanId) {
        // Delete the plan from the map, but leave in the queue.
        // It will be skipped when the plan is popped from the queue.
        self.data_map.remove(&id.0).expect("Plan does not exist");
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.is_empty()
    }

    /// The number of plans that are still live (not cancelled or executed)
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.len()
    }

    /// Retrieve the earliest plan in the queue
    ///
    /// Returns the next plan if it exists or else `None` if the queue is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        while let Some(entry) = self.queue.pop() {
            // Skip plans that have been cancelled and thus have no data
            if let Some(data) = self.data_map.remove(&entry.id) {
                return Some(Plan {
                    time: entry.time,
                    data,
                });
            }
        }
        None
    }
}

impl<T, P: Eq + PartialEq + Ord> Default for Queue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// A time, id, and priority object used to order plans in the `Queue<T, P>`
#[derive(PartialEq, Debug)]
struct Entry<P: Eq + PartialEq + Ord> {
    time: f64,
    id: u64,
    priority: P,
}

impl<P: Eq + PartialEq + Ord> Eq for Entry<P> {}

impl<P: Eq + PartialEq + Ord> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry objects are ordered in increasing order by time, priority, and then
/// plan id. `BinaryHeap` is a max-heap, so every comparison is reversed.
impl<P: Eq + PartialEq + Ord> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Times are validated as finite by `Context::add_plan`.
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.id.cmp(&other.id))
            .reverse()
    }
}

/// A unique identifier for a plan added to a `Queue<T, P>`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(pub(crate) u64);

/// A plan that holds data of type `T` intended to be used at the specified time
pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}
