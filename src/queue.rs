//! Global time-ordered event queue.
//!
//! The queue is the sole arbiter of "now". Events are ordered by
//! `(time, priority, sequence)` where the sequence is the insertion counter,
//! so two runs issuing the same `schedule` calls dispatch in exactly the
//! same order.
//!
//! Cancellation is lazy: the event leaves the pending map immediately and
//! its heap entry is skipped when it reaches the top.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventPayload};
use crate::types::{ComponentId, EventId, Priority, SimTime};

/// Heap key; the event body lives in the pending map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    time: SimTime,
    priority: Priority,
    seq: u64,
}

/// Counters maintained by the queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Events accepted by `schedule`
    pub scheduled: u64,
    /// Events handed out by `pop_until`
    pub dispatched: u64,
    /// Events withdrawn before firing
    pub cancelled: u64,
    /// Largest number of simultaneously pending events
    pub peak_depth: usize,
}

/// Pending events ordered by time, priority and insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<QueueKey>>,
    pending: HashMap<u64, Event>,
    now: SimTime,
    next_seq: u64,
    stats: QueueStats,
}

impl EventQueue {
    /// Creates an empty queue at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of live (not cancelled, not dispatched) events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no live events remain.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the queue counters.
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Inserts an event firing at `time`.
    ///
    /// # Errors
    /// `PastDeadline` if `time` is earlier than the current time.
    pub fn schedule(
        &mut self,
        time: SimTime,
        priority: Priority,
        source: ComponentId,
        target: ComponentId,
        payload: EventPayload,
    ) -> SimResult<EventId> {
        if time < self.now {
            return Err(SimError::PastDeadline {
                requested: time,
                now: self.now,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let id = EventId(seq);
        self.heap.push(Reverse(QueueKey {
            time,
            priority,
            seq,
        }));
        self.pending.insert(
            seq,
            Event {
                id,
                time,
                priority,
                source,
                target,
                payload,
            },
        );

        self.stats.scheduled += 1;
        self.stats.peak_depth = self.stats.peak_depth.max(self.pending.len());
        Ok(id)
    }

    /// Withdraws a pending event on behalf of `owner`.
    ///
    /// # Errors
    /// `UnknownEvent` if the event already fired, was already cancelled or
    /// never existed; `NotEventOwner` if `owner` did not schedule it.
    pub fn cancel(&mut self, owner: ComponentId, id: EventId) -> SimResult<Event> {
        match self.pending.get(&id.0) {
            None => Err(SimError::UnknownEvent { id }),
            Some(event) if event.source != owner => Err(SimError::NotEventOwner {
                id,
                owner: event.source.to_string(),
                requester: owner.to_string(),
            }),
            Some(_) => {
                self.stats.cancelled += 1;
                // The heap entry becomes a tombstone and is skipped on pop.
                self.pending
                    .remove(&id.0)
                    .ok_or(SimError::UnknownEvent { id })
            }
        }
    }

    /// Returns true if `id` is still waiting to fire.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id.0)
    }

    /// Returns the timestamp of the earliest live event.
    pub fn next_time(&mut self) -> Option<SimTime> {
        self.discard_tombstones();
        self.heap.peek().map(|Reverse(key)| key.time)
    }

    /// Pops the earliest live event if it fires at or before `limit`,
    /// advancing the current time to its timestamp.
    pub fn pop_until(&mut self, limit: SimTime) -> Option<Event> {
        self.discard_tombstones();

        let Reverse(key) = *self.heap.peek()?;
        if key.time > limit {
            return None;
        }
        self.heap.pop();

        let event = self.pending.remove(&key.seq)?;
        self.now = key.time;
        self.stats.dispatched += 1;
        Some(event)
    }

    /// Moves the current time forward to `time` without dispatching.
    ///
    /// Has no effect if `time` is in the past.
    pub fn advance_to(&mut self, time: SimTime) {
        self.now = self.now.max(time);
    }

    fn discard_tombstones(&mut self) {
        while let Some(Reverse(key)) = self.heap.peek() {
            if self.pending.contains_key(&key.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
