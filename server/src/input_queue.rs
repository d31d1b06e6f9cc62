//! Per-entity FIFO of pending inputs
//!
//! Inputs are appended on the message-receipt path and drained, oldest
//! first, by the simulation tick. A queue may be bounded so a client that
//! floods input packets cannot grow server memory without limit.

use clap::ValueEnum;
use shared::Input;
use std::collections::VecDeque;

/// What to do when a bounded queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverflowPolicy {
    /// Discard the oldest queued input to make room for the new one.
    DropOldest,
    /// Keep the queue as is and discard the incoming input.
    RejectNewest,
}

/// Result of an enqueue against a possibly bounded queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queued after evicting the oldest pending input.
    DroppedOldest(Input),
    /// Not queued, the queue was full.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct InputQueue {
    pending: VecDeque<Input>,
    max_depth: Option<usize>,
    policy: OverflowPolicy,
    dropped: u64,
}

impl InputQueue {
    pub fn new(max_depth: Option<usize>, policy: OverflowPolicy) -> Self {
        Self {
            pending: VecDeque::new(),
            max_depth: max_depth.filter(|depth| *depth > 0),
            policy,
            dropped: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, OverflowPolicy::DropOldest)
    }

    /// Appends an input in O(1), applying the overflow policy when bounded.
    pub fn enqueue(&mut self, input: Input) -> EnqueueOutcome {
        let full = self
            .max_depth
            .is_some_and(|depth| self.pending.len() >= depth);

        if !full {
            self.pending.push_back(input);
            return EnqueueOutcome::Queued;
        }

        self.dropped += 1;
        match self.policy {
            OverflowPolicy::DropOldest => {
                let evicted = self.pending.pop_front();
                self.pending.push_back(input);
                match evicted {
                    Some(evicted) => EnqueueOutcome::DroppedOldest(evicted),
                    None => EnqueueOutcome::Queued,
                }
            }
            OverflowPolicy::RejectNewest => EnqueueOutcome::Rejected,
        }
    }

    /// Removes and returns every pending input in arrival order.
    pub fn drain_all(&mut self) -> Vec<Input> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Inputs lost to overflow over the queue's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
