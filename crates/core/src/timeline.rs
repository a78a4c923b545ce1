//! Bounded, hash-chained timeline of events.

use std::collections::VecDeque;
use thiserror::Error;

use crate::event::{EventBuilder, TimelineEvent, GENESIS_HASH};

/// Chain verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("event {seq} hash does not match its content")]
    HashMismatch { seq: u64 },

    #[error("event {seq} does not link to the preceding event")]
    BrokenLink { seq: u64 },

    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
}

/// Verify that a run of consecutive events is internally consistent.
///
/// The first event's `prev_hash` is trusted as-is since older events may have
/// been evicted from a bounded timeline.
pub fn verify_chain<'a, I>(events: I) -> Result<(), ChainError>
where
    I: IntoIterator<Item = &'a TimelineEvent>,
{
    let mut previous: Option<&TimelineEvent> = None;
    for event in events {
        if !event.is_sealed_correctly() {
            return Err(ChainError::HashMismatch { seq: event.seq });
        }
        if let Some(prev) = previous {
            if event.seq != prev.seq + 1 {
                return Err(ChainError::SequenceGap {
                    expected: prev.seq + 1,
                    found: event.seq,
                });
            }
            if event.prev_hash != prev.hash {
                return Err(ChainError::BrokenLink { seq: event.seq });
            }
        }
        previous = Some(event);
    }
    Ok(())
}

/// Ring buffer of the most recent events plus the running chain head.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: VecDeque<TimelineEvent>,
    capacity: usize,
    next_seq: u64,
    head_hash: String,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            next_seq: 0,
            head_hash: GENESIS_HASH.to_string(),
        }
    }

    /// Seal and append an event, evicting the oldest when full.
    pub fn append(&mut self, builder: EventBuilder) -> TimelineEvent {
        let event = builder.seal(self.next_seq, &self.head_hash);
        self.next_seq += 1;
        self.head_hash = event.hash.clone();
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
        event
    }

    /// Up to `limit` most recent events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<TimelineEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.next_seq
    }

    pub fn head_hash(&self) -> &str {
        &self.head_hash
    }

    pub fn verify(&self) -> Result<(), ChainError> {
        verify_chain(self.events.iter())
    }
}
