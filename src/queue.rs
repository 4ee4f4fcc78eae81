//! Sorted per-packet bookkeeping queues.

use std::collections::VecDeque;

use crate::sequence::is_more_recent;

/// Bookkeeping record for a single tracked packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketRecord {
    /// Sequence number assigned on send, or observed on receive.
    pub sequence: u32,
    /// Datagram size in bytes, header included.
    pub size: u32,
    /// Seconds since the record was inserted, advanced by ticks.
    pub age: f32,
}

impl PacketRecord {
    /// Creates a record with zero age.
    pub fn new(sequence: u32, size: u32) -> Self {
        Self {
            sequence,
            size,
            age: 0.0,
        }
    }
}

/// A list of packet records kept sorted by sequence number.
///
/// Sorting uses circular ordering, so the front always holds the oldest
/// sequence and the back the newest even when the sequence space wraps.
/// Duplicate sequences are rejected silently.
#[derive(Debug, Default)]
pub struct PacketQueue {
    records: VecDeque<PacketRecord>,
}

impl PacketQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the queue.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the queue holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if the given sequence number is present.
    pub fn exists(&self, sequence: u32) -> bool {
        self.records.iter().any(|pd| pd.sequence == sequence)
    }

    /// The oldest record, if any.
    pub fn front(&self) -> Option<&PacketRecord> {
        self.records.front()
    }

    /// The newest record, if any.
    pub fn back(&self) -> Option<&PacketRecord> {
        self.records.back()
    }

    /// The record at the given position, front first.
    pub fn get(&self, index: usize) -> Option<&PacketRecord> {
        self.records.get(index)
    }

    /// Removes and returns the oldest record.
    pub fn pop_front(&mut self) -> Option<PacketRecord> {
        self.records.pop_front()
    }

    /// Removes the record at the given position.
    pub fn remove_at(&mut self, index: usize) -> Option<PacketRecord> {
        self.records.remove(index)
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Iterates over the records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PacketRecord> {
        self.records.iter()
    }

    /// Mutably iterates over the records, oldest first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PacketRecord> {
        self.records.iter_mut()
    }

    /// Inserts `pd` keeping the queue sorted by sequence number.
    ///
    /// A record whose sequence is already present is dropped silently.
    pub fn insert(&mut self, pd: PacketRecord) {
        if self.records.is_empty() {
            self.records.push_back(pd);
            return;
        }

        let seq = pd.sequence;
        let front = self.records.front().map(|r| r.sequence);
        let back = self.records.back().map(|r| r.sequence);

        if front == Some(seq) || back == Some(seq) {
            return;
        }

        if is_more_recent(self.records[0].sequence, seq) {
            self.records.push_front(pd);
            return;
        }

        if is_more_recent(seq, self.records[self.records.len() - 1].sequence) {
            self.records.push_back(pd);
            return;
        }

        // Somewhere in between. Insert before the first newer record.
        for i in 1..self.records.len() {
            if self.records[i].sequence == seq {
                return;
            }

            if is_more_recent(self.records[i].sequence, seq) {
                self.records.insert(i, pd);
                return;
            }
        }
    }
}
