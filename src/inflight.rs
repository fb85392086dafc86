use std::collections::BTreeMap;

use crate::Seqno;

#[derive(Debug, Clone, Copy, PartialEq)]
/// An element of Inflight: when a packet left, and the pacing state it left with.
pub struct InflightEntry {
    pub sent_time: f64,
    pub intersend_time: f64,
    pub intersend_time_vel: f64,
}

/// A data structure that tracks packets that have been sent but not yet acknowledged, in
/// sequence-number order.
#[derive(Debug, Default, Clone)]
pub struct Inflight {
    segments: BTreeMap<Seqno, InflightEntry>,
}

impl Inflight {
    /// Creates a new Inflight.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unacked(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear()
    }

    pub fn contains(&self, seqno: Seqno) -> bool {
        self.segments.contains_key(&seqno)
    }

    pub fn get(&self, seqno: Seqno) -> Option<&InflightEntry> {
        self.segments.get(&seqno)
    }

    /// Inserts a packet, replacing (and returning) whatever was recorded under the same seqno.
    pub fn insert(&mut self, seqno: Seqno, entry: InflightEntry) -> Option<InflightEntry> {
        self.segments.insert(seqno, entry)
    }

    /// Iterates in ascending seqno order.
    pub fn iter(&self) -> impl Iterator<Item = (Seqno, &InflightEntry)> + '_ {
        self.segments.iter().map(|(k, v)| (*k, v))
    }

    /// Removes every packet with a seqno up to and including `seqno`, returning them in ascending
    /// order.
    pub fn drain_through(&mut self, seqno: Seqno) -> Vec<(Seqno, InflightEntry)> {
        let drained = match seqno.checked_add(1) {
            Some(bound) => {
                let rest = self.segments.split_off(&bound);
                std::mem::replace(&mut self.segments, rest)
            }
            None => std::mem::take(&mut self.segments),
        };
        drained.into_iter().collect()
    }
}
