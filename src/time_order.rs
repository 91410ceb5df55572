// 5.0: trade ids in time-of-open order. appends go to the tail, closes may hit anywhere.
// traversals copy up to `count` ids under the read lock and hand them out lazily,
// so a close racing a traversal can still be yielded by it. best-effort, not a snapshot
// of the whole instrument.

use crate::types::TradeId;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct TimeOrderedTrades {
    ids: RwLock<Vec<TradeId>>,
}

impl TimeOrderedTrades {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, id: TradeId) {
        self.ids.write().push(id);
    }

    /// Removes `id` keeping survivors in place. Returns whether it was present.
    pub fn delete(&self, id: &TradeId) -> bool {
        let mut ids = self.ids.write();
        match ids.iter().position(|candidate| candidate == id) {
            Some(index) => {
                ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// `None` when out of range.
    pub fn get(&self, index: usize) -> Option<TradeId> {
        self.ids.read().get(index).cloned()
    }

    pub fn contains(&self, id: &TradeId) -> bool {
        self.ids.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Oldest first, at most `count` ids.
    pub fn ascending(&self, count: usize) -> TradeIds {
        let ids = self.ids.read();
        TradeIds::new(ids.iter().take(count).cloned().collect())
    }

    /// Newest first, at most `count` ids.
    pub fn descending(&self, count: usize) -> TradeIds {
        let ids = self.ids.read();
        TradeIds::new(ids.iter().rev().take(count).cloned().collect())
    }

    pub fn to_vec(&self) -> Vec<TradeId> {
        self.ids.read().clone()
    }
}

/// Bounded, single-pass sequence of trade ids.
#[derive(Debug)]
pub struct TradeIds {
    inner: std::vec::IntoIter<TradeId>,
}

impl TradeIds {
    fn new(ids: Vec<TradeId>) -> Self {
        Self {
            inner: ids.into_iter(),
        }
    }
}

impl Iterator for TradeIds {
    type Item = TradeId;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for TradeIds {}

impl std::iter::FusedIterator for TradeIds {}
