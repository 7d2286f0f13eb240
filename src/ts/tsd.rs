//! `TSD[K,V]`: a dynamically keyed mapping (§3.2, §4.4.1). Keys arrive and
//! leave via a stream of per-cycle deltas; `REMOVE` (here, [Delta::Remove])
//! evicts a key. `added_items`/`removed_items`/`modified_items` report only
//! the keys that changed in the current cycle, as required by the TSD
//! invariant that `modified` and `removed` are disjoint.
//!
//! The per-key dynamic routing a nested `map_` needs on top of this
//! (instantiating a sub-graph per key) follows the same `mark_dirty`-based
//! pattern as [crate::nodes::demux], generalised from its fixed-capacity
//! slot pool to an unbounded `HashMap<K, usize>` — see `src/nested/map_.rs`.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use derive_new::new;

use crate::ts::Delta;
use crate::{AsNode, Element, GraphState, IntoStream, MutableNode, Stream, StreamPeekRef, UpStreams};

/// The delta payload a `TSD[K,V]` source carries: per-key updates this
/// cycle, `Delta::Remove` marking eviction.
pub type TsdDelta<K, V> = HashMap<K, Delta<V>>;

/// Accumulates a stream of [TsdDelta] into a live `K -> V` mapping, tracking
/// which keys were added, removed, or modified this cycle.
#[derive(new)]
pub struct Tsd<K: Element + Eq + Hash, V: Element> {
    source: Rc<dyn Stream<TsdDelta<K, V>>>,
    #[new(default)]
    value: HashMap<K, V>,
    #[new(default)]
    added: HashSet<K>,
    #[new(default)]
    removed: HashSet<K>,
    #[new(default)]
    modified: HashSet<K>,
}

impl<K: Element + Eq + Hash, V: Element> Tsd<K, V> {
    /// Frozen snapshot of key -> child value, as of the cycle the TSD was
    /// last modified.
    pub fn value(&self) -> &HashMap<K, V> {
        &self.value
    }

    /// Keys newly present this cycle.
    pub fn added_items(&self) -> &HashSet<K> {
        &self.added
    }

    /// Keys evicted this cycle.
    pub fn removed_items(&self) -> &HashSet<K> {
        &self.removed
    }

    /// Keys whose value changed (but were already present) this cycle.
    pub fn modified_items(&self) -> &HashSet<K> {
        &self.modified
    }
}

impl<K: Element + Eq + Hash, V: Element> MutableNode for Tsd<K, V> {
    fn cycle(&mut self, _state: &mut GraphState) -> bool {
        self.added.clear();
        self.removed.clear();
        self.modified.clear();
        for (key, delta) in self.source.peek_value() {
            match delta {
                Delta::Remove => {
                    if self.value.remove(&key).is_some() {
                        self.removed.insert(key);
                    }
                }
                Delta::Value(v) => {
                    if self.value.insert(key.clone(), v).is_some() {
                        self.modified.insert(key);
                    } else {
                        self.added.insert(key);
                    }
                }
            }
        }
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }
}

impl<K: Element + Eq + Hash, V: Element> StreamPeekRef<HashMap<K, V>> for Tsd<K, V> {
    fn peek_ref(&self) -> &HashMap<K, V> {
        &self.value
    }
}

/// Builds a `TSD[K,V]` accumulator from a stream of keyed deltas.
pub fn tsd<K: Element + Eq + Hash, V: Element>(
    source: Rc<dyn Stream<TsdDelta<K, V>>>,
) -> Rc<dyn Stream<HashMap<K, V>>> {
    Tsd::new(source).into_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{Graph, NanoTime, RunFor, RunMode, StreamPeek};
    use std::time::Duration;

    fn deltas_for(cycle: u64) -> TsdDelta<i32, i32> {
        match cycle {
            0 => HashMap::from([(1, Delta::Value(1))]),
            1 => HashMap::from([(2, Delta::Value(2))]),
            2 => HashMap::new(),
            3 => HashMap::from([(1, Delta::Value(3))]),
            _ => HashMap::new(),
        }
    }

    #[test]
    fn map_plus_one_tracks_added_modified_removed() {
        let source = ticker(Duration::from_millis(1)).count();
        let deltas = source.map(|x| deltas_for(x - 1));
        let mapped = deltas.map(|d: TsdDelta<i32, i32>| {
            d.into_iter()
                .map(|(k, delta)| (k, delta.value().map(|v| v + 1).map_or(Delta::Remove, Delta::Value)))
                .collect::<TsdDelta<i32, i32>>()
        });
        let dict = Tsd::new(mapped);
        let dict = Rc::new(std::cell::RefCell::new(dict));
        let node = dict.clone().as_node();
        Graph::new(
            vec![node],
            RunMode::HistoricalFrom(NanoTime::ZERO),
            RunFor::Cycles(4),
        )
        .run()
        .unwrap();
        assert_eq!(dict.borrow().value().get(&1), Some(&4));
        assert_eq!(dict.borrow().value().get(&2), Some(&3));
    }
}
