//! `reduce`: a specialisation of `map_` (§4.5.2) — one feed-in sub-graph is
//! instantiated per key seen in a `TSD[K,V]`, exactly as `map_` does, and
//! the resulting per-key snapshot is folded down to a single `TS[V]` with a
//! binary `op: (V, V) -> V` and a `zero`. Associative ops fold over a
//! balanced binary tree (rebalances cheaply as keys come and go);
//! non-associative ops fold strictly left-to-right over keys in sorted
//! order so the result stays deterministic and reproducible cycle to cycle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::nested::cell::InputCell;
use crate::nested::map_::{MapFactory, MapNode};
use crate::{AsNode, Element, GraphState, IntoStream, MutableNode, Node, Stream, StreamPeekRef, UpStreams};
use crate::ts::TsdDelta;

/// Per-key sub-graph for `reduce`: a bare feed-in cell whose output is the
/// cell's own value. `reduce` folds values, not sub-graph *shapes*, so the
/// instantiated sub-graph only needs to exist, not transform anything.
struct IdentityFactory;

impl<K, V: Element> MapFactory<K, V, V> for IdentityFactory {
    fn build(&self, _key: &K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<V>>) {
        let input = Rc::new(RefCell::new(InputCell::new(V::default())));
        let input_stream: Rc<dyn Stream<V>> = input.clone();
        let nodes = vec![input.clone().as_node()];
        (input, nodes, input_stream)
    }
}

/// Folds the `HashMap<K, V>` snapshot maintained by an inner `map_` down to
/// a single `V` with `op`/`zero`, ticking whenever a key is added, removed,
/// or its value changes.
pub struct ReduceNode<K: Element + Eq + Hash + Ord, V: Element, Op: Fn(&V, &V) -> V> {
    mapped: MapNode<K, V, V, IdentityFactory>,
    op: Op,
    zero: V,
    associative: bool,
    value: V,
}

impl<K: Element + Eq + Hash + Ord, V: Element, Op: Fn(&V, &V) -> V> ReduceNode<K, V, Op> {
    pub fn new(source: Rc<dyn Stream<TsdDelta<K, V>>>, op: Op, zero: V, associative: bool) -> Self {
        Self {
            mapped: MapNode::new(source, IdentityFactory),
            op,
            zero,
            associative,
            value: V::default(),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn signature(&self) -> &crate::signature::NodeSignature {
        self.mapped.signature()
    }

    fn fold(&self, keys: &[K]) -> V {
        let values: Vec<V> = keys
            .iter()
            .map(|k| self.mapped.value().get(k).expect("key drawn from the current snapshot").clone())
            .collect();
        if self.associative {
            self.fold_tree(&values)
        } else {
            values.iter().fold(self.zero.clone(), |acc, v| (self.op)(&acc, v))
        }
    }

    fn fold_tree(&self, values: &[V]) -> V {
        match values.len() {
            0 => self.zero.clone(),
            1 => values[0].clone(),
            n => {
                let mid = n / 2;
                let left = self.fold_tree(&values[..mid]);
                let right = self.fold_tree(&values[mid..]);
                (self.op)(&left, &right)
            }
        }
    }
}

impl<K: Element + Eq + Hash + Ord, V: Element, Op: Fn(&V, &V) -> V> MutableNode for ReduceNode<K, V, Op> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        let ticked = self.mapped.cycle(state);
        if ticked {
            let mut keys: Vec<K> = self.mapped.value().keys().cloned().collect();
            keys.sort();
            self.value = self.fold(&keys);
        }
        ticked
    }

    fn upstreams(&self) -> UpStreams {
        self.mapped.upstreams()
    }

    fn teardown(&mut self, state: &mut GraphState) {
        self.mapped.teardown(state);
    }
}

impl<K: Element + Eq + Hash + Ord, V: Element, Op: Fn(&V, &V) -> V> StreamPeekRef<V> for ReduceNode<K, V, Op> {
    fn peek_ref(&self) -> &V {
        &self.value
    }
}

/// Folds a `TSD[K,V]` with an associative `op`: addition, multiplication,
/// min/max and the like, where grouping doesn't affect the result. Folded
/// over a balanced binary tree rather than a strict left fold.
pub fn reduce<K, V, Op>(source: Rc<dyn Stream<TsdDelta<K, V>>>, op: Op, zero: V) -> Rc<dyn Stream<V>>
where
    K: Element + Eq + Hash + Ord,
    V: Element,
    Op: Fn(&V, &V) -> V + 'static,
{
    ReduceNode::new(source, op, zero, true).into_stream()
}

/// Folds a `TSD[K,V]` with a non-associative `op`: subtraction, string
/// concatenation and the like, where the result depends on evaluation
/// order. Always folds strictly left-to-right over keys in sorted order.
pub fn reduce_non_associative<K, V, Op>(source: Rc<dyn Stream<TsdDelta<K, V>>>, op: Op, zero: V) -> Rc<dyn Stream<V>>
where
    K: Element + Eq + Hash + Ord,
    V: Element,
    Op: Fn(&V, &V) -> V + 'static,
{
    ReduceNode::new(source, op, zero, false).into_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::ts::Delta;
    use crate::{NanoTime, RunFor, RunMode, StreamPeek};
    use std::time::Duration;

    fn deltas_for(cycle: u64) -> TsdDelta<i32, i64> {
        match cycle {
            0 => HashMap::from([(1, Delta::Value(1))]),
            1 => HashMap::from([(2, Delta::Value(2))]),
            2 => HashMap::new(),
            3 => HashMap::from([(1, Delta::Value(3))]),
            _ => HashMap::new(),
        }
    }

    #[test]
    fn reduce_simple_sums_a_growing_tsd() {
        let source = ticker(Duration::from_millis(1)).count();
        let deltas = source.map(|x| deltas_for(x - 1));
        let summed = reduce(deltas, |a: &i64, b: &i64| a + b, 0_i64);
        let history = summed.clone().accumulate();
        Graph::new(
            vec![history.clone().as_node()],
            RunMode::HistoricalFrom(NanoTime::ZERO),
            RunFor::Cycles(4),
        )
        .run()
        .unwrap();
        // cycle 1: {1:1} -> 1
        // cycle 2: {1:1,2:2} -> 3
        // cycle 3: no delta -> no tick, history unchanged
        // cycle 4: {1:3,2:2} -> 5
        assert_eq!(history.peek_value(), vec![1, 3, 5]);
    }

    #[test]
    fn reduce_non_associative_folds_left_to_right_in_key_order() {
        let source = ticker(Duration::from_millis(1)).count();
        let deltas = source.map(|x| deltas_for(x - 1));
        let folded = reduce_non_associative(deltas, |a: &i64, b: &i64| a - b, 0_i64);
        folded
            .clone()
            .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .unwrap();
        // cycle 4 snapshot {1:3,2:2}, sorted keys [1,2]: ((0-3)-2) = -5
        assert_eq!(folded.peek_value(), -5);
    }
}
