//! `map_`: one sub-graph instance per key present in a `TSD` input (§4.5.1).
//! Sub-graphs are instantiated on key-add and disposed on key-remove; the
//! outer output is a `TSD` whose values are the corresponding sub-graph's
//! output.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use crate::nested::cell::InputCell;
use crate::signature::{NodeSignature, NodeTypeEnum};
use crate::ts::{Delta, TsdDelta};
use crate::{
    AsNode, Element, Graph, GraphState, MutableNode, Node, RunFor, RunMode, Stream, StreamPeekRef, UpStreams,
};

struct SubGraph<V: Element, OUT: Element> {
    graph: Graph,
    input: Rc<RefCell<InputCell<V>>>,
    output: Rc<dyn Stream<OUT>>,
}

/// Builds the nodes of one sub-graph instance for a given key: the feed-in
/// input cell, every root node the sub-graph needs wired (must include the
/// input cell and anything reachable from `output`), and the sub-graph's
/// output stream.
pub trait MapFactory<K, V: Element, OUT: Element> {
    fn build(&self, key: &K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>);
}

impl<K, V, OUT, F> MapFactory<K, V, OUT> for F
where
    V: Element,
    OUT: Element,
    F: Fn(&K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>),
{
    fn build(&self, key: &K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>) {
        self(key)
    }
}

/// Instantiates and steps one sub-graph per key seen in `source`'s deltas.
pub struct MapNode<K: Element + Eq + Hash, V: Element, OUT: Element, F: MapFactory<K, V, OUT>> {
    source: Rc<dyn Stream<TsdDelta<K, V>>>,
    factory: F,
    signature: NodeSignature,
    subgraphs: HashMap<K, SubGraph<V, OUT>>,
    value: HashMap<K, OUT>,
    added: HashSet<K>,
    removed: HashSet<K>,
    modified: HashSet<K>,
}

impl<K: Element + Eq + Hash, V: Element, OUT: Element, F: MapFactory<K, V, OUT>> MapNode<K, V, OUT, F> {
    pub fn new(source: Rc<dyn Stream<TsdDelta<K, V>>>, factory: F) -> Self {
        Self {
            source,
            factory,
            signature: NodeSignature::new("map_", NodeTypeEnum::Compute, "map_"),
            subgraphs: HashMap::new(),
            value: HashMap::new(),
            added: HashSet::new(),
            removed: HashSet::new(),
            modified: HashSet::new(),
        }
    }

    pub fn value(&self) -> &HashMap<K, OUT> {
        &self.value
    }
    pub fn added_items(&self) -> &HashSet<K> {
        &self.added
    }
    pub fn removed_items(&self) -> &HashSet<K> {
        &self.removed
    }
    pub fn modified_items(&self) -> &HashSet<K> {
        &self.modified
    }
    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }
}

impl<K: Element + Eq + Hash, V: Element, OUT: Element, F: MapFactory<K, V, OUT>> MutableNode for MapNode<K, V, OUT, F> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        self.added.clear();
        self.removed.clear();
        self.modified.clear();
        for (key, delta) in self.source.peek_value() {
            match delta {
                Delta::Remove => {
                    if let Some(mut sub) = self.subgraphs.remove(&key) {
                        sub.graph.finalise_embedded();
                        self.value.remove(&key);
                        self.removed.insert(key);
                    }
                }
                Delta::Value(v) => {
                    let is_new = !self.subgraphs.contains_key(&key);
                    if is_new {
                        let (input, nodes, output) = self.factory.build(&key);
                        let mut graph = Graph::new(nodes, RunMode::HistoricalFrom(state.time()), RunFor::Forever);
                        graph.initialise_embedded();
                        self.subgraphs.insert(key.clone(), SubGraph { graph, input, output });
                    }
                    let sub = self.subgraphs.get_mut(&key).expect("just inserted or already present");
                    sub.input.borrow_mut().value = v;
                    let input_node = sub.input.clone().as_node();
                    sub.graph.step(state.time(), &[input_node]);
                    self.value.insert(key.clone(), sub.output.peek_value());
                    if is_new {
                        self.added.insert(key);
                    } else {
                        self.modified.insert(key);
                    }
                }
            }
        }
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }

    fn teardown(&mut self, _state: &mut GraphState) {
        for (_, mut sub) in self.subgraphs.drain() {
            sub.graph.finalise_embedded();
        }
    }
}

/// Builds a `map_` node applying `factory` to every key present in
/// `source`'s deltas, one sub-graph instance per key.
pub fn map_<K, V, OUT, F>(source: Rc<dyn Stream<TsdDelta<K, V>>>, factory: F) -> Rc<RefCell<MapNode<K, V, OUT, F>>>
where
    K: Element + Eq + Hash,
    V: Element,
    OUT: Element,
    F: MapFactory<K, V, OUT>,
{
    Rc::new(RefCell::new(MapNode::new(source, factory)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{Graph as TopGraph, NanoTime, RunFor as TopRunFor, RunMode as TopRunMode};
    use std::time::Duration;

    fn plus_one_factory(_key: &i32) -> (Rc<RefCell<InputCell<i32>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<i32>>) {
        let input = Rc::new(RefCell::new(InputCell::new(0)));
        let input_stream: Rc<dyn Stream<i32>> = input.clone();
        let output = input_stream.map(|v| v + 1);
        let nodes = vec![output.clone().as_node()];
        (input, nodes, output)
    }

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
    fn map_plus_one_over_dynamic_keys() {
        let source = ticker(Duration::from_millis(1)).count();
        let deltas = source.map(|x| deltas_for(x - 1));
        let mapped = map_(deltas, plus_one_factory);
        let node = mapped.clone().as_node();
        TopGraph::new(
            vec![node],
            TopRunMode::HistoricalFrom(NanoTime::ZERO),
            TopRunFor::Cycles(4),
        )
        .run()
        .unwrap();
        assert_eq!(mapped.borrow().value().get(&1), Some(&4));
        assert_eq!(mapped.borrow().value().get(&2), Some(&3));
    }
}
