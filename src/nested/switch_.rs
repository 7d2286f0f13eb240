//! `switch_`: exactly one active sub-graph, chosen by the current value of
//! a control stream. Swapping to a new key tears down the previous
//! sub-graph and instantiates the new one; ticks unrelated to a key change
//! simply re-step the already-active sub-graph (§4.5, sibling of `map_`).

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use crate::nested::InputCell;
use crate::signature::{NodeSignature, NodeTypeEnum};
use crate::{AsNode, Element, Graph, GraphState, MutableNode, Node, RunFor, RunMode, Stream, StreamPeekRef, UpStreams};

/// Builds the sub-graph for a given switch key: feed-in cell, root nodes to
/// wire, and output stream — the same contract as `map_`'s factory.
pub trait SwitchFactory<K, V: Element, OUT: Element> {
    fn build(&self, key: &K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>);
}

impl<K, V, OUT, F> SwitchFactory<K, V, OUT> for F
where
    V: Element,
    OUT: Element,
    F: Fn(&K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>),
{
    fn build(&self, key: &K) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>) {
        self(key)
    }
}

struct Active<V: Element, OUT: Element> {
    key_hash: u64,
    graph: Graph,
    input: Rc<RefCell<InputCell<V>>>,
    output: Rc<dyn Stream<OUT>>,
}

/// Switches between sub-graphs as `key` changes; re-steps the currently
/// active one on every `value` tick.
pub struct SwitchNode<K: Element + Eq + Hash, V: Element, OUT: Element, F: SwitchFactory<K, V, OUT>> {
    key: Rc<dyn Stream<K>>,
    value: Rc<dyn Stream<V>>,
    factory: F,
    active: Option<Active<V, OUT>>,
    output: OUT,
    /// When true, a key-stream tick always reloads the sub-graph even if
    /// the key value is unchanged from the one currently active (§4.5.3).
    reload_on_ticked: bool,
    signature: NodeSignature,
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<K: Element + Eq + Hash, V: Element, OUT: Element, F: SwitchFactory<K, V, OUT>> SwitchNode<K, V, OUT, F> {
    pub fn new(key: Rc<dyn Stream<K>>, value: Rc<dyn Stream<V>>, factory: F, reload_on_ticked: bool) -> Self {
        Self {
            key,
            value,
            factory,
            active: None,
            output: OUT::default(),
            reload_on_ticked,
            signature: NodeSignature::new("switch_", NodeTypeEnum::Compute, "switch_"),
        }
    }

    pub fn value(&self) -> &OUT {
        &self.output
    }

    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }
}

impl<K: Element + Eq + Hash, V: Element, OUT: Element, F: SwitchFactory<K, V, OUT>> MutableNode
    for SwitchNode<K, V, OUT, F>
{
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        let key = self.key.peek_value();
        let key_hash = hash_of(&key);
        let key_ticked = state.ticked(self.key.clone().as_node());
        let needs_switch = match &self.active {
            Some(active) => active.key_hash != key_hash || (self.reload_on_ticked && key_ticked),
            None => true,
        };
        if needs_switch {
            if let Some(mut prev) = self.active.take() {
                prev.graph.finalise_embedded();
            }
            let (input, nodes, output) = self.factory.build(&key);
            let mut graph = Graph::new(nodes, RunMode::HistoricalFrom(state.time()), RunFor::Forever);
            graph.initialise_embedded();
            self.active = Some(Active { key_hash, graph, input, output });
        }
        let active = self.active.as_mut().expect("just set above");
        active.input.borrow_mut().value = self.value.peek_value();
        let input_node = active.input.clone().as_node();
        active.graph.step(state.time(), &[input_node]);
        self.output = active.output.peek_value();
        true
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(
            vec![self.key.clone().as_node(), self.value.clone().as_node()],
            vec![],
        )
    }

    fn teardown(&mut self, _state: &mut GraphState) {
        if let Some(mut active) = self.active.take() {
            active.graph.finalise_embedded();
        }
    }
}

impl<K: Element + Eq + Hash, V: Element, OUT: Element, F: SwitchFactory<K, V, OUT>> StreamPeekRef<OUT>
    for SwitchNode<K, V, OUT, F>
{
    fn peek_ref(&self) -> &OUT {
        &self.output
    }
}

/// Builds a `switch_` node: `key` selects which sub-graph is active,
/// `value` is fed into whichever sub-graph `factory` builds for that key.
/// `reload_on_ticked` forces a reload on every key-stream tick, not just a
/// key *value* change (§4.5.3) — useful when the factory should re-run even
/// for a same-valued republish of the key.
pub fn switch_<K, V, OUT, F>(
    key: Rc<dyn Stream<K>>,
    value: Rc<dyn Stream<V>>,
    factory: F,
    reload_on_ticked: bool,
) -> Rc<RefCell<SwitchNode<K, V, OUT, F>>>
where
    K: Element + Eq + Hash,
    V: Element,
    OUT: Element,
    F: SwitchFactory<K, V, OUT>,
{
    Rc::new(RefCell::new(SwitchNode::new(key, value, factory, reload_on_ticked)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{Graph as TopGraph, NanoTime, RunFor as TopRunFor, RunMode as TopRunMode};
    use std::time::Duration;

    fn double_or_negate(key: &bool) -> (Rc<RefCell<InputCell<i32>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<i32>>) {
        let input = Rc::new(RefCell::new(InputCell::new(0)));
        let input_stream: Rc<dyn Stream<i32>> = input.clone();
        let output = if *key {
            input_stream.map(|v| v * 2)
        } else {
            input_stream.map(|v| -v)
        };
        let nodes = vec![output.clone().as_node()];
        (input, nodes, output)
    }

    #[test]
    fn switches_sub_graph_when_key_changes() {
        let source = ticker(Duration::from_millis(1)).count();
        let key = source.map(|x| x % 2 == 0);
        let value = source.map(|x| x as i32);
        let switched = switch_(key, value, double_or_negate, false);
        let node = switched.clone().as_node();
        TopGraph::new(
            vec![node],
            TopRunMode::HistoricalFrom(NanoTime::ZERO),
            TopRunFor::Cycles(3),
        )
        .run()
        .unwrap();
        // cycle 3 (1-indexed): count=3 (odd) -> key=false -> negate(3) = -3
        assert_eq!(*switched.borrow().value(), -3);
    }

    #[test]
    fn reload_on_ticked_reinstantiates_even_for_a_same_valued_key() {
        use std::cell::Cell;
        use std::rc::Rc as StdRc;

        let builds = StdRc::new(Cell::new(0_u32));
        let builds_for_factory = builds.clone();
        let counting_factory = move |_key: &bool| {
            builds_for_factory.set(builds_for_factory.get() + 1);
            let input = Rc::new(RefCell::new(InputCell::new(0)));
            let input_stream: Rc<dyn Stream<i32>> = input.clone();
            let output = input_stream.map(|v| v + 1);
            let nodes = vec![output.clone().as_node()];
            (input, nodes, output)
        };

        let source = ticker(Duration::from_millis(1)).count();
        let key = constant(true).sample(source.clone().as_node());
        let value = source.map(|x| x as i32);
        let switched = switch_(key, value, counting_factory, true);
        let node = switched.clone().as_node();
        TopGraph::new(
            vec![node],
            TopRunMode::HistoricalFrom(NanoTime::ZERO),
            TopRunFor::Cycles(3),
        )
        .run()
        .unwrap();
        // key never changes value, but every key tick forces a rebuild.
        assert_eq!(builds.get(), 3);
    }
}
