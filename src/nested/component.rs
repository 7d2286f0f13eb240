//! `component`: a single, persistent embedded sub-graph instance — the
//! simplest member of the nested-graph family, a degenerate `map_`/`switch_`
//! with exactly one always-present instance built once at `setup` (§4.5.3).

use std::cell::RefCell;
use std::rc::Rc;

use crate::nested::InputCell;
use crate::signature::{NodeSignature, NodeTypeEnum};
use crate::{AsNode, Element, Graph, GraphState, MutableNode, Node, RunFor, RunMode, Stream, StreamPeekRef, UpStreams};

/// Builds the single embedded sub-graph: feed-in cell, root nodes to wire,
/// and output stream.
pub trait ComponentFactory<V: Element, OUT: Element> {
    fn build(&self) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>);
}

impl<V, OUT, F> ComponentFactory<V, OUT> for F
where
    V: Element,
    OUT: Element,
    F: Fn() -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>),
{
    fn build(&self) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>) {
        self()
    }
}

/// Steps one persistent embedded sub-graph once per tick of `source`,
/// feeding it `source`'s current value and republishing its output.
pub struct ComponentNode<V: Element, OUT: Element, F: ComponentFactory<V, OUT>> {
    source: Rc<dyn Stream<V>>,
    factory: F,
    signature: NodeSignature,
    graph: Option<Graph>,
    input: Option<Rc<RefCell<InputCell<V>>>>,
    output: Option<Rc<dyn Stream<OUT>>>,
    value: OUT,
}

impl<V: Element, OUT: Element, F: ComponentFactory<V, OUT>> ComponentNode<V, OUT, F> {
    pub fn new(source: Rc<dyn Stream<V>>, name: impl Into<String>, factory: F) -> Self {
        let name = name.into();
        Self {
            source,
            factory,
            signature: NodeSignature::new(name.clone(), NodeTypeEnum::Compute, name),
            graph: None,
            input: None,
            output: None,
            value: OUT::default(),
        }
    }

    pub fn value(&self) -> &OUT {
        &self.value
    }

    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }
}

impl<V: Element, OUT: Element, F: ComponentFactory<V, OUT>> MutableNode for ComponentNode<V, OUT, F> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        let input = self.input.as_ref().expect("set up in setup()");
        input.borrow_mut().value = self.source.peek_value();
        let input_node = input.clone().as_node();
        let graph = self.graph.as_mut().expect("set up in setup()");
        graph.step(state.time(), &[input_node]);
        self.value = self.output.as_ref().expect("set up in setup()").peek_value();
        true
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }

    fn setup(&mut self, state: &mut GraphState) {
        let (input, nodes, output) = self.factory.build();
        let mut graph = Graph::new(nodes, RunMode::HistoricalFrom(state.time()), RunFor::Forever);
        graph.initialise_embedded();
        self.input = Some(input);
        self.output = Some(output);
        self.graph = Some(graph);
    }

    fn teardown(&mut self, _state: &mut GraphState) {
        if let Some(mut graph) = self.graph.take() {
            graph.finalise_embedded();
        }
    }
}

impl<V: Element, OUT: Element, F: ComponentFactory<V, OUT>> StreamPeekRef<OUT> for ComponentNode<V, OUT, F> {
    fn peek_ref(&self) -> &OUT {
        &self.value
    }
}

/// Builds a `component` node: a single persistent sub-graph built once by
/// `factory`, fed `source`'s value every tick. `name` becomes the node's
/// signature name and wiring path (§4.5).
pub fn component<V, OUT, F>(
    source: Rc<dyn Stream<V>>,
    name: impl Into<String>,
    factory: F,
) -> Rc<RefCell<ComponentNode<V, OUT, F>>>
where
    V: Element,
    OUT: Element,
    F: ComponentFactory<V, OUT>,
{
    Rc::new(RefCell::new(ComponentNode::new(source, name, factory)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{NanoTime, RunFor as TopRunFor, RunMode as TopRunMode, StreamPeek};
    use std::time::Duration;

    fn plus_ten() -> (Rc<RefCell<InputCell<i32>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<i32>>) {
        let input = Rc::new(RefCell::new(InputCell::new(0)));
        let input_stream: Rc<dyn Stream<i32>> = input.clone();
        let output = input_stream.map(|v| v + 10);
        let nodes = vec![output.clone().as_node()];
        (input, nodes, output)
    }

    #[test]
    fn component_steps_its_sub_graph_every_tick() {
        let source = ticker(Duration::from_millis(1)).count().map(|x| x as i32);
        let comp = component(source, "comp", plus_ten);
        let node = comp.clone().as_node();
        node.run(TopRunMode::HistoricalFrom(NanoTime::ZERO), TopRunFor::Cycles(3))
            .unwrap();
        assert_eq!(*comp.borrow().value(), 13);
    }
}
