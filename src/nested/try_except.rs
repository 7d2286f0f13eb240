//! `try_except`: steps an embedded sub-graph, catching a panicking node body
//! instead of letting it tear down the parent graph. The last successful
//! output is held and republished on a tick that failed; the failure itself
//! is captured into a [crate::error::NodeError] and surfaced on a separate
//! error output (§4.5.4, §7).

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::error::NodeError;
use crate::nested::InputCell;
use crate::signature::{NodeSignature, NodeTypeEnum};
use crate::{AsNode, Element, Graph, GraphState, MutableNode, Node, RunFor, RunMode, Stream, StreamPeekRef, UpStreams};

/// Builds the embedded sub-graph guarded by `try_except`: feed-in cell,
/// root nodes to wire, and output stream.
pub trait TryExceptFactory<V: Element, OUT: Element> {
    fn build(&self) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>);
}

impl<V, OUT, F> TryExceptFactory<V, OUT> for F
where
    V: Element,
    OUT: Element,
    F: Fn() -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>),
{
    fn build(&self) -> (Rc<RefCell<InputCell<V>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<OUT>>) {
        self()
    }
}

pub struct TryExceptNode<V: Element, OUT: Element, F: TryExceptFactory<V, OUT>> {
    source: Rc<dyn Stream<V>>,
    factory: F,
    node_path: String,
    signature: NodeSignature,
    graph: Option<Graph>,
    input: Option<Rc<RefCell<InputCell<V>>>>,
    output: Option<Rc<dyn Stream<OUT>>>,
    value: OUT,
    error: Option<NodeError>,
}

impl<V: Element, OUT: Element, F: TryExceptFactory<V, OUT>> TryExceptNode<V, OUT, F> {
    pub fn new(
        source: Rc<dyn Stream<V>>,
        node_path: impl Into<String>,
        factory: F,
        trace_back_depth: u32,
    ) -> Self {
        let node_path = node_path.into();
        let signature = NodeSignature::new(node_path.clone(), NodeTypeEnum::Compute, node_path.clone())
            .copy_with(
                crate::signature::NodeSignatureOverrides::default()
                    .capture_exception(true)
                    .trace_back_depth(trace_back_depth),
            );
        Self {
            source,
            factory,
            node_path,
            signature,
            graph: None,
            input: None,
            output: None,
            value: OUT::default(),
            error: None,
        }
    }

    /// The node's signature — `try_except` is the engine's implicit
    /// try-wrapper (§7), so `capture_exception` is always true here;
    /// `trace_back_depth` is whatever the caller passed to [try_except].
    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }

    /// The sub-graph's last successfully produced value.
    pub fn value(&self) -> &OUT {
        &self.value
    }

    /// `Some` on a cycle the sub-graph's step panicked; cleared on the next
    /// successful cycle.
    pub fn error(&self) -> Option<&NodeError> {
        self.error.as_ref()
    }
}

impl<V: Element, OUT: Element, F: TryExceptFactory<V, OUT>> MutableNode for TryExceptNode<V, OUT, F> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        let input = self.input.as_ref().expect("set up in setup()");
        input.borrow_mut().value = self.source.peek_value();
        let input_node = input.clone().as_node();
        let time = state.time();

        let graph = self.graph.as_mut().expect("set up in setup()");
        let output = self.output.as_ref().expect("set up in setup()");
        let result = catch_unwind(AssertUnwindSafe(|| {
            graph.step(time, &[input_node]);
            output.peek_value()
        }));

        match result {
            Ok(value) => {
                self.value = value;
                self.error = None;
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "sub-graph panicked with a non-string payload".to_string());
                let err = anyhow::anyhow!(message);
                self.error = Some(NodeError::capture(
                    &err,
                    self.node_path.clone(),
                    time,
                    self.signature.trace_back_depth as usize,
                ));
            }
        }
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

impl<V: Element, OUT: Element, F: TryExceptFactory<V, OUT>> StreamPeekRef<OUT> for TryExceptNode<V, OUT, F> {
    fn peek_ref(&self) -> &OUT {
        &self.value
    }
}

/// Builds a `try_except` node: steps the sub-graph `factory` builds,
/// catching a panic in its evaluation instead of propagating it.
/// `trace_back_depth` bounds how many links of the captured error's chain
/// are kept in the published [NodeError::traceback] (§7).
pub fn try_except<V, OUT, F>(
    source: Rc<dyn Stream<V>>,
    node_path: impl Into<String>,
    factory: F,
    trace_back_depth: u32,
) -> Rc<RefCell<TryExceptNode<V, OUT, F>>>
where
    V: Element,
    OUT: Element,
    F: TryExceptFactory<V, OUT>,
{
    Rc::new(RefCell::new(TryExceptNode::new(source, node_path, factory, trace_back_depth)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{NanoTime, RunFor as TopRunFor, RunMode as TopRunMode};
    use std::time::Duration;

    fn panics_on_three() -> (Rc<RefCell<InputCell<i32>>>, Vec<Rc<dyn Node>>, Rc<dyn Stream<i32>>) {
        let input = Rc::new(RefCell::new(InputCell::new(0)));
        let input_stream: Rc<dyn Stream<i32>> = input.clone();
        let output = input_stream.map(|v| {
            if v == 3 {
                panic!("boom");
            }
            v * 2
        });
        let nodes = vec![output.clone().as_node()];
        (input, nodes, output)
    }

    #[test]
    fn captures_panic_and_holds_last_good_value() {
        let source = ticker(Duration::from_millis(1)).count().map(|x| x as i32);
        let guarded = try_except(source, "guarded", panics_on_three, 4);
        let node = guarded.clone().as_node();
        node.run(TopRunMode::HistoricalFrom(NanoTime::ZERO), TopRunFor::Cycles(4))
            .unwrap();
        let g = guarded.borrow();
        // cycle 3 panics; value holds the cycle-2 result (2*2=4); cycle 4
        // recovers and resumes producing fresh output (4*2=8).
        assert_eq!(*g.value(), 8);
        assert!(g.error().is_none());
    }

    #[test]
    fn captured_error_carries_a_traceback_and_the_node_path() {
        let source = ticker(Duration::from_millis(1)).count().map(|x| x as i32);
        let guarded = try_except(source, "guarded", panics_on_three, 4);
        let node = guarded.clone().as_node();
        node.run(TopRunMode::HistoricalFrom(NanoTime::ZERO), TopRunFor::Cycles(3))
            .unwrap();
        let g = guarded.borrow();
        assert_eq!(g.signature().trace_back_depth, 4);
        assert!(g.signature().capture_exception);
        let err = g.error().expect("cycle 3 panicked");
        assert_eq!(err.node_path, "guarded");
        assert!(!err.traceback.is_empty());
    }
}
