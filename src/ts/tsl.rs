//! `TSL[T,N]`: a fixed-length list of N child time-series of the same shape
//! T (§3.2). Modelled as a node that observes its N children passively and
//! republishes the subset that ticked this cycle as `delta_value`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::{AsNode, Element, GraphState, IntoStream, MutableNode, Stream, StreamPeekRef, UpStreams};

/// Fixed-size list of N child time-series, all of shape `T`.
pub struct Tsl<T: Element, const N: usize> {
    children: [Rc<dyn Stream<T>>; N],
    value: [T; N],
    delta_value: HashMap<usize, T>,
    node_indices: Vec<usize>,
}

impl<T: Element, const N: usize> Tsl<T, N> {
    pub fn new(children: [Rc<dyn Stream<T>>; N]) -> Self {
        Self {
            children,
            value: std::array::from_fn(|_| T::default()),
            delta_value: HashMap::new(),
            node_indices: Vec::new(),
        }
    }

    pub fn value(&self) -> &[T; N] {
        &self.value
    }

    pub fn delta_value(&self) -> &HashMap<usize, T> {
        &self.delta_value
    }
}

impl<T: Element, const N: usize> MutableNode for Tsl<T, N> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        self.delta_value.clear();
        for (i, (child, node_index)) in self.children.iter().zip(self.node_indices.iter()).enumerate() {
            if state.node_index_ticked(*node_index) {
                let v = child.peek_value();
                self.value[i] = v.clone();
                self.delta_value.insert(i, v);
            }
        }
        !self.delta_value.is_empty()
    }

    fn setup(&mut self, state: &mut GraphState) {
        self.node_indices = self
            .children
            .iter()
            .map(|child| {
                state
                    .node_index(child.clone().as_node())
                    .expect("TSL child not wired into graph")
            })
            .collect();
    }

    fn upstreams(&self) -> UpStreams {
        let nodes = self.children.iter().map(|c| c.clone().as_node()).collect();
        UpStreams::new(nodes, vec![])
    }
}

impl<T: Element, const N: usize> StreamPeekRef<[T; N]> for Tsl<T, N> {
    fn peek_ref(&self) -> &[T; N] {
        &self.value
    }
}

/// Builds a `TSL[T,N]` node from its N children.
pub fn tsl<T: Element, const N: usize>(children: [Rc<dyn Stream<T>>; N]) -> Rc<dyn Stream<[T; N]>> {
    Tsl::new(children).into_stream()
}
