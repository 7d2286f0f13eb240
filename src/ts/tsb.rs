//! `TSB[S]`: a named bundle — a fixed, ordered schema mapping field name to
//! a child time-series of (possibly heterogeneous) shape (§3.2, §11.5).
//!
//! Unlike `TSL`, there is no derive macro: each concrete schema struct hand
//! writes its own [Bundle] impl, in the manner `wingfoil-derive` would have
//! generated had it shipped with retrievable source (it didn't, and is
//! dropped — see `DESIGN.md`).

use std::cell::RefCell;
use std::rc::Rc;

use crate::{AsNode, GraphState, MutableNode, Node, UpStreams};

/// A fixed, ordered schema of named child time-series. Implement this for a
/// struct whose fields are each `Rc<dyn Stream<_>>` to get a `TSB`.
pub trait Bundle: Sized + 'static {
    /// Field names in declaration order.
    fn field_names() -> &'static [&'static str];
    /// The child node backing a given field, for wiring purposes.
    fn field_node(&self, name: &str) -> Option<Rc<dyn Node>>;
    /// All child nodes, in schema order.
    fn field_nodes(&self) -> Vec<Rc<dyn Node>> {
        Self::field_names()
            .iter()
            .filter_map(|name| self.field_node(name))
            .collect()
    }
}

/// A node wrapping a [Bundle] schema `S`, tracking which fields ticked this
/// cycle. `value`/`delta_value` semantics mirror `TSL`, keyed by field name
/// instead of index (§3.2).
pub struct Tsb<S: Bundle> {
    schema: S,
    node_indices: Vec<(String, usize)>,
    modified: Vec<String>,
}

impl<S: Bundle> Tsb<S> {
    pub fn new(schema: S) -> Self {
        Self {
            schema,
            node_indices: Vec::new(),
            modified: Vec::new(),
        }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Field names that ticked this cycle.
    pub fn modified_fields(&self) -> &[String] {
        &self.modified
    }
}

impl<S: Bundle> MutableNode for Tsb<S> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        self.modified.clear();
        for (name, index) in &self.node_indices {
            if state.node_index_ticked(*index) {
                self.modified.push(name.clone());
            }
        }
        !self.modified.is_empty()
    }

    fn setup(&mut self, state: &mut GraphState) {
        self.node_indices = self
            .schema
            .field_nodes()
            .into_iter()
            .zip(S::field_names())
            .map(|(node, name)| {
                let index = state
                    .node_index(node)
                    .expect("TSB field not wired into graph");
                ((*name).to_string(), index)
            })
            .collect();
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(self.schema.field_nodes(), vec![])
    }
}

/// Builds a `TSB[S]` node from a populated schema struct.
pub fn tsb<S: Bundle>(schema: S) -> Rc<RefCell<Tsb<S>>> {
    Rc::new(RefCell::new(Tsb::new(schema)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::Stream;
    use std::time::Duration;

    struct QuoteSchema {
        bid: Rc<dyn Stream<i32>>,
        ask: Rc<dyn Stream<i32>>,
    }

    impl Bundle for QuoteSchema {
        fn field_names() -> &'static [&'static str] {
            &["bid", "ask"]
        }
        fn field_node(&self, name: &str) -> Option<Rc<dyn Node>> {
            match name {
                "bid" => Some(self.bid.clone().as_node()),
                "ask" => Some(self.ask.clone().as_node()),
                _ => None,
            }
        }
    }

    #[test]
    fn field_nodes_follow_schema_order() {
        let source = ticker(Duration::from_millis(1)).count();
        let bid = source.map(|x| x as i32);
        let ask = source.map(|x| x as i32 + 1);
        let bundle = tsb(QuoteSchema { bid, ask });
        assert_eq!(bundle.borrow().schema().field_nodes().len(), 2);
        assert!(bundle.borrow().modified_fields().is_empty());
    }
}
