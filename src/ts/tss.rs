//! `TSS[T]`: a time-series of sets (§3.2, §4.4.2). The input side accepts a
//! stream of [SetDelta]s and accumulates them into the live set; `value` is
//! the full set, `delta_value` the change applied this cycle.

use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

use derive_new::new;

use crate::ts::{set_delta_int, SetDelta};
use crate::{AsNode, Element, GraphState, IntoStream, MutableNode, Stream, StreamPeekRef, UpStreams};

/// Accumulates a stream of [SetDelta]s into a live set.
#[derive(new)]
pub struct Tss<T: Element + Eq + Hash> {
    source: Rc<dyn Stream<SetDelta<T>>>,
    #[new(default)]
    value: HashSet<T>,
    #[new(default)]
    delta_value: SetDelta<T>,
}

impl<T: Element + Eq + Hash> Tss<T> {
    pub fn value(&self) -> &HashSet<T> {
        &self.value
    }
    pub fn delta_value(&self) -> &SetDelta<T> {
        &self.delta_value
    }
}

impl<T: Element + Eq + Hash> MutableNode for Tss<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> bool {
        self.delta_value = self.source.peek_value();
        for item in &self.delta_value.removed {
            self.value.remove(item);
        }
        for item in &self.delta_value.added {
            self.value.insert(item.clone());
        }
        !self.delta_value.is_empty()
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }
}

impl<T: Element + Eq + Hash> StreamPeekRef<HashSet<T>> for Tss<T> {
    fn peek_ref(&self) -> &HashSet<T> {
        &self.value
    }
}

/// Builds a `TSS[T]` accumulator from a stream of set deltas.
pub fn tss<T: Element + Eq + Hash>(source: Rc<dyn Stream<SetDelta<T>>>) -> Rc<dyn Stream<HashSet<T>>> {
    Tss::new(source).into_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{AsNode, Graph, NanoTime, RunFor, RunMode, StreamPeek};
    use std::time::Duration;

    #[test]
    fn accumulates_added_and_removed() {
        let source = ticker(Duration::from_millis(1)).count();
        let deltas = source.map(|x| {
            if x % 2 == 1 {
                set_delta_int(HashSet::from([x as i64]), HashSet::new())
            } else {
                set_delta_int(HashSet::new(), HashSet::from([(x - 1) as i64]))
            }
        });
        let set = tss(deltas);
        let history = set.clone().accumulate();
        let nodes = vec![history.clone().as_node()];
        Graph::new(nodes, RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .run()
            .unwrap();
        assert!(set.peek_value().is_empty());
    }
}
