//! `TSW[T, size, min_size]`: a sliding window over the last up-to-`size`
//! ticks of a source (§3.2, §4.4.3). `value`/`value_times` are populated
//! only once the window has reached `min_size` entries (`all_valid`);
//! `removed_value` carries the entry evicted on overflow, one per eviction
//! cycle (§8 invariant 5).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::{AsNode, Element, GraphState, MutableNode, NanoTime, Stream, UpStreams};

/// Sliding window of up to `size` most recent `(time, value)` pairs from
/// `source`, valid once it holds at least `min_size` entries.
pub struct Tsw<T: Element> {
    source: Rc<dyn Stream<T>>,
    size: usize,
    min_size: usize,
    window: VecDeque<(NanoTime, T)>,
    removed: Option<(NanoTime, T)>,
}

impl<T: Element> Tsw<T> {
    pub fn new(source: Rc<dyn Stream<T>>, size: usize, min_size: usize) -> Self {
        assert!(min_size <= size, "TSW min_size must not exceed size");
        assert!(size > 0, "TSW size must be positive");
        Self {
            source,
            size,
            min_size,
            window: VecDeque::with_capacity(size),
            removed: None,
        }
    }

    /// Window contents, oldest first, once `all_valid`; `None` before that.
    pub fn value(&self) -> Option<Vec<T>> {
        self.all_valid()
            .then(|| self.window.iter().map(|(_, v)| v.clone()).collect())
    }

    /// Tick times paired with `value`, oldest first.
    pub fn value_times(&self) -> Option<Vec<NanoTime>> {
        self.all_valid()
            .then(|| self.window.iter().map(|(t, _)| *t).collect())
    }

    /// The entry evicted this cycle, if the window was at capacity.
    pub fn removed_value(&self) -> Option<&(NanoTime, T)> {
        self.removed.as_ref()
    }

    pub fn has_removed_value(&self) -> bool {
        self.removed.is_some()
    }

    pub fn all_valid(&self) -> bool {
        self.window.len() >= self.min_size
    }

    pub fn first_modified_time(&self) -> Option<NanoTime> {
        self.window.front().map(|(t, _)| *t)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl<T: Element> MutableNode for Tsw<T> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        self.removed = None;
        let value = self.source.peek_value();
        if self.window.len() == self.size {
            self.removed = self.window.pop_front();
        }
        self.window.push_back((state.time(), value));
        true
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }
}

/// Builds a `TSW[T, size, min_size]` node over `source`. Unlike the other
/// containers in this module, a window is consulted through [Tsw]'s own
/// accessors rather than through [crate::StreamPeek] — there is no single
/// scalar "current value" to peek, only the window.
pub fn to_window<T: Element>(source: Rc<dyn Stream<T>>, size: usize, min_size: usize) -> Rc<RefCell<Tsw<T>>> {
    Rc::new(RefCell::new(Tsw::new(source, size, min_size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{Graph, NanoTime as NT, RunFor, RunMode};
    use std::time::Duration;

    #[test]
    fn window_respects_size_and_min_size() {
        let source = ticker(Duration::from_millis(1)).count();
        let window = to_window(source, 3, 2);
        let node = window.clone().as_node();
        Graph::new(vec![node], RunMode::HistoricalFrom(NT::ZERO), RunFor::Cycles(4))
            .run()
            .unwrap();
        assert_eq!(window.borrow().len(), 3);
        assert!(window.borrow().all_valid());
        assert!(window.borrow().has_removed_value());
    }

    #[test]
    fn window_invalid_before_min_size() {
        let source = ticker(Duration::from_millis(1)).count();
        let window = to_window(source, 3, 2);
        let node = window.clone().as_node();
        Graph::new(vec![node], RunMode::HistoricalFrom(NT::ZERO), RunFor::Cycles(1))
            .run()
            .unwrap();
        assert!(window.borrow().value().is_none());
        assert!(!window.borrow().has_removed_value());
    }
}
