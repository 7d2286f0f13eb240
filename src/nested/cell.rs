//! A single-slot node used as the feed-in point for a value the parent of a
//! nested-graph node pushes into the embedded graph each step. Always
//! ticks: the embedded graph's scheduler (the parent) already knows the
//! value changed, so there's no point re-deriving that here.

use crate::{Element, GraphState, MutableNode, StreamPeekRef, UpStreams};

/// Exposed so callers can write `MapFactory`/`switch_` factories, which must
/// hand back the input cell they feed the sub-graph's value through.
pub struct InputCell<T: Element> {
    pub(crate) value: T,
}

impl<T: Element> InputCell<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Element> MutableNode for InputCell<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> bool {
        true
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }
}

impl<T: Element> StreamPeekRef<T> for InputCell<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
