use derive_new::new;

use crate::types::*;
use std::rc::Rc;

/// Emit's its source, if and only if, it's trigger ticks.
/// Used by [sample](crate::nodes::StreamOperators::sample).
#[derive(new)]
pub struct SampleStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    trigger: Rc<dyn Node>,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for SampleStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> bool {
        self.value = self.upstream.peek_value();
        true
    }

    fn upstreams(&self) -> UpStreams {
        // only ticks on trigger
        let active = vec![self.trigger.clone()];
        let passive = vec![self.upstream.clone().as_node()];
        UpStreams::new(active, passive)
    }
}

impl<T: Element> StreamPeekRef<T> for SampleStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
