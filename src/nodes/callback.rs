use crate::queue::{TimeQueue, ValueAt};
use crate::types::*;
use std::fmt::Debug;
use std::hash::Hash;

/// A [Stream] which can be updated by calling [push](CallBackStream::push).
/// Useful for unit testing and as the push-source builder backing
/// `NodeTypeEnum::PushSource` (§4.6).
pub struct CallBackStream<T: Debug + Clone + Hash + Eq> {
    value: T,
    queue: TimeQueue<T>,
}

impl<T: Debug + Clone + Hash + Eq + Default> Default for CallBackStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug + Clone + Hash + Eq + Default> CallBackStream<T> {
    pub fn new() -> Self {
        Self {
            value: T::default(),
            queue: TimeQueue::new(),
        }
    }
}

impl<T: Debug + Clone + Hash + Eq + Default> StreamPeekRef<T> for CallBackStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Debug + Clone + Hash + Eq + Default> MutableNode for CallBackStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        let current_time = state.time();
        let mut ticked = false;
        while self.queue.pending(current_time) {
            self.value = self.queue.pop();
            ticked = true;
        }
        if !self.queue.is_empty() {
            state.add_callback(self.queue.next_time());
        }
        ticked
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }

    fn setup(&mut self, state: &mut GraphState) {
        if !self.queue.is_empty() {
            state.add_callback(self.queue.next_time());
        }
    }
}

impl<T: Debug + Clone + Hash + Eq> CallBackStream<T> {
    pub fn push(&mut self, value: ValueAt<T>) {
        self.queue.push(value.value, value.time);
    }
}
