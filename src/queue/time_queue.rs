use derive_new::new;
use priority_queue::PriorityQueue;
use std::cmp::Eq;
use std::cmp::Reverse;
use std::hash::Hash;

use super::value_at::ValueAt;
use crate::types::NanoTime;

/// Queue of Ts by time.
// ValueAt is used to stop duplicate values being dropped by
// PriorityQueue
#[derive(new, Default, Debug)]
pub(crate) struct TimeQueue<T: Hash + Eq> {
    #[new(default)]
    queue: PriorityQueue<ValueAt<T>, Reverse<NanoTime>>,
}

impl<T: Hash + Eq + std::fmt::Debug + std::clone::Clone> TimeQueue<T> {
    pub fn next_time(&self) -> NanoTime {
        self.queue.peek().unwrap().1.0
    }
    pub fn is_empty(&self) -> bool {
        let item = self.queue.peek();
        item.is_none()
    }
    pub fn push(&mut self, value: T, time: NanoTime) {
        self.queue.push(ValueAt::new(value, time), Reverse(time));
    }
    pub fn pop(&mut self) -> T {
        self.queue.pop().unwrap().0.value
    }
    pub fn pending(&self, current_time: NanoTime) -> bool {
        let item = self.queue.peek();
        match item {
            Some(item) => item.1.0 <= current_time,
            None => false,
        }
    }
}
