use crate::types::*;

pub struct TickNode {
    period: NanoTime,
}

impl TickNode {
    pub fn new(period: NanoTime) -> Self {
        Self { period }
    }
}

impl MutableNode for TickNode {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        if self.period > NanoTime::ZERO && !state.is_last_cycle() {
            state.add_callback(state.time() + self.period);
        }
        true
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }

    fn start(&mut self, state: &mut GraphState) {
        if self.period > NanoTime::ZERO {
            state.add_callback(state.time());
        } else {
            state.always_callback();
        }
    }
}
