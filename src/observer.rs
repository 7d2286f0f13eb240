//! Lifecycle observer hooks and the engine driver (§6).
//!
//! A [LifeCycleObserver] is notified around every evaluation cycle and
//! every individual node evaluation within it. [GraphExecutor] is the
//! driver that owns the [Graph] built for a run, the observers registered
//! against it, and a cooperative stop flag external code can use to ask a
//! running graph to wind down.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::graph::{Graph, RunFor, RunMode};
use crate::time::NanoTime;
use crate::types::Node;

/// Callbacks fired around graph evaluation. Default bodies are no-ops, so
/// an observer only needs to implement the hooks it cares about.
pub trait LifeCycleObserver {
    /// Fired once per cycle, before any node in it is evaluated.
    #[allow(unused_variables)]
    fn before_evaluation(&self, time: NanoTime) {}
    /// Fired immediately before a dirty node's `cycle` runs.
    #[allow(unused_variables)]
    fn before_node_eval(&self, node: &Rc<dyn Node>) {}
    /// Fired immediately after a dirty node's `cycle` runs, with whether it ticked.
    #[allow(unused_variables)]
    fn after_node_eval(&self, node: &Rc<dyn Node>, ticked: bool) {}
    /// Fired once per cycle, after every dirty node in it has been evaluated.
    #[allow(unused_variables)]
    fn after_evaluation(&self, time: NanoTime) {}
}

/// The default observer (§10.1): emits `trace!`/`debug!` lines for cycle
/// and node-eval boundaries, to the `"timeflow"` target used elsewhere in
/// the crate, rather than introducing a tracing-spans dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLifeCycleObserver;

impl LifeCycleObserver for TracingLifeCycleObserver {
    fn before_evaluation(&self, time: NanoTime) {
        trace!(target: "timeflow", "cycle begin at {time}");
    }

    fn before_node_eval(&self, node: &Rc<dyn Node>) {
        trace!(target: "timeflow", "eval {node} begin");
    }

    fn after_node_eval(&self, node: &Rc<dyn Node>, ticked: bool) {
        trace!(target: "timeflow", "eval {node} done, ticked={ticked}");
    }

    fn after_evaluation(&self, time: NanoTime) {
        debug!(target: "timeflow", "cycle end at {time}");
    }
}

/// Coarse execution mode (§6); maps onto the engine's existing [RunMode]
/// (§11.1) — `Simulation` drives `RunMode::HistoricalFrom`, `RealTime`
/// drives `RunMode::RealTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Simulation,
    RealTime,
}

/// A `Send`+`Sync` handle that can ask a running [GraphExecutor] to stop,
/// even from outside the single engine thread driving it. Mirrors the
/// `Arc<AtomicU8>` signal [crate::bencher] uses to stop a benchmark graph.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Cooperatively requests that the owning graph stop after its
    /// current cycle.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The engine driver (§6): builds and runs a [Graph] for a given
/// `(mode, observers)`, resolving `run`'s `(start_time, end_time)` into the
/// `RunMode`/`RunFor` the existing scheduler already understands.
pub struct GraphExecutor {
    root_nodes: Vec<Rc<dyn Node>>,
    mode: ExecutionMode,
    observers: Vec<Rc<dyn LifeCycleObserver>>,
    stop: Arc<AtomicBool>,
}

impl GraphExecutor {
    pub fn new(root_nodes: Vec<Rc<dyn Node>>, mode: ExecutionMode) -> Self {
        Self {
            root_nodes,
            mode,
            observers: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers an observer to be notified for the next [GraphExecutor::run].
    pub fn add_observer(&mut self, observer: Rc<dyn LifeCycleObserver>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    /// Runs from `start_time` through `end_time` (or forever, if `None`),
    /// returning once the run bound is hit, a `request_stop` lands, or a
    /// node failure aborts the run.
    pub fn run(&mut self, start_time: NanoTime, end_time: Option<NanoTime>) -> anyhow::Result<()> {
        let (run_mode, run_for) = match self.mode {
            ExecutionMode::Simulation => {
                let run_for = match end_time {
                    Some(end) => RunFor::Duration(Duration::from(end - start_time)),
                    None => RunFor::Forever,
                };
                (RunMode::HistoricalFrom(start_time), run_for)
            }
            ExecutionMode::RealTime => {
                let run_for = match end_time {
                    Some(end) => {
                        let now = NanoTime::now();
                        let remaining = if end > now {
                            end - now
                        } else {
                            NanoTime::ZERO
                        };
                        RunFor::Duration(Duration::from(remaining))
                    }
                    None => RunFor::Forever,
                };
                (RunMode::RealTime, run_for)
            }
        };
        let mut graph = Graph::new(self.root_nodes.clone(), run_mode, run_for);
        graph.set_stop_handle(self.stop.clone());
        for observer in &self.observers {
            graph.add_observer(observer.clone());
        }
        graph.run()
    }

    /// A handle that can ask this executor's current or next run to stop.
    /// Can be captured before [GraphExecutor::run] is called, e.g. by an
    /// observer that wants to end the run after N cycles.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeOperators;
    use crate::nodes::ticker;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingObserver {
        cycles: RefCell<u32>,
        node_evals: RefCell<u32>,
    }

    impl LifeCycleObserver for RecordingObserver {
        fn before_evaluation(&self, _time: NanoTime) {
            *self.cycles.borrow_mut() += 1;
        }

        fn after_node_eval(&self, _node: &Rc<dyn Node>, _ticked: bool) {
            *self.node_evals.borrow_mut() += 1;
        }
    }

    #[test]
    fn notifies_observer_around_every_cycle() {
        let source = ticker(Duration::from_millis(1)).count();
        let observer = Rc::new(RecordingObserver::default());
        let mut executor = GraphExecutor::new(vec![source.as_node()], ExecutionMode::Simulation);
        executor.add_observer(observer.clone());
        executor
            .run(
                NanoTime::ZERO,
                Some(NanoTime::from(Duration::from_millis(5))),
            )
            .unwrap();
        assert!(*observer.cycles.borrow() >= 3);
        assert!(*observer.node_evals.borrow() >= *observer.cycles.borrow());
    }

    struct StoppingObserver {
        stop_after: u32,
        seen: RefCell<u32>,
        handle: StopHandle,
    }

    impl LifeCycleObserver for StoppingObserver {
        fn after_evaluation(&self, _time: NanoTime) {
            let mut seen = self.seen.borrow_mut();
            *seen += 1;
            if *seen >= self.stop_after {
                self.handle.request_stop();
            }
        }
    }

    #[test]
    fn request_stop_from_an_observer_ends_the_run_early() {
        let source = ticker(Duration::from_millis(1)).count();
        let mut executor = GraphExecutor::new(vec![source.as_node()], ExecutionMode::Simulation);
        let handle = executor.stop_handle();
        executor.add_observer(Rc::new(StoppingObserver {
            stop_after: 3,
            seen: RefCell::new(0),
            handle: handle.clone(),
        }));
        // Bounded generously; request_stop should end the run well before
        // this duration elapses.
        executor
            .run(
                NanoTime::ZERO,
                Some(NanoTime::from(Duration::from_secs(1000))),
            )
            .unwrap();
        assert!(handle.is_stop_requested());
    }
}
