//! Engine error taxonomy.
//!
//! `eval()` on a node is expected to be infallible by construction (the
//! trait itself returns `bool`, not `Result`); failures that do occur
//! inside user-supplied node bodies are caught at the node boundary and
//! turned into an [EngineError], which either aborts the run or is
//! captured by an enclosing `try_except` nested graph.

use std::fmt;

use thiserror::Error;

/// Taxonomy of everything that can go wrong building or running a graph.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A builder could not realise a declared time-series shape at wiring time.
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),

    /// User code inside a node's `eval` failed.
    #[error("node evaluation error: {0}")]
    NodeEvaluation(#[from] NodeError),

    /// The engine detected a state that should be impossible by construction.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A node's `start`/`stop`/`teardown` hook failed.
    #[error("lifecycle error in {node_path}: {source}")]
    Lifecycle {
        node_path: String,
        #[source]
        source: anyhow::Error,
    },

    /// A push-source received a value after the engine had begun shutdown.
    #[error("push queue closed for node {node_path}")]
    PushQueueClosed { node_path: String },
}

/// Raised when a [crate::signature::NodeSignature]'s declared shape has no
/// registered builder, or an edge cannot be realised between two shapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WiringError {
    #[error("no builder registered for time-series shape {shape}")]
    MissingBuilder { shape: String },
    #[error("edge {src_node}->{dst_node} violates node-id monotonicity (src must be < dst)")]
    NonMonotonicEdge { src_node: u64, dst_node: u64 },
    #[error("cycle detected among mesh nodes: {path}")]
    MeshCycle { path: String },
    /// An edge names a node id outside `[0, node_count)`.
    #[error("edge {src_node}->{dst_node} references node {node_id}, but only {node_count} nodes are declared")]
    DanglingNode {
        src_node: u64,
        dst_node: u64,
        node_id: u64,
        node_count: usize,
    },
}

/// The structured error a `try_except` nested node captures and republishes
/// on its error output. `traceback` is a lightweight, string rendering of
/// the originating node's call context rather than a full stack capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    pub message: String,
    pub traceback: String,
    pub node_path: String,
    pub time: crate::time::NanoTime,
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} ({})", self.message, self.node_path, self.time)
    }
}

impl std::error::Error for NodeError {}

impl NodeError {
    pub fn new(
        message: impl Into<String>,
        node_path: impl Into<String>,
        time: crate::time::NanoTime,
    ) -> Self {
        Self {
            message: message.into(),
            traceback: String::new(),
            node_path: node_path.into(),
            time,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = traceback.into();
        self
    }

    /// Captures an arbitrary user error, truncating its chain to `depth`
    /// entries to honour `capture_exception`'s `trace_back_depth`.
    pub fn capture(
        err: &anyhow::Error,
        node_path: impl Into<String>,
        time: crate::time::NanoTime,
        depth: usize,
    ) -> Self {
        let traceback = err
            .chain()
            .take(depth.max(1))
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" <- ");
        Self::new(err.to_string(), node_path, time).with_traceback(traceback)
    }
}
