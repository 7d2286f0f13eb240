//! [NodeSignature]: the immutable, structurally-copyable description of a
//! node's contract (name, type, input/output shape, gating sets,
//! injectables). Surfaced at the wiring boundary so an external layer can
//! round-trip it via `to_dict`/`Deserialize`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// What triggers a node and whether it owns an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum NodeTypeEnum {
    /// Woken by an external thread pushing onto the engine's push-queue.
    PushSource,
    /// Self-scheduled; emits ticks from a deterministic generator.
    PullSource,
    /// Wakes on any active input tick or scheduled wake-up.
    Compute,
    /// Like Compute but has no output.
    Sink,
}

impl NodeTypeEnum {
    pub fn is_source_node(&self) -> bool {
        matches!(self, NodeTypeEnum::PushSource | NodeTypeEnum::PullSource)
    }
    pub fn is_push_source_node(&self) -> bool {
        matches!(self, NodeTypeEnum::PushSource)
    }
    pub fn is_pull_source_node(&self) -> bool {
        matches!(self, NodeTypeEnum::PullSource)
    }
    pub fn is_compute_node(&self) -> bool {
        matches!(self, NodeTypeEnum::Compute)
    }
    pub fn is_sink_node(&self) -> bool {
        matches!(self, NodeTypeEnum::Sink)
    }
}

/// Bitfield describing which ambient handles a node's body requires.
pub mod injectable {
    pub const STATE: u32 = 1;
    pub const ENGINE: u32 = 2;
    pub const SCHEDULER: u32 = 4;
    pub const OUTPUT_FEEDBACK: u32 = 8;
    pub const CLOCK: u32 = 16;
    pub const TRAITS: u32 = 32;
    pub const LOGGER: u32 = 64;
    pub const RECORDABLE_STATE: u32 = 128;
}

/// Immutable, structurally-copyable node contract (§4.1).
///
/// Every field absent from a `copy_with` override is preserved verbatim,
/// including `node_type`, `context_inputs` and `wiring_path_name` — the
/// three fields a careless re-implementation tends to drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSignature {
    pub name: String,
    pub node_type: NodeTypeEnum,
    pub args: Vec<String>,
    pub active_inputs: BTreeSet<String>,
    pub valid_inputs: BTreeSet<String>,
    pub all_valid_inputs: BTreeSet<String>,
    pub context_inputs: BTreeSet<String>,
    pub injectables: u32,
    pub capture_exception: bool,
    pub trace_back_depth: u32,
    pub wiring_path_name: String,
    pub label: Option<String>,
    pub capture_values: bool,
    pub record_replay_id: Option<String>,
}

impl NodeSignature {
    pub fn new(name: impl Into<String>, node_type: NodeTypeEnum, wiring_path_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type,
            args: Vec::new(),
            active_inputs: BTreeSet::new(),
            valid_inputs: BTreeSet::new(),
            all_valid_inputs: BTreeSet::new(),
            context_inputs: BTreeSet::new(),
            injectables: 0,
            capture_exception: false,
            trace_back_depth: 0,
            wiring_path_name: wiring_path_name.into(),
            label: None,
            capture_values: false,
            record_replay_id: None,
        }
    }

    pub fn uses_state(&self) -> bool {
        self.injectables & injectable::STATE != 0
    }
    pub fn uses_engine(&self) -> bool {
        self.injectables & injectable::ENGINE != 0
    }
    pub fn uses_scheduler(&self) -> bool {
        self.injectables & injectable::SCHEDULER != 0
    }
    pub fn uses_output_feedback(&self) -> bool {
        self.injectables & injectable::OUTPUT_FEEDBACK != 0
    }
    pub fn uses_clock(&self) -> bool {
        self.injectables & injectable::CLOCK != 0
    }

    /// Structural copy with per-field overrides; any field left `None`
    /// (or, for collections, simply not passed) is carried over unchanged.
    /// `context_inputs`, `node_type` and `wiring_path_name` are ordinary
    /// fields here and therefore survive a `copy_with` that only touches
    /// `name` — there is no separate omission path for them to fall
    /// through, unlike the dict-shaped representation `to_dict` produces.
    pub fn copy_with(&self, overrides: NodeSignatureOverrides) -> NodeSignature {
        NodeSignature {
            name: overrides.name.unwrap_or_else(|| self.name.clone()),
            node_type: overrides.node_type.unwrap_or(self.node_type),
            args: overrides.args.unwrap_or_else(|| self.args.clone()),
            active_inputs: overrides
                .active_inputs
                .unwrap_or_else(|| self.active_inputs.clone()),
            valid_inputs: overrides
                .valid_inputs
                .unwrap_or_else(|| self.valid_inputs.clone()),
            all_valid_inputs: overrides
                .all_valid_inputs
                .unwrap_or_else(|| self.all_valid_inputs.clone()),
            context_inputs: overrides
                .context_inputs
                .unwrap_or_else(|| self.context_inputs.clone()),
            injectables: overrides.injectables.unwrap_or(self.injectables),
            capture_exception: overrides
                .capture_exception
                .unwrap_or(self.capture_exception),
            trace_back_depth: overrides.trace_back_depth.unwrap_or(self.trace_back_depth),
            wiring_path_name: overrides
                .wiring_path_name
                .unwrap_or_else(|| self.wiring_path_name.clone()),
            label: overrides.label.unwrap_or_else(|| self.label.clone()),
            capture_values: overrides.capture_values.unwrap_or(self.capture_values),
            record_replay_id: overrides
                .record_replay_id
                .unwrap_or_else(|| self.record_replay_id.clone()),
        }
    }

    /// Round-trips every field as a JSON object, `context_inputs`
    /// included. A prior Python-side implementation of this contract
    /// dropped `context_inputs` from the dict it built; that omission is
    /// not reproduced here.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("NodeSignature fields are all JSON-representable")
    }
}

/// Per-field overrides for [NodeSignature::copy_with]. `Default::default()`
/// changes nothing.
#[derive(Debug, Clone, Default)]
pub struct NodeSignatureOverrides {
    pub name: Option<String>,
    pub node_type: Option<NodeTypeEnum>,
    pub args: Option<Vec<String>>,
    pub active_inputs: Option<BTreeSet<String>>,
    pub valid_inputs: Option<BTreeSet<String>>,
    pub all_valid_inputs: Option<BTreeSet<String>>,
    pub context_inputs: Option<BTreeSet<String>>,
    pub injectables: Option<u32>,
    pub capture_exception: Option<bool>,
    pub trace_back_depth: Option<u32>,
    pub wiring_path_name: Option<String>,
    pub label: Option<Option<String>>,
    pub capture_values: Option<bool>,
    pub record_replay_id: Option<Option<String>>,
}

impl NodeSignatureOverrides {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(Some(label.into()));
        self
    }
    pub fn capture_exception(mut self, capture_exception: bool) -> Self {
        self.capture_exception = Some(capture_exception);
        self
    }
    pub fn trace_back_depth(mut self, trace_back_depth: u32) -> Self {
        self.trace_back_depth = Some(trace_back_depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeSignature {
        let mut sig = NodeSignature::new("original", NodeTypeEnum::Compute, "original.path");
        sig.context_inputs = BTreeSet::from(["ctx1".to_string(), "ctx2".to_string()]);
        sig.active_inputs = BTreeSet::from(["a".to_string()]);
        sig
    }

    #[test]
    fn copy_with_no_overrides_preserves_everything() {
        let sig = sample();
        let copied = sig.copy_with(NodeSignatureOverrides::default());
        assert_eq!(copied, sig);
    }

    #[test]
    fn copy_with_name_change_preserves_node_type_and_context_inputs() {
        let sig = sample();
        let copied = sig.copy_with(NodeSignatureOverrides::default().name("modified"));
        assert_eq!(copied.name, "modified");
        assert_eq!(copied.node_type, sig.node_type);
        assert_eq!(copied.wiring_path_name, sig.wiring_path_name);
        assert_eq!(copied.context_inputs, sig.context_inputs);
        assert_eq!(copied.active_inputs, sig.active_inputs);
    }

    #[test]
    fn to_dict_includes_context_inputs() {
        let sig = sample();
        let dict = sig.to_dict();
        assert!(dict.get("context_inputs").is_some());
        assert_eq!(
            dict["context_inputs"],
            serde_json::json!(["ctx1", "ctx2"])
        );
    }
}
