//! Nested-graph node family (§4.5): nodes that own and synchronously step
//! an embedded [crate::graph::Graph], instantiated dynamically at runtime
//! keyed by a `TSD` key ([map_]) or a control value ([switch_]), or held as
//! a single persistent instance ([component]). [reduce] specialises
//! [map_] to fold its per-key sub-graph outputs with a binary op; [mesh]
//! validates and wires a dynamically changing set of inter-connected
//! sub-graphs; [try_except] captures a sub-graph's failure instead of
//! propagating it.
//!
//! All of these build on [crate::graph::Graph]'s `initialise_embedded` /
//! `step` / `finalise_embedded` triad, added specifically to support this
//! module (§11.6) — the parent node is the embedded graph's sole
//! scheduler, driving it one cycle per parent `cycle()`.

mod cell;
mod component;
mod map_;
mod mesh;
mod reduce;
mod switch_;
mod try_except;

pub use cell::InputCell;
pub use component::*;
pub use map_::*;
pub use mesh::*;
pub use reduce::*;
pub use switch_::*;
pub use try_except::*;
