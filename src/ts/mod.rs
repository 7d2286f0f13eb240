//! Typed time-series containers (§3.2, §4.4).
//!
//! `TS[T]` is just [Stream]`<T>` under a shorter name — every container in
//! this module is built out of the same `Node`/`Stream`/`StreamPeekRef`
//! primitives in [crate::types], following the wiring conventions
//! established by the demux family in [crate::nodes::demux].

use crate::builder::ScalarKind;
use crate::{Element, Stream};
use std::rc::Rc;

mod reference;
mod tsb;
mod tsd;
mod tsl;
mod tss;
mod tsw;

pub use reference::*;
pub use tsb::*;
pub use tsd::*;
pub use tsl::*;
pub use tss::*;
pub use tsw::*;

/// Shorthand for the container every other time-series type is built from.
pub type TS<T> = Rc<dyn Stream<T>>;

/// A time-series that only ever carries the unit value: its only interesting
/// property is whether it ticked this cycle. Used for control/trigger edges.
pub type Signal = Rc<dyn Stream<()>>;

/// A delta entry for a keyed container (`TSD`), distinguishing "key now maps
/// to this value" from "key removed this cycle" (the `REMOVE` sentinel,
/// §3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta<V> {
    Value(V),
    Remove,
}

impl<V> Delta<V> {
    pub fn value(self) -> Option<V> {
        match self {
            Delta::Value(v) => Some(v),
            Delta::Remove => None,
        }
    }
    pub fn is_remove(&self) -> bool {
        matches!(self, Delta::Remove)
    }
}

/// The cycle's change to a `TSS[T]`: elements newly present and elements
/// dropped since the previous tick, tagged with the scalar type `T` was
/// built against so downstream consumers can recover it without the
/// static type (§4.4.2, §6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDelta<T: Element + Eq + std::hash::Hash> {
    pub added: std::collections::HashSet<T>,
    pub removed: std::collections::HashSet<T>,
    pub element_type: ScalarKind,
}

impl<T: Element + Eq + std::hash::Hash> SetDelta<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Builds a `SetDelta` tagged with `element_type`, dispatching to a
/// per-scalar concrete factory the way [crate::builder::default_builder]
/// dispatches `ValueShape`s to builders — any scalar kind can be named
/// here, it only affects the tag carried on the resulting value, not `T`
/// itself (that's fixed by the caller's `added`/`removed` sets).
pub fn set_delta<T: Element + Eq + std::hash::Hash>(
    added: std::collections::HashSet<T>,
    removed: std::collections::HashSet<T>,
    element_type: ScalarKind,
) -> SetDelta<T> {
    SetDelta {
        added,
        removed,
        element_type,
    }
}

/// Convenience wrapper for `bool`-element sets.
pub fn set_delta_bool(
    added: std::collections::HashSet<bool>,
    removed: std::collections::HashSet<bool>,
) -> SetDelta<bool> {
    set_delta(added, removed, ScalarKind::Bool)
}

/// Convenience wrapper for `i64`-element sets.
pub fn set_delta_int(
    added: std::collections::HashSet<i64>,
    removed: std::collections::HashSet<i64>,
) -> SetDelta<i64> {
    set_delta(added, removed, ScalarKind::Int)
}

/// Convenience wrapper for ordered-float element sets (§12: `ordered-float`
/// is kept in the dependency stack for exactly this, TSS/TSW ordering over
/// floats that don't implement `Eq`/`Hash` natively).
pub fn set_delta_float(
    added: std::collections::HashSet<ordered_float::OrderedFloat<f64>>,
    removed: std::collections::HashSet<ordered_float::OrderedFloat<f64>>,
) -> SetDelta<ordered_float::OrderedFloat<f64>> {
    set_delta(added, removed, ScalarKind::Float)
}

/// The generic fallback for user-defined element types: no concrete scalar
/// factory applies, so the set is still built but tagged `Object` (§6).
pub fn set_delta_object<T: Element + Eq + std::hash::Hash>(
    added: std::collections::HashSet<T>,
    removed: std::collections::HashSet<T>,
) -> SetDelta<T> {
    set_delta(added, removed, ScalarKind::Object)
}
