//! The engine's input contract (§4.6, §6): a `GraphBuilder` is the typed,
//! serialisable description an external wiring layer hands to the engine —
//! a flat list of node builders plus the edges connecting their typed
//! outputs to typed inputs. This module does not itself interpret a
//! `GraphBuilder` into a live [crate::graph::Graph] (that wiring/DSL layer
//! is explicitly out of scope, §1); it defines the contract's shapes and
//! the [TimeSeriesBuilderFactory] dispatch a wiring layer would call.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::WiringError;

/// The scalar leaf types a `TS[T]` can specialise its builder over (§4.6).
/// Anything not named here falls back to `Object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Date,
    DateTime,
    TimeDelta,
    #[default]
    Object,
}

/// The fixed, ordered field schema backing a `TSB[S]`, cached once per
/// distinct bundle shape rather than recomputed per node (§4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesSchema {
    pub keys: Vec<String>,
    pub scalar_type: Option<ScalarKind>,
}

impl TimeSeriesSchema {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            scalar_type: None,
        }
    }

    pub fn with_scalar_type(mut self, scalar_type: ScalarKind) -> Self {
        self.scalar_type = Some(scalar_type);
        self
    }
}

/// A typed value shape at the wiring boundary: the external description of
/// what kind of time-series an output produces or an input accepts (§3.2,
/// §4.6). `Custom` stands for any shape this crate's default
/// [TimeSeriesBuilderFactory] does not recognise — it always misses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueShape {
    Ts(ScalarKind),
    Tsl { child: Box<ValueShape>, size: usize },
    Tsb(TimeSeriesSchema),
    Tss(ScalarKind),
    Tsd { key: ScalarKind, value: Box<ValueShape> },
    Tsw { child: Box<ValueShape>, size: usize, min_size: usize },
    Ref(Box<ValueShape>),
    Signal,
    Custom(String),
}

/// Concrete per-scalar output builder (§4.6: "per-scalar specialised
/// builder"). Mirrors [ScalarKind] one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarBuilder {
    Bool,
    Int,
    Float,
    Date,
    DateTime,
    TimeDelta,
    Object,
}

impl From<ScalarKind> for ScalarBuilder {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Bool => ScalarBuilder::Bool,
            ScalarKind::Int => ScalarBuilder::Int,
            ScalarKind::Float => ScalarBuilder::Float,
            ScalarKind::Date => ScalarBuilder::Date,
            ScalarKind::DateTime => ScalarBuilder::DateTime,
            ScalarKind::TimeDelta => ScalarBuilder::TimeDelta,
            ScalarKind::Object => ScalarBuilder::Object,
        }
    }
}

/// The concrete builder a [TimeSeriesBuilderFactory] resolves a [ValueShape]
/// to. The same set of variants serves both inputs and outputs (§4.6) — what
/// differs between [TimeSeriesBuilderFactory::make_input_builder] and
/// [TimeSeriesBuilderFactory::make_output_builder] is which side of the edge
/// is being materialised, not the shape taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSeriesBuilder {
    Scalar(ScalarBuilder),
    Tsl { child: Box<TimeSeriesBuilder>, size: usize },
    Tsb { schema: TimeSeriesSchema, fields: Vec<TimeSeriesBuilder> },
    Tss(ScalarBuilder),
    Tsd { key: ScalarBuilder, value: Box<TimeSeriesBuilder> },
    Tsw { child: Box<TimeSeriesBuilder>, size: usize, min_size: usize },
    Ref(Box<TimeSeriesBuilder>),
    Signal,
}

/// Maps typed value shapes to concrete builders (§4.6). The default
/// implementation below is the dispatch table every wiring layer in this
/// crate uses; a host application may implement this trait on its own type
/// to register additional native shapes instead of falling through to
/// [WiringError::MissingBuilder].
pub trait TimeSeriesBuilderFactory {
    fn make_input_builder(&self, shape: &ValueShape) -> Result<TimeSeriesBuilder, WiringError> {
        default_builder(shape)
    }
    fn make_output_builder(&self, shape: &ValueShape) -> Result<TimeSeriesBuilder, WiringError> {
        default_builder(shape)
    }
}

/// The dispatch table shared by the default `make_input_builder`/
/// `make_output_builder` — one match arm per supported [ValueShape]
/// variant, falling through to [WiringError::MissingBuilder] for anything
/// else (`Custom`, or a variant a future wiring layer adds but this
/// factory doesn't yet know).
fn default_builder(shape: &ValueShape) -> Result<TimeSeriesBuilder, WiringError> {
    match shape {
        ValueShape::Ts(kind) => Ok(TimeSeriesBuilder::Scalar((*kind).into())),
        ValueShape::Tsl { child, size } => Ok(TimeSeriesBuilder::Tsl {
            child: Box::new(default_builder(child)?),
            size: *size,
        }),
        ValueShape::Tsb(schema) => {
            let fields = schema
                .keys
                .iter()
                .map(|_| {
                    let field_shape = match schema.scalar_type {
                        Some(kind) => ValueShape::Ts(kind),
                        None => ValueShape::Ts(ScalarKind::Object),
                    };
                    default_builder(&field_shape)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimeSeriesBuilder::Tsb {
                schema: schema.clone(),
                fields,
            })
        }
        ValueShape::Tss(kind) => Ok(TimeSeriesBuilder::Tss((*kind).into())),
        ValueShape::Tsd { key, value } => Ok(TimeSeriesBuilder::Tsd {
            key: (*key).into(),
            value: Box::new(default_builder(value)?),
        }),
        ValueShape::Tsw { child, size, min_size } => Ok(TimeSeriesBuilder::Tsw {
            child: Box::new(default_builder(child)?),
            size: *size,
            min_size: *min_size,
        }),
        ValueShape::Ref(inner) => Ok(TimeSeriesBuilder::Ref(Box::new(default_builder(inner)?))),
        ValueShape::Signal => Ok(TimeSeriesBuilder::Signal),
        ValueShape::Custom(_) => Err(WiringError::MissingBuilder {
            shape: format!("{shape:?}"),
        }),
    }
}

/// The default [TimeSeriesBuilderFactory]: supports every [ValueShape]
/// variant except `Custom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBuilderFactory;

impl TimeSeriesBuilderFactory for DefaultBuilderFactory {}

/// One of the node-builder kinds an external wiring layer may declare (§6).
/// `Native` covers a user-registered builder this crate has no built-in
/// interpretation for; it is carried through the contract as an opaque tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeBuilderKind {
    Python,
    PythonGenerator,
    LastValuePull,
    NestedGraph,
    TsdMap,
    Reduce,
    Switch,
    Mesh,
    TryExcept,
    Component,
    TsdNonAssociativeReduce,
    Native(String),
}

/// Connects one output to one input (§4.6). `output_path`/`input_path` are
/// integer sequences identifying a sub-location inside a composite
/// output/input — an empty path means the whole output/input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src_node: u64,
    pub output_path: Vec<u64>,
    pub dst_node: u64,
    pub input_path: Vec<u64>,
}

impl Edge {
    pub fn new(src_node: u64, output_path: Vec<u64>, dst_node: u64, input_path: Vec<u64>) -> Self {
        Self {
            src_node,
            output_path,
            dst_node,
            input_path,
        }
    }
}

/// The engine's full input contract (§4.6, §6): a flat, dense `[0, N)` list
/// of node builders plus the edges wiring their outputs to inputs. Node ids
/// are array indices into `node_builders`; `validate` enforces the
/// `src_node < dst_node` monotonicity invariant (a node may only consume
/// outputs of nodes declared earlier) and that every edge references a
/// declared node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphBuilder {
    pub node_builders: Vec<NodeBuilderKind>,
    pub edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new(node_builders: Vec<NodeBuilderKind>, edges: Vec<Edge>) -> Self {
        Self { node_builders, edges }
    }

    pub fn validate(&self) -> Result<(), WiringError> {
        let node_count = self.node_builders.len();
        for edge in &self.edges {
            if edge.src_node >= edge.dst_node {
                return Err(WiringError::NonMonotonicEdge {
                    src_node: edge.src_node,
                    dst_node: edge.dst_node,
                });
            }
            for node_id in [edge.src_node, edge.dst_node] {
                if node_id as usize >= node_count {
                    return Err(WiringError::DanglingNode {
                        src_node: edge.src_node,
                        dst_node: edge.dst_node,
                        node_id,
                        node_count,
                    });
                }
            }
        }
        Ok(())
    }
}

/// What a single registered node contributes to [build_graph]: the
/// `NodeBuilderKind` it answers for (checked against the declared kind, so
/// a mismatched registration is caught rather than silently wired) and the
/// construction thunk itself.
///
/// The thunk takes no arguments because `dyn Node` carries no type
/// information to downcast from — a host wiring layer registers node id
/// `N`'s thunk after it has already built every node id `< N` (the same
/// order `build_graph` walks in, guaranteed by `GraphBuilder::validate`'s
/// monotonicity check), so the thunk simply closes over whichever already-
/// built, concretely typed `Rc<dyn Stream<T>>` upstreams its edges name.
/// For `Python`/`Native` leaves that's a plain source/transform
/// constructor; for `TsdMap`/`Reduce`/`Switch`/`Mesh`/`TryExcept`/
/// `Component` it is expected to call the matching constructor in
/// [crate::nested] with a concrete `K`/`V`/`OUT` and a typed sub-graph
/// factory, since those constructors are generic and a `GraphBuilder` only
/// carries an erased `NodeBuilderKind` tag.
pub struct RegisteredNode {
    pub kind: NodeBuilderKind,
    pub build: Box<dyn FnOnce() -> Rc<dyn crate::types::Node>>,
}

impl RegisteredNode {
    pub fn new(kind: NodeBuilderKind, build: impl FnOnce() -> Rc<dyn crate::types::Node> + 'static) -> Self {
        Self {
            kind,
            build: Box::new(build),
        }
    }
}

/// Interprets a validated [GraphBuilder] into the dense, dependency-ordered
/// list of live nodes it describes (§4.6, §6): walks `node_builders` in id
/// order (monotonic edges guarantee every upstream is already built before
/// its downstream consumers) and runs the matching [RegisteredNode]'s
/// thunk — the dispatch from a `NodeBuilderKind::TsdMap`/`Reduce`/
/// `Switch`/`Mesh`/`TryExcept`/`Component`/`Native` tag to an actual
/// [crate::nested::map_]/[crate::nested::reduce]/[crate::nested::switch_]/
/// [crate::nested::mesh]/[crate::nested::try_except]/
/// [crate::nested::component] (or host-native) node that this contract
/// previously only declared, never performed.
///
/// `registry` must contain exactly one entry per `node_builders` index,
/// tagged with the `NodeBuilderKind` it was built to satisfy; a missing
/// registration or a kind mismatch is reported as
/// [WiringError::MissingBuilder] rather than silently wired.
pub fn build_graph(
    graph_builder: &GraphBuilder,
    mut registry: HashMap<u64, RegisteredNode>,
) -> Result<Vec<Rc<dyn crate::types::Node>>, WiringError> {
    graph_builder.validate()?;

    let mut built = Vec::with_capacity(graph_builder.node_builders.len());
    for (id, declared_kind) in graph_builder.node_builders.iter().enumerate() {
        let node_id = id as u64;
        let registered = registry.remove(&node_id).ok_or_else(|| WiringError::MissingBuilder {
            shape: format!("node {node_id}: {declared_kind:?}"),
        })?;
        if &registered.kind != declared_kind {
            return Err(WiringError::MissingBuilder {
                shape: format!(
                    "node {node_id}: registered for {:?} but declared {declared_kind:?}",
                    registered.kind
                ),
            });
        }
        built.push((registered.build)());
    }

    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_factory_resolves_scalar_shapes() {
        let factory = DefaultBuilderFactory;
        let builder = factory.make_output_builder(&ValueShape::Ts(ScalarKind::Int)).unwrap();
        assert_eq!(builder, TimeSeriesBuilder::Scalar(ScalarBuilder::Int));
    }

    #[test]
    fn default_factory_resolves_nested_shapes() {
        let factory = DefaultBuilderFactory;
        let shape = ValueShape::Tsl {
            child: Box::new(ValueShape::Ts(ScalarKind::Float)),
            size: 3,
        };
        let builder = factory.make_input_builder(&shape).unwrap();
        assert_eq!(
            builder,
            TimeSeriesBuilder::Tsl {
                child: Box::new(TimeSeriesBuilder::Scalar(ScalarBuilder::Float)),
                size: 3,
            }
        );
    }

    #[test]
    fn default_factory_resolves_tsb_from_schema() {
        let factory = DefaultBuilderFactory;
        let schema = TimeSeriesSchema::new(vec!["bid".into(), "ask".into()])
            .with_scalar_type(ScalarKind::Float);
        let builder = factory.make_output_builder(&ValueShape::Tsb(schema.clone())).unwrap();
        match builder {
            TimeSeriesBuilder::Tsb { schema: got, fields } => {
                assert_eq!(got, schema);
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected Tsb builder, got {other:?}"),
        }
    }

    #[test]
    fn default_factory_misses_custom_shape() {
        let factory = DefaultBuilderFactory;
        let err = factory
            .make_input_builder(&ValueShape::Custom("proprietary".into()))
            .unwrap_err();
        assert!(matches!(err, WiringError::MissingBuilder { .. }));
    }

    #[test]
    fn custom_shape_nested_inside_a_supported_one_also_misses() {
        let factory = DefaultBuilderFactory;
        let shape = ValueShape::Ref(Box::new(ValueShape::Custom("proprietary".into())));
        let err = factory.make_output_builder(&shape).unwrap_err();
        assert!(matches!(err, WiringError::MissingBuilder { .. }));
    }

    #[test]
    fn graph_builder_validates_monotonic_edges() {
        let builder = GraphBuilder::new(
            vec![NodeBuilderKind::Python, NodeBuilderKind::Python],
            vec![Edge::new(0, vec![], 1, vec![])],
        );
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn graph_builder_rejects_non_monotonic_edge() {
        let builder = GraphBuilder::new(
            vec![NodeBuilderKind::Python, NodeBuilderKind::Python],
            vec![Edge::new(1, vec![], 0, vec![])],
        );
        assert!(matches!(
            builder.validate(),
            Err(WiringError::NonMonotonicEdge { .. })
        ));
    }

    #[test]
    fn graph_builder_rejects_dangling_node() {
        let builder = GraphBuilder::new(
            vec![NodeBuilderKind::Python],
            vec![Edge::new(0, vec![], 5, vec![])],
        );
        assert!(matches!(
            builder.validate(),
            Err(WiringError::DanglingNode { .. })
        ));
    }

    #[test]
    fn build_graph_dispatches_registered_kinds_in_edge_order() {
        use crate::nodes::constant;
        use crate::{AsNode, StreamOperators};
        use std::cell::RefCell;

        let graph_builder = GraphBuilder::new(
            vec![NodeBuilderKind::Native("ten".into()), NodeBuilderKind::Native("plus_one".into())],
            vec![Edge::new(0, vec![], 1, vec![])],
        );

        // Node 1's thunk closes over node 0's concretely-typed stream rather
        // than receiving it through `build_graph` itself: the host builds
        // registrations in the same id order `build_graph` walks, so by the
        // time node 1's thunk runs it already has a typed `Rc<dyn Stream<i64>>`
        // in hand, with no need to downcast a `dyn Node`.
        let ten = constant(10_i64);
        let seen_upstream = Rc::new(RefCell::new(false));
        let seen_upstream_check = seen_upstream.clone();
        let plus_one_upstream = ten.clone();

        let mut registry = HashMap::new();
        registry.insert(
            0,
            RegisteredNode::new(NodeBuilderKind::Native("ten".into()), move || ten.as_node()),
        );
        registry.insert(
            1,
            RegisteredNode::new(NodeBuilderKind::Native("plus_one".into()), move || {
                *seen_upstream_check.borrow_mut() = true;
                plus_one_upstream.map(|v| v + 1).as_node()
            }),
        );

        let built = build_graph(&graph_builder, registry).unwrap();
        assert_eq!(built.len(), 2);
        assert!(*seen_upstream.borrow());
    }

    #[test]
    fn build_graph_rejects_kind_mismatch() {
        let graph_builder = GraphBuilder::new(vec![NodeBuilderKind::Python], vec![]);
        let mut registry = HashMap::new();
        registry.insert(
            0,
            RegisteredNode::new(NodeBuilderKind::Native("wrong".into()), || {
                crate::nodes::constant(1_i64).as_node()
            }),
        );
        assert!(matches!(
            build_graph(&graph_builder, registry),
            Err(WiringError::MissingBuilder { .. })
        ));
    }

    #[test]
    fn build_graph_rejects_missing_registration() {
        let graph_builder = GraphBuilder::new(vec![NodeBuilderKind::Python], vec![]);
        let registry = HashMap::new();
        assert!(matches!(
            build_graph(&graph_builder, registry),
            Err(WiringError::MissingBuilder { .. })
        ));
    }

    #[test]
    fn graph_builder_round_trips_via_serde() {
        let builder = GraphBuilder::new(
            vec![NodeBuilderKind::Python, NodeBuilderKind::Native("custom_src".into())],
            vec![Edge::new(0, vec![1, 2], 1, vec![])],
        );
        let json = serde_json::to_string(&builder).unwrap();
        let round_tripped: GraphBuilder = serde_json::from_str(&json).unwrap();
        assert_eq!(builder, round_tripped);
    }
}
