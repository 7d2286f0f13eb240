//! `mesh`: a set of inter-connected sub-graph members wired into one shared
//! embedded graph, with members subscribing to each other's output by name
//! (§4.5.4). Like `map_`, membership is driven at runtime by a `TSD` of
//! specs rather than fixed at construction — adding, removing, or
//! replacing a member's spec tears down and rebuilds the shared embedded
//! graph from the live set, in freshly recomputed dependency order. A
//! cycle among the live dependency edges is a fatal error (§4.5.4).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::WiringError;
use crate::signature::{NodeSignature, NodeTypeEnum};
use crate::ts::{Delta, TsdDelta};
use crate::{AsNode, Element, Graph, GraphState, MutableNode, Node, RunFor, RunMode, Stream, StreamPeek, UpStreams};

/// One member's build recipe: the names it subscribes to (`depends_on`,
/// its `context_path` edges) and the closure that builds its output stream
/// from the already-built outputs of those dependencies.
pub struct MeshMemberSpec<OUT: Element> {
    pub depends_on: Vec<String>,
    pub build: Rc<dyn Fn(&HashMap<String, Rc<dyn Stream<OUT>>>) -> Rc<dyn Stream<OUT>>>,
}

impl<OUT: Element> MeshMemberSpec<OUT> {
    pub fn new(
        depends_on: Vec<String>,
        build: impl Fn(&HashMap<String, Rc<dyn Stream<OUT>>>) -> Rc<dyn Stream<OUT>> + 'static,
    ) -> Self {
        Self {
            depends_on,
            build: Rc::new(build),
        }
    }
}

impl<OUT: Element> Clone for MeshMemberSpec<OUT> {
    fn clone(&self) -> Self {
        Self {
            depends_on: self.depends_on.clone(),
            build: self.build.clone(),
        }
    }
}

impl<OUT: Element> std::fmt::Debug for MeshMemberSpec<OUT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshMemberSpec").field("depends_on", &self.depends_on).finish()
    }
}

impl<OUT: Element> Default for MeshMemberSpec<OUT> {
    fn default() -> Self {
        Self {
            depends_on: Vec::new(),
            build: Rc::new(|_built| crate::nodes::constant(OUT::default())),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Topologically sorts the live `specs` by `depends_on`, or reports the
/// cycle. Visits member names in sorted order so the result is
/// deterministic across rebuilds that don't change membership.
fn topo_sort<OUT: Element>(specs: &HashMap<String, MeshMemberSpec<OUT>>) -> Result<Vec<String>, WiringError> {
    fn visit<OUT: Element>(
        name: &str,
        specs: &HashMap<String, MeshMemberSpec<OUT>>,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<(), WiringError> {
        match marks.get(name).copied().unwrap_or(Mark::Done) {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let path = stack
                    .iter()
                    .skip_while(|s| s.as_str() != name)
                    .cloned()
                    .chain(std::iter::once(name.to_string()))
                    .collect::<Vec<_>>()
                    .join("->");
                return Err(WiringError::MeshCycle { path });
            }
            Mark::Unvisited => {}
        }
        marks.insert(name.to_string(), Mark::InProgress);
        stack.push(name.to_string());
        if let Some(spec) = specs.get(name) {
            for dep in &spec.depends_on {
                visit(dep, specs, marks, stack, order)?;
            }
        }
        stack.pop();
        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut marks: HashMap<String, Mark> = specs.keys().map(|k| (k.clone(), Mark::Unvisited)).collect();
    let mut order = Vec::with_capacity(specs.len());
    let mut stack = Vec::new();
    let mut names: Vec<String> = specs.keys().cloned().collect();
    names.sort();
    for name in &names {
        visit(name, specs, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

/// Owns the shared embedded graph for the mesh's currently live members,
/// rebuilding it whenever membership changes (§4.5.4, sibling of `map_`).
pub struct MeshNode<OUT: Element> {
    source: Rc<dyn Stream<TsdDelta<String, MeshMemberSpec<OUT>>>>,
    specs: HashMap<String, MeshMemberSpec<OUT>>,
    signature: NodeSignature,
    graph: Option<Graph>,
    outputs: HashMap<String, Rc<dyn Stream<OUT>>>,
    values: HashMap<String, OUT>,
    added: HashSet<String>,
    removed: HashSet<String>,
}

impl<OUT: Element> MeshNode<OUT> {
    pub fn new(source: Rc<dyn Stream<TsdDelta<String, MeshMemberSpec<OUT>>>>) -> Self {
        Self {
            source,
            specs: HashMap::new(),
            signature: NodeSignature::new("mesh", NodeTypeEnum::Compute, "mesh"),
            graph: None,
            outputs: HashMap::new(),
            values: HashMap::new(),
            added: HashSet::new(),
            removed: HashSet::new(),
        }
    }

    pub fn values(&self) -> &HashMap<String, OUT> {
        &self.values
    }
    pub fn added_members(&self) -> &HashSet<String> {
        &self.added
    }
    pub fn removed_members(&self) -> &HashSet<String> {
        &self.removed
    }
    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }

    fn rebuild(&mut self, state: &mut GraphState) {
        let order = topo_sort(&self.specs).unwrap_or_else(|err| panic!("{err}"));
        if let Some(mut old) = self.graph.take() {
            old.finalise_embedded();
        }
        let mut built: HashMap<String, Rc<dyn Stream<OUT>>> = HashMap::new();
        let mut roots: Vec<Rc<dyn Node>> = Vec::new();
        for name in &order {
            let spec = &self.specs[name];
            let output = (spec.build)(&built);
            roots.push(output.clone().as_node());
            built.insert(name.clone(), output);
        }
        let mut graph = Graph::new(roots, RunMode::HistoricalFrom(state.time()), RunFor::Forever);
        graph.initialise_embedded();
        self.values = built.iter().map(|(k, v)| (k.clone(), v.peek_value())).collect();
        self.outputs = built;
        self.graph = Some(graph);
    }
}

impl<OUT: Element> MutableNode for MeshNode<OUT> {
    fn cycle(&mut self, state: &mut GraphState) -> bool {
        self.added.clear();
        self.removed.clear();
        let mut membership_changed = false;
        for (name, delta) in self.source.peek_value() {
            match delta {
                Delta::Remove => {
                    if self.specs.remove(&name).is_some() {
                        self.removed.insert(name);
                        membership_changed = true;
                    }
                }
                Delta::Value(spec) => {
                    self.specs.insert(name.clone(), spec);
                    self.added.insert(name);
                    membership_changed = true;
                }
            }
        }
        if !membership_changed {
            return false;
        }
        self.rebuild(state);
        true
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }

    fn teardown(&mut self, _state: &mut GraphState) {
        if let Some(mut graph) = self.graph.take() {
            graph.finalise_embedded();
        }
    }
}

/// Builds a `mesh` node: `source` is a `TSD` of member specs keyed by
/// member name, each allowed to declare `depends_on` other members in the
/// same batch. Membership changes tear down and rebuild the shared
/// embedded graph in freshly recomputed dependency order; a cyclic set of
/// dependencies is a fatal error (§4.5.4).
pub fn mesh<OUT: Element>(
    source: Rc<dyn Stream<TsdDelta<String, MeshMemberSpec<OUT>>>>,
) -> Rc<RefCell<MeshNode<OUT>>> {
    Rc::new(RefCell::new(MeshNode::new(source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::{NanoTime, RunFor as TopRunFor, RunMode as TopRunMode};
    use std::time::Duration;

    fn deltas_for(cycle: u64) -> TsdDelta<String, MeshMemberSpec<i32>> {
        match cycle {
            0 => HashMap::from([(
                "base".to_string(),
                Delta::Value(MeshMemberSpec::new(vec![], |_built| crate::nodes::constant(10))),
            )]),
            1 => HashMap::from([(
                "derived".to_string(),
                Delta::Value(MeshMemberSpec::new(vec!["base".to_string()], |built| {
                    built["base"].clone().map(|v| v * 2)
                })),
            )]),
            _ => HashMap::new(),
        }
    }

    #[test]
    fn wires_members_in_dependency_order_as_they_arrive() {
        let source = ticker(Duration::from_millis(1)).count();
        let deltas = source.map(|x| deltas_for(x - 1));
        let node = mesh(deltas);
        let as_node = node.clone().as_node();
        as_node
            .run(TopRunMode::HistoricalFrom(NanoTime::ZERO), TopRunFor::Cycles(2))
            .unwrap();
        assert_eq!(node.borrow().values().get("derived"), Some(&20));
    }

    #[test]
    fn topo_sort_rejects_cyclic_dependencies() {
        let specs: HashMap<String, MeshMemberSpec<i32>> = HashMap::from([
            (
                "a".to_string(),
                MeshMemberSpec::new(vec!["b".to_string()], |built| built["b"].clone()),
            ),
            (
                "b".to_string(),
                MeshMemberSpec::new(vec!["a".to_string()], |built| built["a"].clone()),
            ),
        ]);
        let err = topo_sort(&specs).unwrap_err();
        assert!(matches!(err, WiringError::MeshCycle { .. }));
    }
}
