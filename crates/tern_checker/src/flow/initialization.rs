//! Definite assignment of local `val`/`var` declarations without initializer.
//!
//! A forward may-analysis over the flow graph: for every tracked binding we
//! know whether some path reaches the point without an assignment, and
//! whether some path reaches it with one.

use super::graph::{FlowEvent, FlowGraph, FlowNodeId};
use crate::binding::{BindingId, BindingKind, BindingTable};
use std::collections::{BTreeMap, VecDeque};
use tern_inference::{Diagnostic, DiagnosticCode};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitState {
    pub may_unassigned: bool,
    pub may_assigned: bool,
}

impl InitState {
    fn merge_with(&mut self, other: InitState) -> bool {
        let merged = InitState {
            may_unassigned: self.may_unassigned || other.may_unassigned,
            may_assigned: self.may_assigned || other.may_assigned,
        };
        let changed = merged != *self;
        *self = merged;
        changed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct InitSnapshot {
    states: BTreeMap<BindingId, InitState>,
}

impl InitSnapshot {
    fn merge_with(&mut self, other: &InitSnapshot) -> bool {
        let mut changed = false;
        for (binding, state) in &other.states {
            match self.states.get_mut(binding) {
                Some(existing) => changed |= existing.merge_with(*state),
                None => {
                    self.states.insert(*binding, *state);
                    changed = true;
                }
            }
        }
        changed
    }
}

pub struct InitializationAnalysis<'a> {
    graph: &'a FlowGraph,
    bindings: &'a BindingTable,
}

impl<'a> InitializationAnalysis<'a> {
    pub fn new(graph: &'a FlowGraph, bindings: &'a BindingTable) -> Self {
        Self { graph, bindings }
    }

    fn tracked(&self, binding: BindingId) -> bool {
        let info = self.bindings.binding(binding);
        info.kind.is_assignable() && !info.has_initializer
    }

    pub fn run(&self) -> Vec<Diagnostic> {
        let in_states = self.solve();
        let mut diagnostics = Vec::new();
        for (node, state) in &in_states {
            if self.graph.is_dead(*node) {
                continue;
            }
            let mut state = state.clone();
            self.transfer(*node, &mut state, Some(&mut diagnostics));
        }
        tern_inference::diagnostics::normalize(&mut diagnostics);
        diagnostics
    }

    fn solve(&self) -> BTreeMap<FlowNodeId, InitSnapshot> {
        let mut worklist = VecDeque::new();
        let mut in_states: BTreeMap<FlowNodeId, InitSnapshot> = BTreeMap::new();

        in_states.insert(self.graph.entry(), InitSnapshot::default());
        worklist.push_back(self.graph.entry());
        let mut visits = 0usize;

        while let Some(node) = worklist.pop_front() {
            visits += 1;
            let mut state = in_states.get(&node).cloned().unwrap_or_default();
            self.transfer(node, &mut state, None);

            for edge in self.graph.adjacency(node) {
                if !edge.kind.is_feasible() {
                    continue;
                }
                let changed = match in_states.get_mut(&edge.to) {
                    Some(existing) => existing.merge_with(&state),
                    None => {
                        in_states.insert(edge.to, state.clone());
                        true
                    }
                };
                if changed {
                    worklist.push_back(edge.to);
                }
            }
        }

        debug!(nodes = self.graph.node_count(), visits, "initialization analysis converged");
        in_states
    }

    fn transfer(&self, node: FlowNodeId, state: &mut InitSnapshot, mut sink: Option<&mut Vec<Diagnostic>>) {
        for event in &self.graph.node(node).events {
            match event {
                FlowEvent::Declare { binding, initialized } => {
                    if !self.tracked(*binding) {
                        continue;
                    }
                    state.states.insert(
                        *binding,
                        InitState {
                            may_unassigned: !initialized,
                            may_assigned: *initialized,
                        },
                    );
                }
                FlowEvent::Read { binding, node, span } => {
                    let unassigned = state
                        .states
                        .get(binding)
                        .map_or(false, |current| current.may_unassigned);
                    if unassigned {
                        if let Some(diagnostics) = sink.as_deref_mut() {
                            let name = &self.bindings.binding(*binding).name;
                            diagnostics.push(
                                Diagnostic::new(DiagnosticCode::UninitializedVariable, span.clone())
                                    .at_node(*node)
                                    .with_argument(name.clone()),
                            );
                        }
                    }
                }
                FlowEvent::Assign { binding, node, span } => {
                    if let Some(diagnostics) = sink.as_deref_mut() {
                        if let Some(diagnostic) = self.check_assignment(*binding, *node, span, state) {
                            diagnostics.push(diagnostic);
                        }
                    }
                    if self.tracked(*binding) {
                        state.states.insert(
                            *binding,
                            InitState {
                                may_unassigned: false,
                                may_assigned: true,
                            },
                        );
                    }
                }
            }
        }
    }

    fn check_assignment(
        &self,
        binding: BindingId,
        node: tern_ast::NodeId,
        span: &tern_ast::Span,
        state: &InitSnapshot,
    ) -> Option<Diagnostic> {
        let info = self.bindings.binding(binding);
        let reassignment = || {
            Diagnostic::new(DiagnosticCode::ValReassignment, span.clone())
                .at_node(node)
                .with_argument(info.name.clone())
        };
        if !info.kind.is_assignable() {
            return Some(reassignment());
        }
        if info.kind != BindingKind::LocalVal {
            return None;
        }
        if info.has_initializer {
            return Some(reassignment());
        }
        if self.bindings.is_captured_assignment(node) {
            return Some(
                Diagnostic::new(DiagnosticCode::CapturedValInitialization, span.clone())
                    .at_node(node)
                    .with_argument(info.name.clone()),
            );
        }
        let assigned = state
            .states
            .get(&binding)
            .map_or(false, |current| current.may_assigned);
        assigned.then(reassignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_a_union_of_possibilities() {
        let mut left = InitState {
            may_unassigned: true,
            may_assigned: false,
        };
        let changed = left.merge_with(InitState {
            may_unassigned: false,
            may_assigned: true,
        });
        assert!(changed);
        assert!(left.may_unassigned && left.may_assigned);
        assert!(!left.merge_with(InitState::default()));
    }
}
