//! Local bindings of one body: which declaration every simple name refers
//! to, and the facts about writes that flow analysis needs up front.

mod resolver;

pub use resolver::BindingResolver;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fmt;
use tern_ast::{NodeId, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingId(u32);

impl BindingId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BindingKind {
    Parameter,
    LocalVal,
    LocalVar,
    LambdaParameter,
    /// The implicit `it` of a lambda without declared parameters.
    ImplicitIt,
    LoopVariable,
    CatchParameter,
    WhenSubject,
}

impl BindingKind {
    /// Only locals may be assigned after their declaration.
    pub fn is_assignable(self) -> bool {
        matches!(self, BindingKind::LocalVal | BindingKind::LocalVar)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub id: BindingId,
    pub name: String,
    pub kind: BindingKind,
    /// Parameter, local variable, catch clause, when subject or lambda node.
    pub declaration: NodeId,
    pub span: Span,
    pub mutable: bool,
    pub has_initializer: bool,
    /// Closest enclosing closure at the declaration.
    pub closure: Option<NodeId>,
    pub written_in_closure: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    pub(crate) bindings: Vec<BindingInfo>,
    pub(crate) references: FxHashMap<NodeId, BindingId>,
    pub(crate) callee_references: FxHashMap<NodeId, BindingId>,
    pub(crate) declarations: FxHashMap<NodeId, BindingId>,
    pub(crate) loop_assignments: FxHashMap<NodeId, Vec<BindingId>>,
    pub(crate) captured_assignments: FxHashSet<NodeId>,
}

impl BindingTable {
    pub fn binding(&self, id: BindingId) -> &BindingInfo {
        &self.bindings[id.index()]
    }

    pub fn bindings(&self) -> &[BindingInfo] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binding a `Name` expression refers to.
    pub fn reference(&self, node: NodeId) -> Option<BindingId> {
        self.references.get(&node).copied()
    }

    /// Binding called through `invoke` by a call with a simple-name callee.
    pub fn callee(&self, call: NodeId) -> Option<BindingId> {
        self.callee_references.get(&call).copied()
    }

    pub fn declared_at(&self, node: NodeId) -> Option<BindingId> {
        self.declarations.get(&node).copied()
    }

    /// Bindings assigned anywhere inside the loop, including nested closures.
    pub fn assigned_in_loop(&self, loop_node: NodeId) -> &[BindingId] {
        self.loop_assignments
            .get(&loop_node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Assignment statement that writes a binding from inside a closure
    /// other than the one declaring it.
    pub fn is_captured_assignment(&self, assignment: NodeId) -> bool {
        self.captured_assignments.contains(&assignment)
    }

    /// Stable bindings keep their narrowings across calls and into lambdas.
    pub fn is_stable(&self, id: BindingId) -> bool {
        let binding = self.binding(id);
        !binding.mutable || !binding.written_in_closure
    }
}
