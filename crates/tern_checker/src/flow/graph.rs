use super::narrowing::{DataFlowInfo, FlowDelta};
use crate::binding::BindingId;
use smallvec::SmallVec;
use tern_ast::{NodeId, Span};

pub type FlowNodeId = usize;

/// Control-flow graph of one body. Nodes carry the flow information valid
/// after them; edges carry the facts a branch adds.
#[derive(Clone, Debug)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    adjacency: Vec<Vec<FlowEdge>>,    // outgoing edges
    predecessors: Vec<Vec<FlowEdge>>, // incoming edges
    entry: FlowNodeId,
    exit: FlowNodeId,
}

impl FlowGraph {
    pub fn new(span: Span, info: DataFlowInfo) -> Self {
        let mut entry = FlowNode::new(FlowNodeKind::Entry, None, span);
        entry.info = info;
        let mut exit = FlowNode::new(FlowNodeKind::Exit, None, span);
        exit.dead = true;

        Self {
            nodes: vec![entry, exit],
            adjacency: vec![Vec::new(), Vec::new()],
            predecessors: vec![Vec::new(), Vec::new()],
            entry: 0,
            exit: 1,
        }
    }

    pub fn entry(&self) -> FlowNodeId {
        self.entry
    }

    pub fn exit(&self) -> FlowNodeId {
        self.exit
    }

    pub fn node(&self, id: FlowNodeId) -> &FlowNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: FlowNodeId) -> &mut FlowNode {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn adjacency(&self, id: FlowNodeId) -> &[FlowEdge] {
        &self.adjacency[id]
    }

    pub fn predecessors(&self, id: FlowNodeId) -> &[FlowEdge] {
        &self.predecessors[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self, kind: FlowNodeKind, ast: Option<NodeId>, span: Span) -> FlowNodeId {
        let id = self.nodes.len();
        self.nodes.push(FlowNode::new(kind, ast, span));
        self.adjacency.push(Vec::new());
        self.predecessors.push(Vec::new());
        id
    }

    pub fn add_edge(&mut self, from: FlowNodeId, to: FlowNodeId, kind: FlowEdgeKind) {
        let edge = FlowEdge { from, to, kind };
        self.adjacency[from].push(edge.clone());
        self.predecessors[to].push(edge);
    }

    /// Whether `node` can be reached from a live predecessor.
    pub fn is_dead(&self, node: FlowNodeId) -> bool {
        self.nodes[node].dead
    }

    /// Flow information entering `node`: the merge of every live predecessor
    /// with the delta of its edge applied. Closure and loop-back edges do not
    /// contribute.
    pub fn incoming_info(&self, node: FlowNodeId) -> Option<DataFlowInfo> {
        let mut merged: Option<DataFlowInfo> = None;
        for edge in &self.predecessors[node] {
            let source = &self.nodes[edge.from];
            if source.dead {
                continue;
            }
            let info = match &edge.kind {
                FlowEdgeKind::Normal | FlowEdgeKind::Jump | FlowEdgeKind::Exceptional => source.info.clone(),
                FlowEdgeKind::TrueBranch { delta } | FlowEdgeKind::FalseBranch { delta } => {
                    if delta.unreachable {
                        continue;
                    }
                    source.info.apply(delta)
                }
                FlowEdgeKind::LoopBack | FlowEdgeKind::Closure => continue,
            };
            merged = Some(match merged {
                Some(current) => current.merge(&info),
                None => info,
            });
        }
        merged
    }

    /// Copies the nodes `start..end` and their edges. Edges between copied
    /// nodes are redirected to the copies; edges leaving the region keep their
    /// target. Returns the old-to-new mapping offset: the copy of node `n` is
    /// `n + offset`.
    pub fn copy_region(&mut self, start: FlowNodeId, end: FlowNodeId) -> usize {
        let offset = self.nodes.len() - start;
        for id in start..end {
            let copy = self.nodes[id].clone();
            self.nodes.push(copy);
            self.adjacency.push(Vec::new());
            self.predecessors.push(Vec::new());
        }
        for id in start..end {
            let edges = self.adjacency[id].clone();
            for edge in edges {
                let to = if (start..end).contains(&edge.to) {
                    edge.to + offset
                } else {
                    edge.to
                };
                self.add_edge(id + offset, to, edge.kind);
            }
        }
        offset
    }
}

#[derive(Clone, Debug)]
pub struct FlowNode {
    pub kind: FlowNodeKind,
    /// Tree node this flow point belongs to.
    pub ast: Option<NodeId>,
    pub span: Span,
    pub events: SmallVec<[FlowEvent; 2]>,
    /// Flow information after the node.
    pub info: DataFlowInfo,
    /// No live path reaches the node.
    pub dead: bool,
}

impl FlowNode {
    pub fn new(kind: FlowNodeKind, ast: Option<NodeId>, span: Span) -> Self {
        Self {
            kind,
            ast,
            span,
            events: SmallVec::new(),
            info: DataFlowInfo::empty(),
            dead: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowNodeKind {
    Entry,
    Exit,
    Expression,
    Statement,
    Condition,
    Merge,
    LoopHeader,
    TryEnter,
    CatchEnter,
    FinallyEnter,
    FinallyExit,
    ClosureEnter,
    ClosureExit,
    /// Continuation after a jump; only reachable by construction, never by
    /// flow.
    Unreachable,
}

#[derive(Clone, Debug)]
pub struct FlowEdge {
    pub from: FlowNodeId,
    pub to: FlowNodeId,
    pub kind: FlowEdgeKind,
}

#[derive(Clone, Debug)]
pub enum FlowEdgeKind {
    Normal,
    TrueBranch { delta: FlowDelta },
    FalseBranch { delta: FlowDelta },
    /// `return`, `break` and `continue`.
    Jump,
    LoopBack,
    Exceptional,
    /// From a lambda or local function declaration into its body.
    Closure,
}

impl FlowEdgeKind {
    /// Whether initialization state flows along the edge.
    pub fn is_feasible(&self) -> bool {
        match self {
            FlowEdgeKind::TrueBranch { delta } | FlowEdgeKind::FalseBranch { delta } => !delta.unreachable,
            _ => true,
        }
    }
}

/// What a node does to local bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowEvent {
    Declare {
        binding: BindingId,
        initialized: bool,
    },
    Assign {
        binding: BindingId,
        /// Assignment statement node.
        node: NodeId,
        span: Span,
    },
    Read {
        binding: BindingId,
        node: NodeId,
        span: Span,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_region_redirects_internal_edges_only() {
        let mut graph = FlowGraph::new(Span::dummy(), DataFlowInfo::empty());
        let first = graph.add_node(FlowNodeKind::FinallyEnter, None, Span::dummy());
        let second = graph.add_node(FlowNodeKind::Statement, None, Span::dummy());
        graph.add_edge(first, second, FlowEdgeKind::Normal);
        graph.add_edge(second, graph.exit(), FlowEdgeKind::Jump);

        let offset = graph.copy_region(first, second + 1);
        let copy_first = first + offset;
        let copy_second = second + offset;
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.adjacency(copy_first)[0].to, copy_second);
        assert_eq!(graph.adjacency(copy_second)[0].to, graph.exit());
        assert!(graph.predecessors(first).is_empty());
    }

    #[test]
    fn unreachable_branch_does_not_contribute() {
        let mut graph = FlowGraph::new(Span::dummy(), DataFlowInfo::empty());
        let merge = graph.add_node(FlowNodeKind::Merge, None, Span::dummy());
        graph.add_edge(
            graph.entry(),
            merge,
            FlowEdgeKind::FalseBranch {
                delta: FlowDelta::unreachable(),
            },
        );
        assert!(graph.incoming_info(merge).is_none());
    }
}
