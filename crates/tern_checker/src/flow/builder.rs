//! Incremental construction of a body's flow graph.
//!
//! The expression typer drives the builder while it walks the body, so the
//! flow information at the current point is always available for the next
//! read. Jumps are routed through the frames that enclose them: loops,
//! `try` blocks with a `finally` part, and closures.

use super::graph::{FlowEdgeKind, FlowEvent, FlowGraph, FlowNodeId, FlowNodeKind};
use super::narrowing::{DataFlowInfo, FlowDelta, FlowVariable};
use tern_ast::{InvocationKind, NodeId, Span};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    Return,
    Break(NodeId),
    Continue(NodeId),
}

#[derive(Debug, Clone, Copy)]
pub struct LoopHandle {
    pub id: NodeId,
    pub header: FlowNodeId,
    pub exit: FlowNodeId,
}

#[derive(Debug, Clone, Copy)]
pub struct TryHandle {
    pub enter: FlowNodeId,
    /// Entry of the catch clauses; exceptions of the body arrive here.
    pub dispatch: Option<FlowNodeId>,
    /// Exceptional entry of the `finally` part.
    pub rethrow: Option<FlowNodeId>,
}

#[derive(Debug, Clone)]
pub struct FinallyRegion {
    start: FlowNodeId,
    normal_exits: Vec<FlowNodeId>,
    rethrow: Option<FlowNodeId>,
    pending: Vec<PendingJump>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClosureHandle {
    pub origin: FlowNodeId,
    pub enter: FlowNodeId,
    pub exit: FlowNodeId,
    pub invocation: InvocationKind,
}

#[derive(Debug, Clone, Copy)]
struct PendingJump {
    from: FlowNodeId,
    target: JumpTarget,
}

#[derive(Debug, Clone)]
enum Frame {
    Loop(LoopHandle),
    Try {
        handler: Option<FlowNodeId>,
        has_finally: bool,
        pending: Vec<PendingJump>,
    },
    Closure {
        exit: FlowNodeId,
        in_place: bool,
    },
}

pub struct FlowBuilder {
    graph: FlowGraph,
    current: FlowNodeId,
    frames: Vec<Frame>,
}

impl FlowBuilder {
    pub fn new(span: Span, info: DataFlowInfo) -> Self {
        let graph = FlowGraph::new(span, info);
        let current = graph.entry();
        Self {
            graph,
            current,
            frames: Vec::new(),
        }
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn current(&self) -> FlowNodeId {
        self.current
    }

    pub fn is_dead(&self) -> bool {
        self.graph.is_dead(self.current)
    }

    pub fn info(&self) -> DataFlowInfo {
        self.graph.node(self.current).info.clone()
    }

    pub fn info_at(&self, node: FlowNodeId) -> DataFlowInfo {
        self.graph.node(node).info.clone()
    }

    pub fn set_info(&mut self, info: DataFlowInfo) {
        self.graph.node_mut(self.current).info = info;
    }

    pub fn record(&mut self, event: FlowEvent) {
        self.graph.node_mut(self.current).events.push(event);
    }

    /// Connects the builder's own bookkeeping of liveness with the edge.
    fn connect(&mut self, from: FlowNodeId, to: FlowNodeId, kind: FlowEdgeKind) {
        let live = !self.graph.is_dead(from) && kind.is_feasible();
        self.graph.add_edge(from, to, kind);
        if live {
            self.graph.node_mut(to).dead = false;
        }
    }

    /// Node with no predecessors yet; it becomes live once a live edge
    /// reaches it.
    fn pending_node(&mut self, kind: FlowNodeKind, span: Span) -> FlowNodeId {
        let node = self.graph.add_node(kind, None, span);
        let info = self.info();
        let target = self.graph.node_mut(node);
        target.dead = true;
        target.info = info;
        node
    }

    /// Recomputes the incoming information of a node whose predecessors
    /// were added after it was created.
    fn refresh(&mut self, node: FlowNodeId) {
        if let Some(info) = self.graph.incoming_info(node) {
            self.graph.node_mut(node).info = info;
        }
    }

    /// Appends a node after the current one.
    pub fn emit(&mut self, kind: FlowNodeKind, ast: Option<NodeId>, span: Span) -> FlowNodeId {
        let node = self.graph.add_node(kind, ast, span);
        let previous = self.current;
        let info = self.graph.node(previous).info.clone();
        let dead = self.graph.is_dead(previous);
        {
            let target = self.graph.node_mut(node);
            target.info = info;
            target.dead = true;
        }
        self.connect(previous, node, FlowEdgeKind::Normal);
        self.graph.node_mut(node).dead = dead;
        if let Some(handler) = self.exception_target() {
            self.connect(node, handler, FlowEdgeKind::Exceptional);
        }
        self.current = node;
        node
    }

    /// Joins several incoming edges into a new node and continues there.
    pub fn join(
        &mut self,
        incoming: Vec<(FlowNodeId, FlowEdgeKind)>,
        kind: FlowNodeKind,
        ast: Option<NodeId>,
        span: Span,
    ) -> FlowNodeId {
        let fallback = self.info();
        let node = self.graph.add_node(kind, ast, span);
        self.graph.node_mut(node).dead = true;
        for (from, edge) in incoming {
            self.connect(from, node, edge);
        }
        let info = self.graph.incoming_info(node).unwrap_or(fallback);
        self.graph.node_mut(node).info = info;
        self.current = node;
        node
    }

    /// Continues at `node`, e.g. the exit of a loop.
    pub fn resume_at(&mut self, node: FlowNodeId) {
        self.refresh(node);
        self.current = node;
    }

    /// Continues after a jump: the new current node is unreachable.
    fn detach(&mut self, span: Span) {
        let info = self.info();
        let node = self.graph.add_node(FlowNodeKind::Unreachable, None, span);
        let target = self.graph.node_mut(node);
        target.dead = true;
        target.info = info;
        self.current = node;
    }

    fn exception_target(&self) -> Option<FlowNodeId> {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Try {
                    handler: Some(handler), ..
                } => return Some(*handler),
                Frame::Closure { in_place: false, .. } => return None,
                _ => {}
            }
        }
        None
    }

    /// `throw`, or a call that never returns.
    pub fn throw(&mut self, span: Span) {
        let from = self.current;
        let target = self.exception_target().unwrap_or_else(|| self.closure_or_exit());
        // The handler may already hold the edge added by `emit`.
        if !self
            .graph
            .adjacency(from)
            .iter()
            .any(|edge| edge.to == target && matches!(edge.kind, FlowEdgeKind::Exceptional))
        {
            self.connect(from, target, FlowEdgeKind::Exceptional);
        }
        self.detach(span);
    }

    fn closure_or_exit(&self) -> FlowNodeId {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| match frame {
                Frame::Closure { exit, in_place: false } => Some(*exit),
                _ => None,
            })
            .unwrap_or_else(|| self.graph.exit())
    }

    /// Innermost loop `break`/`continue` may refer to.
    pub fn innermost_loop(&self) -> Option<NodeId> {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Loop(handle) => return Some(handle.id),
                Frame::Closure { .. } => return None,
                Frame::Try { .. } => {}
            }
        }
        None
    }

    pub fn jump(&mut self, target: JumpTarget, span: Span) {
        let from = self.current;
        let depth = self.frames.len();
        self.route_jump(from, target, depth);
        self.detach(span);
    }

    /// Routes a jump through the frames below `depth`.
    fn route_jump(&mut self, from: FlowNodeId, target: JumpTarget, depth: usize) {
        for index in (0..depth).rev() {
            match &mut self.frames[index] {
                Frame::Try {
                    has_finally: true,
                    pending,
                    ..
                } => {
                    pending.push(PendingJump { from, target });
                    return;
                }
                Frame::Try { .. } => {}
                Frame::Loop(handle) => {
                    let handle = *handle;
                    match target {
                        JumpTarget::Continue(id) if id == handle.id => {
                            self.connect(from, handle.header, FlowEdgeKind::LoopBack);
                            return;
                        }
                        JumpTarget::Break(id) if id == handle.id => {
                            self.connect(from, handle.exit, FlowEdgeKind::Jump);
                            return;
                        }
                        _ => {}
                    }
                }
                Frame::Closure { exit, .. } => {
                    let exit = *exit;
                    self.connect(from, exit, FlowEdgeKind::Jump);
                    return;
                }
            }
        }
        let exit = self.graph.exit();
        self.connect(from, exit, FlowEdgeKind::Jump);
    }

    /// Normal end of the body.
    pub fn finish(mut self) -> FlowGraph {
        let exit = self.graph.exit();
        let from = self.current;
        self.connect(from, exit, FlowEdgeKind::Normal);
        self.refresh(exit);
        self.graph
    }

    // ---- loops ------------------------------------------------------------

    /// Header of a loop. Facts about bindings assigned inside the loop do not
    /// hold on the second iteration, so they are dropped here.
    pub fn enter_loop(&mut self, id: NodeId, span: Span, assigned: &[FlowVariable]) -> LoopHandle {
        let header = self.emit(FlowNodeKind::LoopHeader, Some(id), span);
        let info = self.info().forget_all(assigned);
        self.set_info(info);
        let exit = self.pending_node(FlowNodeKind::Merge, span);
        let handle = LoopHandle { id, header, exit };
        self.frames.push(Frame::Loop(handle));
        handle
    }

    pub fn loop_back(&mut self, handle: LoopHandle) {
        let from = self.current;
        self.connect(from, handle.header, FlowEdgeKind::LoopBack);
    }

    /// Edge from a condition into the loop exit.
    pub fn exit_edge(&mut self, handle: LoopHandle, from: FlowNodeId, kind: FlowEdgeKind) {
        self.connect(from, handle.exit, kind);
    }

    pub fn leave_loop(&mut self, handle: LoopHandle) {
        if let Some(Frame::Loop(top)) = self.frames.last() {
            debug_assert_eq!(top.id, handle.id);
            self.frames.pop();
        }
        self.resume_at(handle.exit);
    }

    // ---- branches -----------------------------------------------------------

    pub fn branch(&mut self, from: FlowNodeId, positive: bool, delta: FlowDelta) -> (FlowNodeId, FlowEdgeKind) {
        let kind = if positive {
            FlowEdgeKind::TrueBranch { delta }
        } else {
            FlowEdgeKind::FalseBranch { delta }
        };
        (from, kind)
    }

    // ---- try / catch / finally ---------------------------------------------

    pub fn enter_try(&mut self, ast: NodeId, span: Span, has_catches: bool, has_finally: bool) -> TryHandle {
        let dispatch = has_catches.then(|| self.pending_node(FlowNodeKind::Merge, span));
        let rethrow = has_finally.then(|| self.pending_node(FlowNodeKind::FinallyEnter, span));
        self.frames.push(Frame::Try {
            handler: dispatch.or(rethrow),
            has_finally,
            pending: Vec::new(),
        });
        let enter = self.emit(FlowNodeKind::TryEnter, Some(ast), span);
        TryHandle {
            enter,
            dispatch,
            rethrow,
        }
    }

    /// Switches from the protected body to the catch clauses. Returns the
    /// node every catch clause starts from.
    pub fn begin_catches(&mut self, handle: TryHandle) -> Option<FlowNodeId> {
        if let Some(Frame::Try { handler, .. }) = self.frames.last_mut() {
            *handler = handle.rethrow;
        }
        let dispatch = handle.dispatch?;
        self.refresh(dispatch);
        Some(dispatch)
    }

    /// Ends a `try` without `finally`: the live ends of body and catches
    /// merge.
    pub fn leave_try(&mut self, normal_exits: Vec<FlowNodeId>, span: Span) {
        self.frames.pop();
        self.merge_exits(normal_exits, span);
    }

    fn merge_exits(&mut self, exits: Vec<FlowNodeId>, span: Span) {
        if exits.is_empty() {
            self.detach(span);
            return;
        }
        let incoming = exits.into_iter().map(|from| (from, FlowEdgeKind::Normal)).collect();
        self.join(incoming, FlowNodeKind::Merge, None, span);
    }

    /// Starts the `finally` template. It is typed once, with the information
    /// of every way into it merged, and copied per exit afterwards.
    pub fn begin_finally(&mut self, handle: TryHandle, normal_exits: Vec<FlowNodeId>, span: Span) -> FinallyRegion {
        let pending = match self.frames.pop() {
            Some(Frame::Try { pending, .. }) => pending,
            _ => Vec::new(),
        };
        if let Some(rethrow) = handle.rethrow {
            self.refresh(rethrow);
        }

        let mut sources: Vec<FlowNodeId> = normal_exits.clone();
        sources.extend(handle.rethrow);
        sources.extend(pending.iter().map(|jump| jump.from));
        let live: Vec<FlowNodeId> = sources
            .iter()
            .copied()
            .filter(|node| !self.graph.is_dead(*node))
            .collect();
        let info = live
            .iter()
            .map(|node| self.info_at(*node))
            .reduce(|left, right| left.merge(&right))
            .unwrap_or_else(|| self.info());

        let start = self.graph.add_node(FlowNodeKind::FinallyEnter, None, span);
        let template = self.graph.node_mut(start);
        template.info = info;
        template.dead = live.is_empty();
        self.current = start;
        FinallyRegion {
            start,
            normal_exits,
            rethrow: handle.rethrow,
            pending,
        }
    }

    /// Expands the typed `finally` template into one copy per exit label:
    /// normal completion, exceptional completion and every pending jump.
    pub fn end_finally(&mut self, region: FinallyRegion, span: Span) {
        let template_exit = self.emit(FlowNodeKind::FinallyExit, None, span);
        let end = template_exit + 1;
        let FinallyRegion {
            start,
            normal_exits,
            rethrow,
            pending,
        } = region;
        trace!(start, end, jumps = pending.len(), "expanding finally region");

        let mut continuation = None;
        if !normal_exits.is_empty() {
            let offset = self.copy_template(start, end);
            for from in normal_exits {
                self.connect(from, start + offset, FlowEdgeKind::Normal);
            }
            self.propagate_liveness(start + offset, end + offset);
            continuation = Some(template_exit + offset);
        }

        if let Some(rethrow) = rethrow {
            if !self.graph.predecessors(rethrow).is_empty() {
                let offset = self.copy_template(start, end);
                self.connect(rethrow, start + offset, FlowEdgeKind::Normal);
                self.propagate_liveness(start + offset, end + offset);
                self.current = template_exit + offset;
                self.throw(span);
            }
        }

        for jump in pending {
            let offset = self.copy_template(start, end);
            self.connect(jump.from, start + offset, FlowEdgeKind::Jump);
            self.propagate_liveness(start + offset, end + offset);
            let depth = self.frames.len();
            self.route_jump(template_exit + offset, jump.target, depth);
        }

        match continuation {
            Some(node) => {
                self.refresh(node);
                self.current = node;
            }
            None => self.detach(span),
        }
    }

    fn copy_template(&mut self, start: FlowNodeId, end: FlowNodeId) -> usize {
        let offset = self.graph.copy_region(start, end);
        for node in start + offset..end + offset {
            self.graph.node_mut(node).dead = true;
        }
        offset
    }

    /// Liveness of a copied region follows from the edge that enters it.
    fn propagate_liveness(&mut self, start: FlowNodeId, end: FlowNodeId) {
        let mut changed = true;
        while changed {
            changed = false;
            for node in start..end {
                if !self.graph.is_dead(node) {
                    continue;
                }
                let live = self
                    .graph
                    .predecessors(node)
                    .iter()
                    .any(|edge| !self.graph.is_dead(edge.from) && edge.kind.is_feasible());
                if live {
                    self.graph.node_mut(node).dead = false;
                    changed = true;
                }
            }
        }
        for node in start..end {
            if self.graph.is_dead(node) {
                continue;
            }
            let targets: Vec<FlowNodeId> = self
                .graph
                .adjacency(node)
                .iter()
                .filter(|edge| edge.to >= end || edge.to < start)
                .filter(|edge| edge.kind.is_feasible())
                .map(|edge| edge.to)
                .collect();
            for target in targets {
                self.graph.node_mut(target).dead = false;
            }
        }
    }

    // ---- closures -------------------------------------------------------------

    /// Enters a lambda or local function body. In-place lambdas run inline;
    /// everything else is entered through a closure edge and does not flow
    /// back.
    pub fn enter_closure(&mut self, ast: NodeId, span: Span, invocation: InvocationKind, info: DataFlowInfo) -> ClosureHandle {
        let origin = self.current;
        let in_place = invocation.is_in_place();
        let exit = self.pending_node(FlowNodeKind::ClosureExit, span);
        let enter = if in_place {
            self.emit(FlowNodeKind::ClosureEnter, Some(ast), span)
        } else {
            let enter = self.graph.add_node(FlowNodeKind::ClosureEnter, Some(ast), span);
            self.graph.node_mut(enter).dead = true;
            self.connect(origin, enter, FlowEdgeKind::Closure);
            self.current = enter;
            enter
        };
        self.set_info(info);
        self.frames.push(Frame::Closure { exit, in_place });
        ClosureHandle {
            origin,
            enter,
            exit,
            invocation,
        }
    }

    pub fn leave_closure(&mut self, handle: ClosureHandle) {
        let from = self.current;
        self.connect(from, handle.exit, FlowEdgeKind::Normal);
        if let Some(Frame::Closure { .. }) = self.frames.last() {
            self.frames.pop();
        }
        match handle.invocation {
            InvocationKind::Unknown => {
                self.refresh(handle.exit);
                self.current = handle.origin;
            }
            InvocationKind::ExactlyOnce => self.resume_at(handle.exit),
            InvocationKind::AtMostOnce => {
                self.connect(handle.origin, handle.exit, FlowEdgeKind::Normal);
                self.resume_at(handle.exit);
            }
            InvocationKind::AtLeastOnce => {
                self.connect(handle.exit, handle.enter, FlowEdgeKind::LoopBack);
                self.resume_at(handle.exit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::dummy()
    }

    #[test]
    fn code_after_return_is_dead() {
        let mut builder = FlowBuilder::new(span(), DataFlowInfo::empty());
        builder.emit(FlowNodeKind::Statement, None, span());
        builder.jump(JumpTarget::Return, span());
        assert!(builder.is_dead());
        let after = builder.emit(FlowNodeKind::Statement, None, span());
        let graph = builder.finish();
        assert!(graph.is_dead(after));
        assert!(!graph.is_dead(graph.exit()));
    }

    #[test]
    fn break_reaches_loop_exit() {
        let mut builder = FlowBuilder::new(span(), DataFlowInfo::empty());
        let id = NodeId::new(7);
        let handle = builder.enter_loop(id, span(), &[]);
        assert_eq!(builder.innermost_loop(), Some(id));
        builder.emit(FlowNodeKind::Statement, None, span());
        builder.jump(JumpTarget::Break(id), span());
        builder.leave_loop(handle);
        assert!(!builder.is_dead());
    }

    #[test]
    fn finally_is_copied_per_exit() {
        let mut builder = FlowBuilder::new(span(), DataFlowInfo::empty());
        let handle = builder.enter_try(NodeId::new(1), span(), false, true);
        builder.emit(FlowNodeKind::Statement, None, span());
        builder.jump(JumpTarget::Return, span());
        let live_end = builder.current();
        let region = builder.begin_finally(handle, vec![live_end], span());
        builder.emit(FlowNodeKind::Statement, Some(NodeId::new(9)), span());
        builder.end_finally(region, span());
        let graph = builder.finish();

        let copies = graph
            .nodes()
            .iter()
            .filter(|node| node.ast == Some(NodeId::new(9)))
            .count();
        // template, normal, exceptional and the pending return
        assert_eq!(copies, 4);
        assert!(!graph.is_dead(graph.exit()));
    }
}
