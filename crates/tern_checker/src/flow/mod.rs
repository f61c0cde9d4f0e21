//! Control flow of one body: the graph, the type facts attached to its
//! points and definite assignment of locals.

mod builder;
mod graph;
mod initialization;
mod narrowing;

pub use builder::{ClosureHandle, FinallyRegion, FlowBuilder, JumpTarget, LoopHandle, TryHandle};
pub use graph::{FlowEdge, FlowEdgeKind, FlowEvent, FlowGraph, FlowNode, FlowNodeId, FlowNodeKind};
pub use initialization::{InitState, InitializationAnalysis};
pub use narrowing::{ConditionFacts, DataFlowInfo, Fact, FlowDelta, FlowVariable, TypeStatement};
