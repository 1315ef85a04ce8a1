//! Branch-and-bound search.

pub mod branching;
pub mod broker;
pub mod node;
pub mod pool;
pub mod tree;

pub use branching::{BranchDecision, BranchingEngine};
pub use broker::BoundBroker;
pub use node::{BoundChange, BranchInfo, NodeRelaxation, NodeStatus, SearchNode};
pub use pool::NodePool;
pub use tree::BranchAndBound;
