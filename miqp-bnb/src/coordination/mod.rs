//! Multi-worker coordination.
//!
//! Workers never share memory or frontiers while searching. Each owns its
//! model copy, node pool and subsolver, and exchanges cutoffs and improving
//! solutions through a [`Transport`]. Subtrees move between workers only at
//! the start of a solve, when the leading worker donates part of its
//! frontier to idle peers.

pub mod coordinator;
pub mod transport;

pub use coordinator::{GlobalView, NoPeers, PeerLink, WorkerCoordinator};
pub use transport::{ChannelTransport, Message, Transport};
