//! # agent-coordination
//!
//! Multi-agent coordination on top of the single-agent core: a registry of
//! named agents, four strategies to fan a task out across them (sequential
//! hand-off, parallel fan-out, hierarchical delegation, collaborative
//! discussion), and a message bus for inter-agent communication.
//!
//! Per-agent execution always flows through `agent_core::Agent::run`; the
//! coordinator only plans, dispatches, and merges.

pub mod channel;
pub mod coordinator;
pub mod error;

pub use channel::{AgentChannel, ChannelMode, CommunicationMessage, MessageFilter, MessageType};
pub use coordinator::{CoordinationStrategy, MultiAgentSystem, TaskAllocation};
pub use error::{CoordinationError, Result};
