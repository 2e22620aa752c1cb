//! # agent-core
//!
//! Single-agent execution core: a bounded think→act→observe loop driven by a
//! provider-agnostic LLM abstraction and an extensible tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Agent                                │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tools     │  │   LlmProvider       │  │
//! │  │    Loop     │──│ Registry +   │  │   (Strategy)        │  │
//! │  │             │  │ Executor     │  │   via RetryExecutor │  │
//! │  └─────────────┘  └──────────────┘  └─────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between backends without changing
//! agent logic. Providers return a structured decision (text plus zero or
//! more tool calls); the loop never parses tool intents out of free text.

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod retry;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, FinishReason, GenerationOptions, LlmProvider};
pub use reasoning::{Action, Agent, AgentBuilder, AgentConfig, Thought};
pub use retry::{RetryExecutor, RetryPolicy};
pub use tool::{
    Observation, Tool, ToolCall, ToolDeclaration, ToolExecutor, ToolRegistry, ToolSchema,
};
