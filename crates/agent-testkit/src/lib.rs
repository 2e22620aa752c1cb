//! # agent-testkit
//!
//! A local fake provider and canned tools for testing agent behavior.
//!
//! `ScriptedProvider` replays a queue of pre-built completions and records
//! every request it receives, so tests can assert both what the agent sent
//! and how it reacted. Not optimized for production use.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use agent_core::error::{AgentError, Result};
use agent_core::message::Message;
use agent_core::provider::{Completion, FinishReason, GenerationOptions, LlmProvider};
use agent_core::tool::{ParameterSchema, Tool, ToolCall, ToolDeclaration, ToolSchema};
use async_trait::async_trait;

/// Build a completion that requests the given tool call
pub fn tool_call_step(name: &str, arguments: serde_json::Value) -> Completion {
    Completion::text("Let me check.", "scripted")
        .with_tool_calls(vec![ToolCall::new(name, arguments)])
        .with_finish_reason(FinishReason::ToolUse)
}

/// Build a final completion that stops the loop
pub fn final_step(content: &str) -> Completion {
    Completion::text(content, "scripted").with_finish_reason(FinishReason::Stop)
}

/// Provider that replays queued completions and records every request.
///
/// When the queue runs dry it serves the fallback completion; without a
/// fallback it keeps "thinking" without ever finishing, which is useful for
/// iteration-budget tests.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<Vec<Message>>>,
    declared_tools: Mutex<Vec<Vec<ToolDeclaration>>>,
    fallback: Option<Completion>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Completion>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            declared_tools: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// Provider that always answers with the same final text
    pub fn always(content: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.fallback = Some(final_step(content));
        provider
    }

    pub fn with_fallback(mut self, fallback: Completion) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Number of completions served so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Message list of the n-th request
    pub fn request(&self, index: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[index].clone()
    }

    /// All recorded requests
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    /// Tool declarations attached to the n-th request
    pub fn declared_tools(&self, index: usize) -> Vec<ToolDeclaration> {
        self.declared_tools.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDeclaration],
        _options: &GenerationOptions,
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.declared_tools.lock().unwrap().push(tools.to_vec());

        let next = self.steps.lock().unwrap().pop_front();
        Ok(next
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Completion::text("still thinking", "scripted")))
    }
}

/// Provider that fails every request with a non-retryable error
pub struct ErrorProvider {
    message: String,
}

impl ErrorProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for ErrorProvider {
    fn name(&self) -> &str {
        "error"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolDeclaration],
        _options: &GenerationOptions,
    ) -> Result<Completion> {
        Err(AgentError::Provider(self.message.clone()))
    }
}

/// Tool that echoes its required `text` argument
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".into(),
            description: "Echo the given text".into(),
            parameters: vec![ParameterSchema::required("text", "string", "Text to echo")],
        }
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        Ok(format!(
            "Echo: {}",
            args.get("text").cloned().unwrap_or_default()
        ))
    }
}

/// Tool that always fails
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "failing".into(),
            description: "Always fails".into(),
            parameters: vec![],
        }
    }

    async fn execute(&self, _args: &HashMap<String, String>) -> Result<String> {
        Err(AgentError::Other("deliberate failure".into()))
    }
}
