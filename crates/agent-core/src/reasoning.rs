//! Reasoning Loop
//!
//! The think→act→observe cycle behind `Agent::run`. Each iteration asks the
//! provider for a structured decision, executes any pending tool calls, and
//! folds their observations back into the conversation until the model
//! finishes or the iteration budget runs out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, FinishReason, GenerationOptions, LlmProvider};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::tool::{decode_arguments, Observation, Tool, ToolCall, ToolExecutor, ToolRegistry};

/// Marker that signals task completion in the assistant's final text
pub const COMPLETION_MARKER: &str = "FINAL ANSWER";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.\n\n\
When a tool can help, request it through a function call. After receiving \
tool results, synthesize them into a helpful response.\n\
When the task is complete, begin your last line with \"FINAL ANSWER\".\n\
Be concise and accurate.";

/// The model's stated rationale for the current step
#[derive(Clone, Debug, Default)]
pub struct Thought {
    /// Free-form reasoning text
    pub reasoning: String,

    /// Ordered plan steps, if the provider supplied any (may be empty)
    pub plan: Vec<String>,

    /// The action the model intends next, if any
    pub next_action: Option<String>,
}

impl Thought {
    /// Build a thought from a structured provider decision. No free-text
    /// marker parsing is involved: the content is the reasoning, the first
    /// tool call (if any) is the next action.
    pub fn from_completion(completion: &Completion) -> Self {
        Self {
            reasoning: completion.content.clone(),
            plan: Vec::new(),
            next_action: completion.tool_calls.first().map(|c| c.name.clone()),
        }
    }

    pub fn with_plan(mut self, plan: Vec<String>) -> Self {
        self.plan = plan;
        self
    }
}

/// An intent to call exactly one tool, derived from one structured tool call
#[derive(Clone, Debug)]
pub struct Action {
    pub tool_name: String,
    pub arguments: HashMap<String, String>,
    pub thought: Thought,
}

impl Action {
    /// Decode a structured tool call into an action
    pub fn from_call(call: &ToolCall, thought: Thought) -> Result<Self> {
        Ok(Self {
            tool_name: call.name.clone(),
            arguments: decode_arguments(&call.arguments)?,
            thought,
        })
    }
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Agent name (used to label outputs in multi-agent runs)
    pub name: String,

    /// System prompt
    pub system_prompt: String,

    /// Maximum reasoning iterations per `run` call
    pub max_iterations: usize,

    /// Exit as soon as the model signals completion
    pub stop_on_finish: bool,

    /// Generation options
    pub generation: GenerationOptions,

    /// Retry policy for provider calls
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            stop_on_finish: true,
            generation: GenerationOptions::default(),
            retry: RetryPolicy::transient(),
        }
    }
}

/// A stateful conversational unit owning one message history.
///
/// The conversation is guarded by the agent's own mutex; no other component
/// mutates it, so concurrent callers observe a single consistent history.
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    executor: ToolExecutor,
    retry: RetryExecutor,
    config: AgentConfig,
    conversation: Mutex<Conversation>,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            executor: ToolExecutor::new(Arc::clone(&tools)),
            tools,
            retry: RetryExecutor::new(config.retry.clone()),
            config,
            conversation: Mutex::new(Conversation::new()),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Snapshot of the current message history
    pub async fn history(&self) -> Vec<Message> {
        self.conversation.lock().await.messages().to_vec()
    }

    /// Clear history, keeping only the system prompt
    pub async fn clear_history(&self) {
        self.conversation.lock().await.clear_history();
    }

    /// Run the agent on a task.
    ///
    /// Every iteration appends one assistant message, plus one tool message
    /// per executed action; history is never truncated here. All tool calls
    /// from one decision are executed sequentially in response order, and
    /// execution failures are recovered into observations rather than
    /// aborting the run. Exhausting the iteration budget returns the most
    /// recent assistant text.
    pub async fn run(&self, task: &str) -> Result<String> {
        let mut conversation = self.conversation.lock().await;

        if conversation.system().is_none() {
            conversation.set_system(&self.config.system_prompt);
        }
        conversation.push(Message::user(task));

        let declarations = self.tools.model_declarations();

        for iteration in 0..self.config.max_iterations {
            // Think: one provider call over the full history, wrapped in the
            // retry executor.
            let messages = conversation.messages().to_vec();
            let completion = self
                .retry
                .execute(|| {
                    let provider = Arc::clone(&self.provider);
                    let messages = messages.clone();
                    let declarations = declarations.clone();
                    let options = self.config.generation.clone();
                    async move {
                        provider.complete(&messages, &declarations, &options).await
                    }
                })
                .await?;

            conversation
                .push(Message::assistant(&completion.content).with_name(self.config.name.as_str()));

            let thought = Thought::from_completion(&completion);
            tracing::debug!(
                agent = %self.config.name,
                iteration,
                next_action = thought.next_action.as_deref().unwrap_or("none"),
                "Think"
            );

            if !completion.tool_calls.is_empty() {
                // Act + Observe for every pending action.
                for call in &completion.tool_calls {
                    let observation = self.observe(call, thought.clone()).await;
                    conversation.push(Message::tool(
                        &observation.content,
                        &call.name,
                        call.id.clone(),
                    ));
                }
                continue;
            }

            let finished = completion.finish_reason == Some(FinishReason::Stop)
                || completion.content.contains(COMPLETION_MARKER);

            if finished && self.config.stop_on_finish {
                return Ok(completion.content);
            }
        }

        // Iteration budget exhausted: the latest assistant text stands.
        Ok(conversation
            .last_assistant()
            .unwrap_or_default()
            .to_string())
    }

    /// Alias for `run`
    pub async fn ask(&self, question: &str) -> Result<String> {
        self.run(question).await
    }

    /// Execute one action, folding any failure into an error observation
    async fn observe(&self, call: &ToolCall, thought: Thought) -> Observation {
        let action = match Action::from_call(call, thought) {
            Ok(action) => action,
            Err(e) => return Observation::failure(&call.name, e),
        };

        tracing::debug!(
            agent = %self.config.name,
            tool = %action.tool_name,
            "Act"
        );

        match self.executor.execute(call).await {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool execution recovered");
                Observation::failure(&call.name, e)
            }
        }
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn stop_on_finish(mut self, stop: bool) -> Self {
        self.config.stop_on_finish = stop;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

