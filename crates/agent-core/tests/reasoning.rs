//! Reasoning-loop tests, exercised through the public API with the
//! scripted provider and canned tools from `agent-testkit`.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use agent_core::{
    Agent, AgentBuilder, AgentError, Completion, GenerationOptions, LlmProvider, Message, Result,
    RetryPolicy, Role, Thought, ToolCall, ToolDeclaration,
};
use agent_testkit::{final_step, tool_call_step, EchoTool, FailingTool, ScriptedProvider};
use async_trait::async_trait;
use serde_json::json;

fn agent_with(provider: Arc<ScriptedProvider>) -> Agent {
    AgentBuilder::new()
        .provider(provider as Arc<dyn LlmProvider>)
        .tool(EchoTool)
        .tool(FailingTool)
        .name("tester")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_echo_tool_round_trip() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_step("echo", json!({"text": "hi"})),
        final_step("FINAL ANSWER: the tool said hi"),
    ]));
    let agent = agent_with(Arc::clone(&provider));

    let result = agent.run("say hi").await.unwrap();
    assert!(result.contains("the tool said hi"));

    let history = agent.history().await;
    let tool_msg = history
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("observation recorded");
    assert!(tool_msg.content.contains("Echo: hi"));
    assert_eq!(tool_msg.tool_name.as_deref(), Some("echo"));
}

#[tokio::test]
async fn test_max_iterations_returns_last_assistant_text() {
    // Provider never calls a tool and never signals completion.
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let agent = AgentBuilder::new()
        .provider(Arc::clone(&provider) as Arc<dyn LlmProvider>)
        .name("looper")
        .max_iterations(3)
        .build()
        .unwrap();

    let result = agent.run("ponder").await.unwrap();
    assert_eq!(result, "still thinking");
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_tool_failure_recovered_as_observation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_step("failing", json!({})),
        final_step("FINAL ANSWER: recovered"),
    ]));
    let agent = agent_with(Arc::clone(&provider));

    let result = agent.run("try the failing tool").await.unwrap();
    assert!(result.contains("recovered"));

    let history = agent.history().await;
    let tool_msg = history.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_msg.content.contains("failed"));

    // The recovered failure was visible to the model on the next think.
    let second_request = provider.request(1);
    assert!(second_request.iter().any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn test_all_tool_calls_executed_in_order() {
    let step = Completion::text("Two at once.", "scripted").with_tool_calls(vec![
        ToolCall::new("echo", json!({"text": "first"})),
        ToolCall::new("echo", json!({"text": "second"})),
    ]);
    let provider = Arc::new(ScriptedProvider::new(vec![
        step,
        final_step("FINAL ANSWER: both done"),
    ]));
    let agent = agent_with(Arc::clone(&provider));

    agent.run("double echo").await.unwrap();

    let history = agent.history().await;
    let tool_outputs: Vec<&str> = history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(tool_outputs, vec!["Echo: first", "Echo: second"]);
}

#[tokio::test]
async fn test_clear_history_then_run_matches_fresh_agent() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        final_step("FINAL ANSWER: one"),
        final_step("FINAL ANSWER: two"),
    ]));
    let agent = agent_with(Arc::clone(&provider));

    agent.run("task x").await.unwrap();
    agent.clear_history().await;
    agent.run("task x").await.unwrap();

    let fresh_provider = Arc::new(ScriptedProvider::new(vec![final_step(
        "FINAL ANSWER: one",
    )]));
    let fresh = agent_with(Arc::clone(&fresh_provider));
    fresh.run("task x").await.unwrap();

    let rerun_request = provider.request(1);
    let fresh_request = fresh_provider.request(0);

    assert_eq!(rerun_request.len(), fresh_request.len());
    for (a, b) in rerun_request.iter().zip(fresh_request.iter()) {
        assert_eq!(a.role, b.role);
        assert_eq!(a.content, b.content);
    }
    assert_eq!(rerun_request[0].role, Role::System);
    assert_eq!(rerun_request[1].content, "task x");
}

#[tokio::test]
async fn test_provider_retry_on_transient_failure() {
    struct FlakyProvider {
        failures_left: StdMutex<usize>,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDeclaration],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(AgentError::ProviderUnavailable("hiccup".into()));
            }
            Ok(final_step("FINAL ANSWER: made it"))
        }
    }

    let agent = AgentBuilder::new()
        .provider(Arc::new(FlakyProvider {
            failures_left: StdMutex::new(2),
        }))
        .retry_policy(RetryPolicy::transient().with_max_retries(2))
        .build()
        .unwrap();

    let result = agent.run("survive the hiccups").await.unwrap();
    assert!(result.contains("made it"));
}

#[test]
fn test_thought_from_completion() {
    let completion = Completion::text("I should echo.", "m")
        .with_tool_calls(vec![ToolCall::new("echo", json!({"text": "x"}))]);
    let thought = Thought::from_completion(&completion);
    assert_eq!(thought.reasoning, "I should echo.");
    assert_eq!(thought.next_action.as_deref(), Some("echo"));
    assert!(thought.plan.is_empty());
}

#[test]
fn test_builder_requires_provider() {
    assert!(AgentBuilder::new().build().is_err());
}
