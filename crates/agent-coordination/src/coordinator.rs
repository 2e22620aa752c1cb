//! Multi-Agent Coordinator
//!
//! Registers named agents and runs one of four coordination strategies over
//! them, merging per-agent outputs into a single synthesized result. All
//! per-agent execution goes through `Agent::run`; the coordinator plans
//! allocations, dispatches, and merges.

use std::sync::{Arc, RwLock};

use agent_core::reasoning::Agent;
use serde::{Deserialize, Serialize};

use crate::channel::{AgentChannel, ChannelMode, CommunicationMessage, MessageType};
use crate::error::{CoordinationError, Result};

/// Number of discussion rounds in the collaborative strategy
const DISCUSSION_ROUNDS: usize = 3;

/// How the coordinator combines several agents' outputs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationStrategy {
    /// Chain agents in registration order, each seeing the prior result
    Sequential,
    /// Fan the unmodified task out to every agent concurrently
    Parallel,
    /// First agent decomposes the task, workers execute, first agent merges
    Hierarchical,
    /// Fixed rounds of shared discussion, then a final conclusion
    Collaborative,
}

impl CoordinationStrategy {
    fn as_str(self) -> &'static str {
        match self {
            CoordinationStrategy::Sequential => "sequential",
            CoordinationStrategy::Parallel => "parallel",
            CoordinationStrategy::Hierarchical => "hierarchical",
            CoordinationStrategy::Collaborative => "collaborative",
        }
    }
}

/// A planned assignment of (part of) a task to one agent.
///
/// Allocations describe the dispatch plan; they are never executed directly.
/// Execution always flows through `Agent::run`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskAllocation {
    pub agent_id: String,
    pub agent_name: String,
    pub task: String,
    pub priority: i32,
    pub dependencies: Vec<String>,
}

struct AgentEntry {
    id: String,
    agent: Arc<Agent>,
}

/// Registry of named agents plus the strategy dispatcher.
///
/// Registration order is preserved and is the execution order of the
/// sequential strategy, the result order of the parallel strategy, and the
/// coordinator/worker split of the hierarchical strategy.
pub struct MultiAgentSystem {
    agents: RwLock<Vec<AgentEntry>>,
    channel: AgentChannel,
}

impl Default for MultiAgentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiAgentSystem {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(Vec::new()),
            channel: AgentChannel::new(ChannelMode::Shared),
        }
    }

    /// Register an agent under an id. A duplicate id replaces the previous
    /// mapping in place, keeping its registration position.
    pub fn register(&self, id: impl Into<String>, agent: Arc<Agent>) {
        let id = id.into();
        let mut agents = self.agents.write().unwrap();
        if let Some(entry) = agents.iter_mut().find(|e| e.id == id) {
            entry.agent = agent;
        } else {
            agents.push(AgentEntry { id, agent });
        }
    }

    /// Remove an agent; returns whether it was registered
    pub fn unregister(&self, id: &str) -> bool {
        let mut agents = self.agents.write().unwrap();
        let before = agents.len();
        agents.retain(|e| e.id != id);
        agents.len() != before
    }

    /// Registered agent ids in registration order
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents
            .read()
            .unwrap()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().unwrap().is_empty()
    }

    /// The system's shared channel; task/result notifications for every
    /// `execute_task` call are recorded here.
    pub fn channel(&self) -> &AgentChannel {
        &self.channel
    }

    /// Resolve the target agent set: all registered agents when `ids` is
    /// omitted, otherwise exactly the listed ones.
    fn resolve(&self, ids: Option<&[String]>) -> Result<Vec<(String, Arc<Agent>)>> {
        let agents = self.agents.read().unwrap();

        let targets = match ids {
            None => agents
                .iter()
                .map(|e| (e.id.clone(), Arc::clone(&e.agent)))
                .collect::<Vec<_>>(),
            Some(ids) => {
                let mut targets = Vec::with_capacity(ids.len());
                for id in ids {
                    let entry = agents
                        .iter()
                        .find(|e| &e.id == id)
                        .ok_or_else(|| CoordinationError::AgentNotFound(id.clone()))?;
                    targets.push((entry.id.clone(), Arc::clone(&entry.agent)));
                }
                targets
            }
        };

        if targets.is_empty() {
            return Err(CoordinationError::NoAgentsAvailable);
        }
        Ok(targets)
    }

    /// Produce the dispatch plan for a task without executing it
    pub fn plan(
        &self,
        task: &str,
        strategy: CoordinationStrategy,
        ids: Option<&[String]>,
    ) -> Result<Vec<TaskAllocation>> {
        let targets = self.resolve(ids)?;
        Ok(Self::allocate(task, strategy, &targets))
    }

    fn allocate(
        task: &str,
        strategy: CoordinationStrategy,
        targets: &[(String, Arc<Agent>)],
    ) -> Vec<TaskAllocation> {
        targets
            .iter()
            .enumerate()
            .map(|(i, (id, agent))| {
                let (priority, dependencies) = match strategy {
                    CoordinationStrategy::Sequential => (
                        i as i32,
                        if i == 0 {
                            Vec::new()
                        } else {
                            vec![targets[i - 1].0.clone()]
                        },
                    ),
                    CoordinationStrategy::Parallel => (0, Vec::new()),
                    CoordinationStrategy::Hierarchical => {
                        if i == 0 {
                            (0, Vec::new())
                        } else {
                            (1, vec![targets[0].0.clone()])
                        }
                    }
                    CoordinationStrategy::Collaborative => (
                        0,
                        targets
                            .iter()
                            .filter(|(other, _)| other != id)
                            .map(|(other, _)| other.clone())
                            .collect(),
                    ),
                };

                TaskAllocation {
                    agent_id: id.clone(),
                    agent_name: agent.name().to_string(),
                    task: task.to_string(),
                    priority,
                    dependencies,
                }
            })
            .collect()
    }

    /// Run a task across the resolved agents under the given strategy.
    ///
    /// Any participant failure aborts the whole call; no partial result is
    /// returned.
    pub async fn execute_task(
        &self,
        task: &str,
        strategy: CoordinationStrategy,
        ids: Option<&[String]>,
    ) -> Result<String> {
        let targets = self.resolve(ids)?;

        let allocations = Self::allocate(task, strategy, &targets);
        tracing::debug!(
            strategy = strategy.as_str(),
            agents = allocations.len(),
            "Dispatching task"
        );

        self.channel.send(
            CommunicationMessage::new("coordinator", MessageType::Task, task)
                .with_metadata("strategy", strategy.as_str()),
        );

        let result = match strategy {
            CoordinationStrategy::Sequential => self.run_sequential(task, &targets).await?,
            CoordinationStrategy::Parallel => self.run_parallel(task, &targets).await?,
            CoordinationStrategy::Hierarchical => self.run_hierarchical(task, &targets).await?,
            CoordinationStrategy::Collaborative => self.run_collaborative(task, &targets).await?,
        };

        self.channel.send(
            CommunicationMessage::new("coordinator", MessageType::Result, &result)
                .with_metadata("strategy", strategy.as_str()),
        );

        Ok(result)
    }

    /// Registration order; from the second agent onward the input carries
    /// the prior agent's output.
    async fn run_sequential(
        &self,
        task: &str,
        targets: &[(String, Arc<Agent>)],
    ) -> Result<String> {
        let mut outputs = Vec::with_capacity(targets.len());
        let mut previous: Option<String> = None;

        for (id, agent) in targets {
            let input = match &previous {
                None => task.to_string(),
                Some(prior) => format!("Based on the previous result: {prior}\n\n{task}"),
            };

            tracing::debug!(agent = %id, "Sequential step");
            let output = agent.run(&input).await?;
            outputs.push(format!("[{}] {}", agent.name(), output));
            previous = Some(output);
        }

        Ok(outputs.join("\n"))
    }

    /// Every agent gets the original, unmodified task concurrently under a
    /// join barrier. Results are collected in registration order (an
    /// explicit choice; the first failure cancels the group).
    async fn run_parallel(&self, task: &str, targets: &[(String, Arc<Agent>)]) -> Result<String> {
        let runs = targets.iter().map(|(id, agent)| {
            let agent = Arc::clone(agent);
            let id = id.clone();
            async move {
                tracing::debug!(agent = %id, "Parallel run");
                let output = agent.run(task).await?;
                Ok::<String, CoordinationError>(format!("[{}] {}", agent.name(), output))
            }
        });

        let outputs = futures::future::try_join_all(runs).await?;
        Ok(outputs.join("\n"))
    }

    /// The first agent coordinates: it decomposes the task into one sub-task
    /// per worker (as a structured JSON array), the workers run concurrently,
    /// and the coordinator synthesizes their outputs.
    async fn run_hierarchical(
        &self,
        task: &str,
        targets: &[(String, Arc<Agent>)],
    ) -> Result<String> {
        let (coordinator, workers) = targets
            .split_first()
            .ok_or(CoordinationError::NoAgentsAvailable)?;

        if workers.is_empty() {
            return Ok(coordinator.1.run(task).await?);
        }

        let decomposition_prompt = format!(
            "Break the following task into exactly {count} sub-tasks, one per worker.\n\
             Respond with only a JSON array of {count} strings.\n\n\
             Task: {task}",
            count = workers.len(),
        );
        let raw = coordinator.1.run(&decomposition_prompt).await?;
        let sub_tasks = parse_sub_task_array(&raw);

        if sub_tasks.len() < workers.len() {
            tracing::warn!(
                expected = workers.len(),
                got = sub_tasks.len(),
                "Decomposition incomplete; remaining workers get the original task"
            );
        }

        let runs = workers.iter().enumerate().map(|(i, (id, agent))| {
            let agent = Arc::clone(agent);
            let sub_task = sub_tasks.get(i).cloned().unwrap_or_else(|| task.to_string());
            let id = id.clone();
            async move {
                tracing::debug!(worker = %id, "Hierarchical worker");
                let output = agent.run(&sub_task).await?;
                Ok::<String, CoordinationError>(format!("[{}] {}", agent.name(), output))
            }
        });
        let worker_outputs = futures::future::try_join_all(runs).await?;

        let synthesis_prompt = format!(
            "Integrate the worker results below into one final answer.\n\n\
             Task: {task}\n\n\
             Worker results:\n{}",
            worker_outputs.join("\n"),
        );
        Ok(coordinator.1.run(&synthesis_prompt).await?)
    }

    /// Fixed rounds of discussion where every agent sees the transcript so
    /// far; the first agent draws the final conclusion.
    async fn run_collaborative(
        &self,
        task: &str,
        targets: &[(String, Arc<Agent>)],
    ) -> Result<String> {
        let mut transcript: Vec<String> = Vec::new();

        for round in 1..=DISCUSSION_ROUNDS {
            for (id, agent) in targets {
                let so_far = if transcript.is_empty() {
                    "(no contributions yet)".to_string()
                } else {
                    transcript.join("\n")
                };
                let prompt = format!(
                    "Collaborative discussion, round {round} of {DISCUSSION_ROUNDS}.\n\
                     Task: {task}\n\n\
                     Discussion so far:\n{so_far}\n\n\
                     Add your contribution.",
                );

                tracing::debug!(agent = %id, round, "Collaborative contribution");
                let contribution = agent.run(&prompt).await?;
                transcript.push(format!("[{}] {}", agent.name(), contribution));
            }
        }

        let conclusion_prompt = format!(
            "The discussion is over. Produce the final conclusion for the task.\n\n\
             Task: {task}\n\n\
             Discussion:\n{}",
            transcript.join("\n"),
        );
        Ok(targets[0].1.run(&conclusion_prompt).await?)
    }
}

/// Extract a JSON string array from the coordinator's reply. Returns an
/// empty list when no parseable array is present, which makes every worker
/// fall back to the original task.
fn parse_sub_task_array(raw: &str) -> Vec<String> {
    let Some(start) = raw.find('[') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind(']') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    serde_json::from_str::<Vec<String>>(&raw[start..=end]).unwrap_or_default()
}
