//! Agent Communication Channel
//!
//! A message bus keyed by agent identifier. Every sent message is appended
//! to an append-only history first, then delivered synchronously to
//! subscriber callbacks according to the channel mode; a recorded message is
//! never dropped, even with no subscriber for the target.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an inter-agent message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Task,
    Result,
    Question,
    Answer,
    Notification,
    Collaboration,
}

/// One message exchanged between agents; immutable once recorded
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommunicationMessage {
    /// Unique message id
    pub id: String,

    /// Sending agent id
    pub sender: String,

    /// Target agent id, for directed delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,

    /// Message kind
    pub message_type: MessageType,

    /// Payload text
    pub content: String,

    /// Extra key-value context
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Send time
    pub timestamp: DateTime<Utc>,
}

impl CommunicationMessage {
    pub fn new(
        sender: impl Into<String>,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            receiver: None,
            message_type,
            content: content.into(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Address the message to one receiver
    pub fn to(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Delivery mode of a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// Deliver to every subscriber, including the sender
    Shared,
    /// Deliver only to the declared receiver, if subscribed
    Directed,
    /// Deliver to every subscriber except the sender
    Broadcast,
}

/// History filter; unset fields match everything
#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub message_type: Option<MessageType>,
}

impl MessageFilter {
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    fn matches(&self, message: &CommunicationMessage) -> bool {
        if let Some(sender) = &self.sender {
            if &message.sender != sender {
                return false;
            }
        }
        if let Some(receiver) = &self.receiver {
            if message.receiver.as_ref() != Some(receiver) {
                return false;
            }
        }
        if let Some(message_type) = &self.message_type {
            if &message.message_type != message_type {
                return false;
            }
        }
        true
    }
}

/// Delivery callback registered per agent id
pub type MessageHandler = Arc<dyn Fn(&CommunicationMessage) + Send + Sync>;

struct ChannelState {
    subscribers: Vec<(String, MessageHandler)>,
    history: Vec<CommunicationMessage>,
}

/// Message bus for inter-agent communication.
///
/// Interior state is guarded by one lock; recording and recipient selection
/// happen under it, so concurrent senders observe one consistent history,
/// while callbacks run outside it.
pub struct AgentChannel {
    mode: ChannelMode,
    state: RwLock<ChannelState>,
}

impl AgentChannel {
    pub fn new(mode: ChannelMode) -> Self {
        Self {
            mode,
            state: RwLock::new(ChannelState {
                subscribers: Vec::new(),
                history: Vec::new(),
            }),
        }
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Register a delivery callback for an agent id, replacing any prior
    /// subscription under the same id.
    pub fn subscribe(&self, agent_id: impl Into<String>, handler: MessageHandler) {
        let agent_id = agent_id.into();
        let mut state = self.state.write().unwrap();
        if let Some(entry) = state.subscribers.iter_mut().find(|(id, _)| *id == agent_id) {
            entry.1 = handler;
        } else {
            state.subscribers.push((agent_id, handler));
        }
    }

    /// Drop the subscription for an agent id
    pub fn unsubscribe(&self, agent_id: &str) {
        let mut state = self.state.write().unwrap();
        state.subscribers.retain(|(id, _)| id != agent_id);
    }

    /// Record the message into history, then deliver it per the channel mode.
    ///
    /// The state lock is released before any callback runs, so a handler may
    /// send on, inspect, or unsubscribe from the same channel.
    pub fn send(&self, message: CommunicationMessage) {
        let recipients: Vec<MessageHandler> = {
            let mut state = self.state.write().unwrap();
            state.history.push(message.clone());

            match self.mode {
                ChannelMode::Shared => state
                    .subscribers
                    .iter()
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect(),
                ChannelMode::Directed => match &message.receiver {
                    Some(receiver) => state
                        .subscribers
                        .iter()
                        .filter(|(id, _)| id == receiver)
                        .map(|(_, handler)| Arc::clone(handler))
                        .collect(),
                    None => Vec::new(),
                },
                ChannelMode::Broadcast => state
                    .subscribers
                    .iter()
                    .filter(|(id, _)| *id != message.sender)
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect(),
            }
        };

        tracing::debug!(
            sender = %message.sender,
            receiver = message.receiver.as_deref().unwrap_or("-"),
            kind = ?message.message_type,
            recipients = recipients.len(),
            "Channel message"
        );

        for handler in recipients {
            handler(&message);
        }
    }

    /// Messages matching the filter, in send order
    pub fn history(&self, filter: &MessageFilter) -> Vec<CommunicationMessage> {
        self.state
            .read()
            .unwrap()
            .history
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect()
    }

    /// Total number of recorded messages
    pub fn history_len(&self) -> usize {
        self.state.read().unwrap().history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> MessageHandler) {
        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let received = Arc::clone(&received);
            move |tag: &str| -> MessageHandler {
                let received = Arc::clone(&received);
                let tag = tag.to_string();
                Arc::new(move |msg: &CommunicationMessage| {
                    received.lock().unwrap().push(format!("{}:{}", tag, msg.content));
                })
            }
        };
        (received, make)
    }

    #[test]
    fn test_shared_delivers_to_everyone_including_sender() {
        let channel = AgentChannel::new(ChannelMode::Shared);
        let (received, handler) = collector();
        channel.subscribe("a", handler("a"));
        channel.subscribe("b", handler("b"));

        channel.send(CommunicationMessage::new("a", MessageType::Notification, "ping"));

        let got = received.lock().unwrap().clone();
        assert_eq!(got, vec!["a:ping", "b:ping"]);
    }

    #[test]
    fn test_directed_delivers_only_to_receiver() {
        let channel = AgentChannel::new(ChannelMode::Directed);
        let (received, handler) = collector();
        channel.subscribe("a", handler("a"));
        channel.subscribe("b", handler("b"));

        channel.send(
            CommunicationMessage::new("a", MessageType::Question, "for b only").to("b"),
        );
        // No receiver: recorded but delivered nowhere.
        channel.send(CommunicationMessage::new("a", MessageType::Notification, "untargeted"));

        let got = received.lock().unwrap().clone();
        assert_eq!(got, vec!["b:for b only"]);
        assert_eq!(channel.history_len(), 2);
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let channel = AgentChannel::new(ChannelMode::Broadcast);
        let (received, handler) = collector();
        channel.subscribe("a", handler("a"));
        channel.subscribe("b", handler("b"));
        channel.subscribe("c", handler("c"));

        channel.send(CommunicationMessage::new("b", MessageType::Collaboration, "hi all"));

        let got = received.lock().unwrap().clone();
        assert_eq!(got, vec!["a:hi all", "c:hi all"]);
    }

    #[test]
    fn test_history_recorded_without_subscribers() {
        let channel = AgentChannel::new(ChannelMode::Directed);
        channel.send(CommunicationMessage::new("a", MessageType::Task, "work").to("ghost"));
        assert_eq!(channel.history_len(), 1);
    }

    #[test]
    fn test_history_filters() {
        let channel = AgentChannel::new(ChannelMode::Shared);
        channel.send(CommunicationMessage::new("a", MessageType::Task, "t1").to("b"));
        channel.send(CommunicationMessage::new("b", MessageType::Result, "r1").to("a"));
        channel.send(CommunicationMessage::new("a", MessageType::Result, "r2").to("b"));

        let from_a = channel.history(&MessageFilter::default().sender("a"));
        assert_eq!(from_a.len(), 2);

        let results_to_b = channel.history(
            &MessageFilter::default()
                .receiver("b")
                .message_type(MessageType::Result),
        );
        assert_eq!(results_to_b.len(), 1);
        assert_eq!(results_to_b[0].content, "r2");
    }

    #[test]
    fn test_resubscribe_replaces_handler() {
        let channel = AgentChannel::new(ChannelMode::Shared);
        let (received, handler) = collector();
        channel.subscribe("a", handler("old"));
        channel.subscribe("a", handler("new"));

        channel.send(CommunicationMessage::new("x", MessageType::Notification, "once"));

        let got = received.lock().unwrap().clone();
        assert_eq!(got, vec!["new:once"]);
    }

    #[test]
    fn test_unsubscribe() {
        let channel = AgentChannel::new(ChannelMode::Shared);
        let (received, handler) = collector();
        channel.subscribe("a", handler("a"));
        channel.unsubscribe("a");

        channel.send(CommunicationMessage::new("x", MessageType::Notification, "gone"));

        assert!(received.lock().unwrap().is_empty());
        assert_eq!(channel.history_len(), 1);
    }

    #[test]
    fn test_handler_can_reply_on_the_same_channel() {
        let channel = Arc::new(AgentChannel::new(ChannelMode::Shared));
        let answers: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let reply_channel = Arc::clone(&channel);
        let seen_answers = Arc::clone(&answers);
        channel.subscribe(
            "responder",
            Arc::new(move |msg: &CommunicationMessage| match msg.message_type {
                MessageType::Question => {
                    reply_channel.send(
                        CommunicationMessage::new(
                            "responder",
                            MessageType::Answer,
                            format!("re: {}", msg.content),
                        )
                        .to(msg.sender.clone()),
                    );
                }
                MessageType::Answer => {
                    seen_answers.lock().unwrap().push(msg.content.clone());
                }
                _ => {}
            }),
        );

        channel.send(CommunicationMessage::new("asker", MessageType::Question, "status?"));

        assert_eq!(answers.lock().unwrap().clone(), vec!["re: status?"]);
        assert_eq!(channel.history_len(), 2);
        let replies = channel.history(&MessageFilter::default().message_type(MessageType::Answer));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].receiver.as_deref(), Some("asker"));
    }

    #[test]
    fn test_handler_can_inspect_history_during_delivery() {
        let channel = Arc::new(AgentChannel::new(ChannelMode::Shared));
        let observed: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));

        let inspect_channel = Arc::clone(&channel);
        let observed_len = Arc::clone(&observed);
        channel.subscribe(
            "watcher",
            Arc::new(move |_msg: &CommunicationMessage| {
                *observed_len.lock().unwrap() = inspect_channel.history_len();
            }),
        );

        channel.send(CommunicationMessage::new("a", MessageType::Notification, "ping"));

        // The message is recorded before delivery, so the handler sees it.
        assert_eq!(*observed.lock().unwrap(), 1);
    }
}
