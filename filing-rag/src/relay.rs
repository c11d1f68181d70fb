//! Out-of-band streaming of incoming questions.
//!
//! A [`QueryRelay`] forwards each question to some external consumer
//! (analytics, a message bus). It sits beside the answer path: a relay
//! failure is logged by the pipeline and never fails a query.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{RagError, Result};

/// Topic used when none is given.
pub const DEFAULT_TOPIC: &str = "financial_queries";

/// A sink for plain-text questions.
#[async_trait]
pub trait QueryRelay: Send + Sync {
    /// Topic or destination name, for logs.
    fn topic(&self) -> &str;

    /// Publish one question.
    async fn publish(&self, question: &str) -> Result<()>;
}

/// A relayed question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedQuery {
    /// Topic the question was published on.
    pub topic: String,
    /// The question text.
    pub question: String,
}

/// Relay backed by a bounded tokio channel.
///
/// The receiving half can bridge to any broker client the deployment uses.
#[derive(Debug, Clone)]
pub struct ChannelRelay {
    topic: String,
    sender: mpsc::Sender<RelayedQuery>,
}

impl ChannelRelay {
    /// Create a relay on `topic` with room for `capacity` pending messages.
    pub fn new(topic: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<RelayedQuery>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { topic: topic.into(), sender }, receiver)
    }
}

#[async_trait]
impl QueryRelay for ChannelRelay {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, question: &str) -> Result<()> {
        let message = RelayedQuery { topic: self.topic.clone(), question: question.to_string() };
        // Never wait on a slow consumer.
        self.sender.try_send(message).map_err(|e| RagError::RelayError {
            topic: self.topic.clone(),
            message: e.to_string(),
        })
    }
}
