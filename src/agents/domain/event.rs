//! Canonical streaming events

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::StopReason;

/// Kind of a streamed content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    ToolUse,
}

/// The two halves of a streamed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ToolResultPayload {
    /// Parsed input, emitted once the tool block closes
    Input { input: Value },
    /// Dispatch outcome
    Output { content: String, is_error: bool },
}

/// An event of the canonical stream.
///
/// `frontend_index` values are assigned by the transcoder only. They
/// increase strictly per block, whatever indices the provider used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart,
    BlockStart {
        kind: BlockKind,
        frontend_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    TextDelta {
        frontend_index: usize,
        text: String,
    },
    ToolInputDelta {
        frontend_index: usize,
        fragment: String,
    },
    BlockStop {
        frontend_index: usize,
    },
    ToolResult {
        frontend_index: usize,
        tool_use_id: String,
        name: String,
        payload: ToolResultPayload,
    },
    TurnComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Frontend index this event is tagged with, if any
    pub fn frontend_index(&self) -> Option<usize> {
        match self {
            StreamEvent::BlockStart { frontend_index, .. }
            | StreamEvent::TextDelta { frontend_index, .. }
            | StreamEvent::ToolInputDelta { frontend_index, .. }
            | StreamEvent::BlockStop { frontend_index }
            | StreamEvent::ToolResult { frontend_index, .. } => Some(*frontend_index),
            StreamEvent::MessageStart
            | StreamEvent::TurnComplete { .. }
            | StreamEvent::Error { .. } => None,
        }
    }
}

/// Canonical event stream delivered to one consumer
pub struct EventStream {
    receiver: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    /// Create a channel pair for building an event stream
    pub fn channel(buffer: usize) -> (EventStreamSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (EventStreamSender { sender: tx }, Self { receiver: rx })
    }

    /// Receive the next event
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Drain the stream until the producer finishes
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for building an event stream
#[derive(Clone)]
pub struct EventStreamSender {
    sender: mpsc::Sender<StreamEvent>,
}

impl EventStreamSender {
    /// Send an event; false once the consumer has gone away
    pub async fn send(&self, event: StreamEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    /// Check if the receiver is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
