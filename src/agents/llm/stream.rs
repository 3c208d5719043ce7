//! Streaming types for LLM responses

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::agents::domain::{ContentBlock, ConversationMessage, Role, StopReason};
use crate::agents::error::LlmError;

/// Raw event from a provider stream.
///
/// `index` is the provider's native block index. Providers reuse indices
/// once a block has closed, so it only identifies a block while it is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    MessageStart,
    /// A text block opens
    BlockStart {
        index: usize,
    },
    TextDelta {
        index: usize,
        text: String,
    },
    /// A tool-use block opens
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },
    /// Partial JSON of the tool input
    ToolInputDelta {
        index: usize,
        fragment: String,
    },
    BlockStop {
        index: usize,
    },
    TurnDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },
    TurnComplete,
}

/// Streaming response from an LLM client
pub struct ProviderStream {
    receiver: mpsc::Receiver<Result<ProviderEvent, LlmError>>,
}

impl ProviderStream {
    /// Create a new stream from a channel receiver
    pub fn new(receiver: mpsc::Receiver<Result<ProviderEvent, LlmError>>) -> Self {
        Self { receiver }
    }

    /// Create a channel pair for building a provider stream
    pub fn channel(buffer: usize) -> (ProviderStreamSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (ProviderStreamSender { sender: tx }, Self { receiver: rx })
    }

    /// A stream that replays a fixed sequence of events
    pub fn from_events(events: Vec<Result<ProviderEvent, LlmError>>) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // capacity covers every event
            let _ = tx.try_send(event);
        }
        Self { receiver: rx }
    }

    /// Receive the next event
    pub async fn recv(&mut self) -> Option<Result<ProviderEvent, LlmError>> {
        self.receiver.recv().await
    }

    /// Collect all events into a complete response
    pub async fn collect(mut self) -> Result<super::LlmResponse, LlmError> {
        let mut assembler = ResponseAssembler::default();
        while let Some(result) = self.receiver.recv().await {
            let event = result?;
            let done = matches!(event, ProviderEvent::TurnComplete);
            assembler.apply(event);
            if done {
                break;
            }
        }
        Ok(assembler.finish())
    }
}

impl Stream for ProviderStream {
    type Item = Result<ProviderEvent, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for building a provider stream
#[derive(Clone)]
pub struct ProviderStreamSender {
    sender: mpsc::Sender<Result<ProviderEvent, LlmError>>,
}

impl ProviderStreamSender {
    /// Send an event
    pub async fn send(&self, event: ProviderEvent) -> Result<(), mpsc::error::SendError<Result<ProviderEvent, LlmError>>> {
        self.sender.send(Ok(event)).await
    }

    /// Send an error
    pub async fn send_error(&self, error: LlmError) -> Result<(), mpsc::error::SendError<Result<ProviderEvent, LlmError>>> {
        self.sender.send(Err(error)).await
    }

    /// Check if the receiver is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug)]
enum OpenBlock {
    Text(String),
    Tool {
        id: String,
        name: String,
        input: String,
    },
}

/// Builds an assistant message from provider events.
///
/// Deltas go to whichever block is open, so reused native indices are
/// harmless.
#[derive(Debug, Default)]
struct ResponseAssembler {
    blocks: Vec<ContentBlock>,
    open: Option<OpenBlock>,
    stop_reason: Option<StopReason>,
}

impl ResponseAssembler {
    fn apply(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::MessageStart | ProviderEvent::TurnComplete => {}
            ProviderEvent::BlockStart { .. } => {
                self.close();
                self.open = Some(OpenBlock::Text(String::new()));
            }
            ProviderEvent::ToolUseStart { id, name, .. } => {
                self.close();
                self.open = Some(OpenBlock::Tool {
                    id,
                    name,
                    input: String::new(),
                });
            }
            ProviderEvent::TextDelta { text, .. } => match &mut self.open {
                Some(OpenBlock::Text(buffer)) => buffer.push_str(&text),
                _ => {
                    self.close();
                    self.open = Some(OpenBlock::Text(text));
                }
            },
            ProviderEvent::ToolInputDelta { fragment, .. } => {
                if let Some(OpenBlock::Tool { input, .. }) = &mut self.open {
                    input.push_str(&fragment);
                }
            }
            ProviderEvent::BlockStop { .. } => self.close(),
            ProviderEvent::TurnDelta { stop_reason } => {
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason;
                }
            }
        }
    }

    fn close(&mut self) {
        match self.open.take() {
            Some(OpenBlock::Text(text)) => self.blocks.push(ContentBlock::text(text)),
            Some(OpenBlock::Tool { id, name, input }) => {
                let input = if input.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&input).unwrap_or(Value::Object(Default::default()))
                };
                self.blocks.push(ContentBlock::ToolUse { id, name, input });
            }
            None => {}
        }
    }

    fn finish(mut self) -> super::LlmResponse {
        self.close();
        let message = ConversationMessage::new(Role::Assistant, self.blocks);
        let stop_reason = self.stop_reason.unwrap_or(if message.has_tool_use() {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        });
        super::LlmResponse {
            message,
            stop_reason,
            usage: None,
        }
    }
}
