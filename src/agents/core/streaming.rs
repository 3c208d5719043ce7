//! Streaming transcoder
//!
//! Providers number content blocks with small native indices and reuse them
//! once a block closes: reasoning text at 0, a tool call at 1, then the
//! answer at 0 again. Consumers need one stable id per block, so the
//! transcoder assigns its own `frontend_index`, strictly increasing per
//! block, and tags every delta with the block that is currently open rather
//! than looking the native index up.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{CancelToken, ConversationTurnEngine};
use crate::agents::domain::{
    BlockKind, ConversationMessage, EventStream, EventStreamSender, StopReason, StreamEvent,
    ToolInvocationRecord, ToolResultPayload,
};
use crate::agents::llm::ProviderEvent;

const STREAM_BUFFER: usize = 64;

/// Something the runner must do after feeding an event to the state
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeAction {
    Emit(StreamEvent),
    /// Dispatch a completed tool call and emit its output at `frontend_index`
    Dispatch {
        frontend_index: usize,
        record: ToolInvocationRecord,
    },
}

#[derive(Debug)]
struct OpenBlock {
    native_index: usize,
    frontend_index: usize,
    tool: Option<PendingTool>,
}

#[derive(Debug)]
struct PendingTool {
    id: String,
    name: String,
    input: String,
}

/// Pure re-indexing state machine.
#[derive(Debug, Default)]
pub struct TranscodeState {
    next_frontend_index: usize,
    open: Option<OpenBlock>,
    stop_reason: Option<StopReason>,
    complete: bool,
}

impl TranscodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the provider turn has completed
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn apply(&mut self, event: ProviderEvent) -> Vec<TranscodeAction> {
        if self.complete {
            return Vec::new();
        }

        let mut actions = Vec::new();
        match event {
            ProviderEvent::MessageStart => actions.push(TranscodeAction::Emit(StreamEvent::MessageStart)),
            ProviderEvent::BlockStart { index } => {
                if !self.is_open(index, false) {
                    self.open_block(index, None, &mut actions);
                }
            }
            ProviderEvent::ToolUseStart { index, id, name } => {
                if !self.is_open(index, true) {
                    let tool = PendingTool {
                        id,
                        name,
                        input: String::new(),
                    };
                    self.open_block(index, Some(tool), &mut actions);
                }
            }
            ProviderEvent::TextDelta { index, text } => {
                if self.open.is_none() {
                    debug!(native_index = index, "Text delta without open block, opening implicit text block");
                    self.open_block(index, None, &mut actions);
                }
                if let Some(open) = &self.open {
                    actions.push(TranscodeAction::Emit(StreamEvent::TextDelta {
                        frontend_index: open.frontend_index,
                        text,
                    }));
                }
            }
            ProviderEvent::ToolInputDelta { index, fragment } => match &mut self.open {
                Some(OpenBlock {
                    frontend_index,
                    tool: Some(tool),
                    ..
                }) => {
                    tool.input.push_str(&fragment);
                    actions.push(TranscodeAction::Emit(StreamEvent::ToolInputDelta {
                        frontend_index: *frontend_index,
                        fragment,
                    }));
                }
                _ => warn!(native_index = index, "Tool input delta without open tool block, dropping"),
            },
            ProviderEvent::BlockStop { .. } => self.close_open(&mut actions),
            ProviderEvent::TurnDelta { stop_reason } => {
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason;
                }
            }
            ProviderEvent::TurnComplete => return self.finish(),
        }
        actions
    }

    /// Close whatever is open and emit the terminal event
    pub fn finish(&mut self) -> Vec<TranscodeAction> {
        if self.complete {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.close_open(&mut actions);
        self.complete = true;
        actions.push(TranscodeAction::Emit(StreamEvent::TurnComplete {
            stop_reason: self.stop_reason,
        }));
        actions
    }

    fn is_open(&self, native_index: usize, tool: bool) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| open.native_index == native_index && open.tool.is_some() == tool)
    }

    fn open_block(&mut self, native_index: usize, tool: Option<PendingTool>, actions: &mut Vec<TranscodeAction>) {
        self.close_open(actions);

        let frontend_index = self.next_frontend_index;
        self.next_frontend_index += 1;

        let (kind, tool_use_id, name) = match &tool {
            Some(tool) => (BlockKind::ToolUse, Some(tool.id.clone()), Some(tool.name.clone())),
            None => (BlockKind::Text, None, None),
        };
        actions.push(TranscodeAction::Emit(StreamEvent::BlockStart {
            kind,
            frontend_index,
            tool_use_id,
            name,
        }));
        self.open = Some(OpenBlock {
            native_index,
            frontend_index,
            tool,
        });
    }

    /// Close the open block; the native index mapping is forgotten here
    fn close_open(&mut self, actions: &mut Vec<TranscodeAction>) {
        let Some(open) = self.open.take() else {
            return;
        };
        actions.push(TranscodeAction::Emit(StreamEvent::BlockStop {
            frontend_index: open.frontend_index,
        }));

        let Some(tool) = open.tool else {
            return;
        };
        let parsed = if tool.input.trim().is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(&tool.input)
        };

        match parsed {
            Ok(input) => {
                actions.push(TranscodeAction::Emit(StreamEvent::ToolResult {
                    frontend_index: open.frontend_index,
                    tool_use_id: tool.id.clone(),
                    name: tool.name.clone(),
                    payload: ToolResultPayload::Input {
                        input: input.clone(),
                    },
                }));
                actions.push(TranscodeAction::Dispatch {
                    frontend_index: open.frontend_index,
                    record: ToolInvocationRecord::new(tool.id, tool.name, input),
                });
            }
            Err(e) => {
                warn!(tool = %tool.name, tool_use_id = %tool.id, error = %e, "Malformed tool input JSON");
                actions.push(TranscodeAction::Emit(StreamEvent::ToolResult {
                    frontend_index: open.frontend_index,
                    tool_use_id: tool.id,
                    name: tool.name,
                    payload: ToolResultPayload::Output {
                        content: format!("Invalid tool input JSON: {}", e),
                        is_error: true,
                    },
                }));
            }
        }
    }
}

/// Streams one LLM turn as canonical events, dispatching tool calls as
/// their blocks close.
pub struct StreamingTranscoder {
    engine: Arc<ConversationTurnEngine>,
}

impl StreamingTranscoder {
    pub fn new(engine: Arc<ConversationTurnEngine>) -> Self {
        Self { engine }
    }

    /// Start streaming. Events reach the returned stream in generation order.
    ///
    /// On cancellation (or when the consumer drops the stream) nothing more
    /// is forwarded and no new tool call is dispatched. A dispatch already
    /// in flight runs to completion.
    pub fn run_streaming(&self, messages: Vec<ConversationMessage>, cancel: CancelToken) -> EventStream {
        let (sender, stream) = EventStream::channel(STREAM_BUFFER);
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            Self::run_internal(engine, messages, cancel, sender).await;
        });
        stream
    }

    async fn run_internal(
        engine: Arc<ConversationTurnEngine>,
        messages: Vec<ConversationMessage>,
        cancel: CancelToken,
        sender: EventStreamSender,
    ) {
        let agent = engine.profile().name.clone();
        let request = engine.build_request(&messages).await;
        let mut provider = engine.llm().stream(request);
        let mut state = TranscodeState::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(agent = %agent, "Stream cancelled");
                    return;
                }
                next = provider.recv() => next,
            };

            let actions = match next {
                Some(Ok(event)) => state.apply(event),
                Some(Err(e)) => {
                    warn!(agent = %agent, error = %e, "Provider stream failed");
                    let _ = sender.send(StreamEvent::error(e.to_string())).await;
                    return;
                }
                None => state.finish(),
            };

            for action in actions {
                if cancel.is_cancelled() || sender.is_closed() {
                    debug!(agent = %agent, "Consumer gone, stopping stream");
                    return;
                }
                match action {
                    TranscodeAction::Emit(event) => {
                        if !sender.send(event).await {
                            return;
                        }
                    }
                    TranscodeAction::Dispatch {
                        frontend_index,
                        record,
                    } => {
                        let outcome = engine.execute_tool_use(&record).await;
                        if cancel.is_cancelled() {
                            return;
                        }
                        let event = StreamEvent::ToolResult {
                            frontend_index,
                            tool_use_id: record.id,
                            name: record.name,
                            payload: ToolResultPayload::Output {
                                content: outcome.content,
                                is_error: outcome.is_error,
                            },
                        };
                        if !sender.send(event).await {
                            return;
                        }
                    }
                }
            }

            if state.is_complete() {
                return;
            }
        }
    }
}
