//! History trimming strategies
//!
//! Trimming never separates a tool-use message from its tool results: a
//! kept segment never starts on a tool-result message, and a segment never
//! ends on an assistant message whose tool calls were cut off.

use crate::agents::config::HistoryStrategy;
use crate::agents::domain::{ConversationMessage, Role};

/// Apply a history strategy to loaded messages
pub fn apply_strategy(messages: &[ConversationMessage], strategy: &HistoryStrategy) -> Vec<ConversationMessage> {
    let trimmed = match strategy {
        HistoryStrategy::Full => messages.to_vec(),
        HistoryStrategy::SlidingWindow { size } => apply_sliding_window(messages, *size),
        HistoryStrategy::FirstLast { first, last } => apply_first_last(messages, *first, *last),
    };
    drop_dangling_tool_use(trimmed)
}

/// Keep only the last N messages
fn apply_sliding_window(messages: &[ConversationMessage], window_size: usize) -> Vec<ConversationMessage> {
    let start = pair_safe_start(messages, messages.len().saturating_sub(window_size));
    messages[start..].to_vec()
}

/// Keep first N messages and last M messages
fn apply_first_last(messages: &[ConversationMessage], first_count: usize, last_count: usize) -> Vec<ConversationMessage> {
    if messages.len() <= first_count + last_count {
        return messages.to_vec();
    }

    let mut first_end = first_count;
    // Do not end the head on a tool call whose results were cut off
    while first_end > 0 && messages[first_end - 1].has_tool_use() {
        first_end -= 1;
    }

    let last_start = pair_safe_start(messages, messages.len() - last_count);

    let mut result = messages[..first_end].to_vec();
    result.extend(messages[last_start.max(first_end)..].iter().cloned());
    result
}

/// Move `start` forward past tool-result messages
fn pair_safe_start(messages: &[ConversationMessage], mut start: usize) -> usize {
    while start < messages.len() && messages[start].is_tool_result() {
        start += 1;
    }
    start
}

/// A trailing assistant tool call without results cannot be replayed
fn drop_dangling_tool_use(mut messages: Vec<ConversationMessage>) -> Vec<ConversationMessage> {
    if messages
        .last()
        .is_some_and(|last| last.role == Role::Assistant && last.has_tool_use())
    {
        messages.pop();
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::ContentBlock;
    use serde_json::json;

    fn tool_call(id: &str) -> ConversationMessage {
        ConversationMessage::new(
            Role::Assistant,
            vec![ContentBlock::tool_use(id, "search", json!({}))],
        )
    }

    #[test]
    fn test_sliding_window_basic() {
        let messages = vec![
            ConversationMessage::user("1"),
            ConversationMessage::assistant("2"),
            ConversationMessage::user("3"),
            ConversationMessage::assistant("4"),
            ConversationMessage::user("5"),
        ];

        let result = apply_strategy(&messages, &HistoryStrategy::SlidingWindow { size: 3 });
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].text(), "3");
        assert_eq!(result[2].text(), "5");
    }

    #[test]
    fn test_sliding_window_never_starts_on_tool_result() {
        let messages = vec![
            ConversationMessage::user("find"),
            tool_call("tu_1"),
            ConversationMessage::tool_result("tu_1", "found", false),
            ConversationMessage::assistant("here you go"),
        ];

        let result = apply_strategy(&messages, &HistoryStrategy::SlidingWindow { size: 2 });
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text(), "here you go");
    }

    #[test]
    fn test_first_last() {
        let messages = vec![
            ConversationMessage::user("1"),
            ConversationMessage::assistant("2"),
            ConversationMessage::user("3"),
            ConversationMessage::assistant("4"),
            ConversationMessage::user("5"),
            ConversationMessage::assistant("6"),
        ];

        let result = apply_strategy(&messages, &HistoryStrategy::FirstLast { first: 2, last: 2 });
        let texts: Vec<String> = result.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["1", "2", "5", "6"]);
    }

    #[test]
    fn test_first_last_keeps_pairs_together() {
        let messages = vec![
            ConversationMessage::user("1"),
            tool_call("tu_1"),
            ConversationMessage::tool_result("tu_1", "r", false),
            ConversationMessage::assistant("4"),
            ConversationMessage::user("5"),
            ConversationMessage::assistant("6"),
        ];

        let result = apply_strategy(&messages, &HistoryStrategy::FirstLast { first: 2, last: 2 });
        let texts: Vec<String> = result.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["1", "5", "6"]);
    }

    #[test]
    fn test_full_drops_dangling_tool_call() {
        let messages = vec![ConversationMessage::user("go"), tool_call("tu_1")];
        let result = apply_strategy(&messages, &HistoryStrategy::Full);
        assert_eq!(result.len(), 1);
    }
}
