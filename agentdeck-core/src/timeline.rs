//! Timeline Builder
//!
//! Interleaves a message's reasoning thoughts and tool calls into steps. A
//! thought immediately followed by a tool call becomes one paired step
//! ("reasoned, then acted"); everything else stands alone. Thoughts never
//! merge with each other.

use chrono::{DateTime, Utc};

use crate::format::{tool_summary, truncate_thought};
use crate::types::{Thought, ToolCall};

/// Steps listed before the rest collapse into "+N more".
pub const MAX_SHOWN: usize = 30;

/// One rendered unit: a thought, a tool call, or a thought paired with the
/// tool call it preceded.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineStep {
    pub thought: Option<Thought>,
    pub tool: Option<ToolCall>,
    pub timestamp: DateTime<Utc>,
}

impl TimelineStep {
    /// Short text for the step, e.g. `Checking config → Read src/config.rs`.
    pub fn describe(&self) -> String {
        let thought = self
            .thought
            .as_ref()
            .and_then(|t| t.content.as_deref())
            .map(truncate_thought);
        let tool = self.tool.as_ref().map(|call| {
            tool_summary(
                call.tool_name.as_deref().unwrap_or("?"),
                call.tool_input.as_ref(),
            )
        });
        match (thought, tool) {
            (Some(thought), Some(tool)) => format!("{} → {}", thought, tool),
            (Some(thought), None) => thought,
            (None, Some(tool)) => tool,
            (None, None) => String::new(),
        }
    }
}

enum Item<'a> {
    Thought(&'a Thought),
    Tool(&'a ToolCall),
}

impl Item<'_> {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Item::Thought(t) => t.timestamp,
            Item::Tool(c) => c.timestamp,
        }
    }
}

/// Build the step sequence for one message.
///
/// Only narrative thoughts (reasoning with content) take part. Items are
/// ordered by timestamp; on ties thoughts sort before tool calls.
pub fn build_timeline(thoughts: &[Thought], tool_calls: &[ToolCall]) -> Vec<TimelineStep> {
    let mut items: Vec<Item<'_>> = thoughts
        .iter()
        .filter(|t| t.is_narrative())
        .map(Item::Thought)
        .chain(tool_calls.iter().map(Item::Tool))
        .collect();
    items.sort_by_key(Item::timestamp);

    let mut steps = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();
    while let Some(item) = iter.next() {
        match item {
            Item::Thought(thought) => {
                let tool = match iter.peek() {
                    Some(Item::Tool(call)) => {
                        let call = (*call).clone();
                        iter.next();
                        Some(call)
                    }
                    _ => None,
                };
                steps.push(TimelineStep {
                    thought: Some(thought.clone()),
                    tool,
                    timestamp: thought.timestamp,
                });
            }
            Item::Tool(call) => steps.push(TimelineStep {
                thought: None,
                tool: Some(call.clone()),
                timestamp: call.timestamp,
            }),
        }
    }
    steps
}

/// Collapsed view of a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSummary {
    pub total_steps: usize,
    /// Tool name and call count, most used first
    pub tool_counts: Vec<(String, usize)>,
    /// The first [`MAX_SHOWN`] steps
    pub shown: Vec<TimelineStep>,
    /// Steps beyond [`MAX_SHOWN`]
    pub hidden: usize,
}

impl TimelineSummary {
    pub fn new(steps: Vec<TimelineStep>, tool_calls: &[ToolCall]) -> Self {
        let total_steps = steps.len();
        let hidden = total_steps.saturating_sub(MAX_SHOWN);
        let mut shown = steps;
        shown.truncate(MAX_SHOWN);
        Self {
            total_steps,
            tool_counts: tool_counts(tool_calls),
            shown,
            hidden,
        }
    }

    /// Header line, e.g. `4 steps · Read ×2, Bash ×1`.
    pub fn headline(&self) -> String {
        let plural = if self.total_steps == 1 { "" } else { "s" };
        let counts = self
            .tool_counts
            .iter()
            .map(|(name, count)| format!("{} ×{}", name, count))
            .collect::<Vec<_>>()
            .join(", ");
        if counts.is_empty() {
            format!("{} step{}", self.total_steps, plural)
        } else {
            format!("{} step{} · {}", self.total_steps, plural, counts)
        }
    }
}

/// Count calls per tool, most used first; ties keep first-seen order.
fn tool_counts(tool_calls: &[ToolCall]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for call in tool_calls {
        let name = call.tool_name.as_deref().unwrap_or("?");
        match counts.iter_mut().find(|(n, _)| n == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThoughtType;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn thought(secs: i64, content: &str) -> Thought {
        Thought {
            id: format!("t{}", secs),
            agent_name: "worker".to_string(),
            thought_type: ThoughtType::Reasoning,
            content: Some(content.to_string()),
            tool_name: None,
            tool_input: None,
            tool_response: None,
            timestamp: at(secs),
        }
    }

    fn call(secs: i64, tool: &str) -> ToolCall {
        ToolCall {
            id: format!("c{}", secs),
            timestamp: at(secs),
            agent_id: "worker".to_string(),
            tool_name: Some(tool.to_string()),
            tool_input: None,
            tool_output: None,
        }
    }

    #[test]
    fn test_thought_pairs_with_following_tool() {
        let steps = build_timeline(&[thought(1, "look"), thought(3, "done")], &[call(2, "Read")]);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].thought.as_ref().map(|t| t.timestamp), Some(at(1)));
        assert_eq!(steps[0].tool.as_ref().map(|c| c.timestamp), Some(at(2)));
        assert_eq!(steps[1].thought.as_ref().map(|t| t.timestamp), Some(at(3)));
        assert!(steps[1].tool.is_none());
    }

    #[test]
    fn test_consecutive_thoughts_stay_separate() {
        let steps = build_timeline(&[thought(1, "a"), thought(2, "b")], &[call(3, "Bash")]);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].tool.is_none());
        assert_eq!(steps[1].tool.as_ref().map(|c| c.id.as_str()), Some("c3"));
    }

    #[test]
    fn test_leading_tool_stands_alone() {
        let steps = build_timeline(&[thought(5, "after")], &[call(1, "Glob"), call(2, "Read")]);
        assert_eq!(steps.len(), 3);
        assert!(steps[0].thought.is_none() && steps[1].thought.is_none());
        assert!(steps[2].tool.is_none());
    }

    #[test]
    fn test_tie_puts_thought_first() {
        let steps = build_timeline(&[thought(4, "same instant")], &[call(4, "Edit")]);
        assert_eq!(steps.len(), 1);
        assert!(steps[0].thought.is_some() && steps[0].tool.is_some());
    }

    #[test]
    fn test_non_narrative_thoughts_are_skipped() {
        let mut echo = thought(1, "raw output");
        echo.thought_type = ThoughtType::ToolResult;
        let mut empty = thought(2, "");
        empty.content = None;

        let steps = build_timeline(&[echo, empty], &[call(3, "Read")]);
        assert_eq!(steps.len(), 1);
        assert!(steps[0].thought.is_none());
        assert!(build_timeline(&[], &[]).is_empty());
    }

    #[test]
    fn test_summary_counts_and_collapse() {
        let calls: Vec<ToolCall> = (0..35)
            .map(|i| call(i, if i % 5 == 0 { "Bash" } else { "Read" }))
            .collect();
        let steps = build_timeline(&[], &calls);
        let summary = TimelineSummary::new(steps, &calls);

        assert_eq!(summary.total_steps, 35);
        assert_eq!(summary.shown.len(), MAX_SHOWN);
        assert_eq!(summary.hidden, 5);
        assert_eq!(
            summary.tool_counts,
            vec![("Read".to_string(), 28), ("Bash".to_string(), 7)]
        );
        assert_eq!(summary.headline(), "35 steps · Read ×28, Bash ×7");
    }

    #[test]
    fn test_describe_step() {
        let mut read = call(2, "Read");
        read.tool_input = Some(serde_json::json!({"file_path": "src/lib.rs"}));
        let steps = build_timeline(&[thought(1, "Check exports\nmore detail")], &[read]);
        assert_eq!(steps[0].describe(), "Check exports → Read src/lib.rs");

        let one = TimelineSummary::new(steps, &[]);
        assert_eq!(one.headline(), "1 step");
    }
}
