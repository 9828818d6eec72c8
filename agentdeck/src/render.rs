//! Plain-text rendering of feed entries and message timelines.

use agentdeck_core::format::{format_relative_time, tool_output_summary, tool_summary, truncate};
use agentdeck_core::{Activity, ActivityType, Correlation, Message, TimelineSummary};
use chrono::{DateTime, Utc};

/// One feed line: time, type, agent and a short description.
pub fn activity_line(activity: &Activity) -> String {
    format!(
        "{}  {:<16}  {:<18}  {}",
        activity.timestamp.format("%H:%M:%S"),
        activity.activity_type.as_str(),
        truncate(&activity.agent_id, 18),
        activity_detail(activity)
    )
}

fn activity_detail(activity: &Activity) -> String {
    let data = &activity.data;
    let text = |key: &str| data.get(key).and_then(|v| v.as_str());

    if activity.activity_type == ActivityType::ToolCall {
        if let Some(tool) = text("tool_name") {
            let summary = tool_summary(tool, data.get("tool_input"));
            return match tool_output_summary(data.get("tool_output")) {
                Some(output) => format!(
                    "{} → {}",
                    summary,
                    truncate(output.lines().next().unwrap_or_default(), 60)
                ),
                None => summary,
            };
        }
    }
    text("content")
        .or_else(|| text("message"))
        .or_else(|| text("status"))
        .map(|s| truncate(s.lines().next().unwrap_or_default(), 80))
        .unwrap_or_default()
}

fn message_header(message: &Message, now: DateTime<Utc>) -> String {
    let to = if message.to_agent.is_empty() {
        String::new()
    } else {
        format!(" → {}", message.to_agent)
    };
    format!(
        "[{}] {}{} ({}): {}",
        message.timestamp.format("%Y-%m-%d %H:%M:%S"),
        message.from_agent,
        to,
        format_relative_time(message.timestamp, now),
        truncate(message.content.lines().next().unwrap_or_default(), 80)
    )
}

/// Render every message with its collapsed step timeline.
pub fn timeline_lines(correlation: &Correlation, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();
    for message in &correlation.messages {
        lines.push(message_header(message, now));

        let tool_calls = correlation.tool_calls(&message.id);
        let steps = agentdeck_core::build_timeline(correlation.thoughts(&message.id), tool_calls);
        if steps.is_empty() {
            continue;
        }
        let summary = TimelineSummary::new(steps, tool_calls);
        lines.push(format!("    {}", summary.headline()));
        for step in &summary.shown {
            lines.push(format!(
                "      {}  {}",
                step.timestamp.format("%H:%M:%S"),
                step.describe()
            ));
        }
        if summary.hidden > 0 {
            lines.push(format!("      +{} more", summary.hidden));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_core::history::MessageHistory;
    use agentdeck_core::{correlate, MessageType, ToolCall};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_activity_line_uses_tool_summary() {
        let activity = Activity {
            id: "a1".to_string(),
            timestamp: at(0),
            activity_type: ActivityType::ToolCall,
            agent_id: "worker-1".to_string(),
            data: serde_json::json!({"tool_name": "Bash", "tool_input": {"command": "cargo fmt"}}),
        };
        assert!(activity_line(&activity).ends_with("$ cargo fmt"));
    }

    #[test]
    fn test_activity_line_shows_tool_output() {
        let activity = Activity {
            id: "a2".to_string(),
            timestamp: at(0),
            activity_type: ActivityType::ToolCall,
            agent_id: "worker-1".to_string(),
            data: serde_json::json!({
                "tool_name": "Bash",
                "tool_input": {"command": "cargo test"},
                "tool_output": {"output": "test result: ok. 12 passed\nfinished"},
            }),
        };
        assert!(activity_line(&activity).ends_with("$ cargo test → test result: ok. 12 passed"));
    }

    #[test]
    fn test_timeline_lines() {
        let history = MessageHistory {
            messages: vec![Message {
                id: "m1".to_string(),
                timestamp: at(10),
                from_agent: "worker-1".to_string(),
                to_agent: "supervisor".to_string(),
                message_type: MessageType::Response,
                content: "Done\nDetails follow".to_string(),
            }],
            live_events: vec![ToolCall {
                id: "c1".to_string(),
                timestamp: at(5),
                agent_id: "worker-1".to_string(),
                tool_name: Some("Read".to_string()),
                tool_input: Some(serde_json::json!({"file_path": "src/main.rs"})),
                tool_output: None,
            }],
            ..Default::default()
        };
        let lines = timeline_lines(&correlate(&history), at(70));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("worker-1 → supervisor (1m ago): Done"));
        assert_eq!(lines[1], "    1 step · Read ×1");
        assert!(lines[2].ends_with("Read src/main.rs"));
    }
}
