//! Conversation export and the startup prompt template.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::BridgeError;
use crate::session::{now_iso, Message};

/// Current Unix epoch in milliseconds, used for export file names.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render the whole history as a flat text document.
///
/// Fixed header, one block per message in original order, a 50-dash rule
/// after each block.
pub fn render_export(
    history: &[Message],
    mode: &str,
    role_a_label: &str,
    role_b_label: &str,
) -> String {
    let mut out = String::new();
    out.push_str("AI-Bridge Dual Agent Conversation Export\n");
    out.push_str(&format!("Generated: {}\n", now_iso()));
    out.push_str(&format!("Mode: {}\n", mode));
    out.push_str(&format!("Claude-A Role: {}\n", role_a_label));
    out.push_str(&format!("Claude-B Role: {}\n\n", role_b_label));

    for (index, msg) in history.iter().enumerate() {
        out.push_str(&format!("Message {}:\n", index + 1));
        out.push_str(&format!("From: {}\n", msg.sender_name));
        out.push_str(&format!("Time: {}\n", msg.timestamp));
        out.push_str(&format!("Content:\n{}\n\n", msg.content));
        out.push_str(&"-".repeat(50));
        out.push_str("\n\n");
    }

    out
}

/// Write an export document into `dir`, returning the created path.
pub fn write_export(dir: &Path, text: &str) -> Result<PathBuf, BridgeError> {
    let path = dir.join(format!("aibridge-dual-agent-{}.txt", now_ms()));
    fs::write(&path, text).map_err(|e| BridgeError::Export {
        detail: format!("{}: {}", path.display(), e),
    })?;
    Ok(path)
}

/// Render the dual-agent startup prompt for `objective`.
///
/// The operator pastes this into the first agent to bootstrap the protocol;
/// the browser original copied it to the clipboard.
pub fn startup_prompt(objective: &str, role_a_label: &str, role_b_label: &str) -> String {
    format!(
        "OBJECTIVE: {objective}\n\
         \n\
         DUAL-AGENT CONFIGURATION:\n\
         - Claude-A ({role_a_label}): coordinates and supervises\n\
         - Claude-B ({role_b_label}): implements and responds\n\
         - Shared workspace: workspace/\n\
         - Communication via files: to_claude-b.txt / from_claude-b.txt\n\
         \n\
         INSTRUCTIONS:\n\
         1. Define the architecture and the division of work\n\
         2. Each agent creates files in its specialty\n\
         3. Cross-review and iterative improvements\n\
         4. Joint testing of the complete system\n\
         \n\
         MESSAGE FORMAT:\n\
         [TIMESTAMP]: {timestamp}\n\
         [FROM]: Claude-A|Claude-B\n\
         [TO]: Claude-B|Claude-A\n\
         [ROLE]: {role_a_label}|{role_b_label}\n\
         [INTENT]: plan|design|code|review|test|done\n\
         [PAYLOAD]: (actual message)",
        objective = objective,
        role_a_label = role_a_label,
        role_b_label = role_b_label,
        timestamp = now_iso(),
    )
}

/// The scripted first message sent from Claude-A right after session start.
pub fn initial_plan_message(objective: &str) -> String {
    format!(
        "OBJECTIVE: {objective}\n\n[INTENT]: plan\n[PAYLOAD]:\n\
         Please analyze the objective and reply with:\n\
         - a brief division of tasks\n\
         - first steps for controller and executor\n\
         - open questions, if any"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Speaker;
    use tempfile::tempdir;

    fn msg(name: &str, content: &str) -> Message {
        Message {
            speaker: Speaker::ClaudeA,
            sender_name: name.to_string(),
            content: content.to_string(),
            timestamp: "2025-06-01T10:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn export_header_carries_mode_and_roles() {
        let text = render_export(&[], "specialized", "Controller", "Executor");
        assert!(text.starts_with("AI-Bridge Dual Agent Conversation Export\n"));
        assert!(text.contains("Mode: specialized\n"));
        assert!(text.contains("Claude-A Role: Controller\n"));
        assert!(text.contains("Claude-B Role: Executor\n"));
    }

    #[test]
    fn export_one_block_per_message_in_order() {
        let history = vec![msg("Claude-A (Controller)", "first"), msg("Claude-B (Executor)", "second")];
        let text = render_export(&history, "specialized", "Controller", "Executor");
        let first = text.find("Message 1:").expect("block 1");
        let second = text.find("Message 2:").expect("block 2");
        assert!(first < second);
        assert!(text.find("first").unwrap() < text.find("second").unwrap());
        assert_eq!(text.matches("Message ").count(), 2);
    }

    #[test]
    fn export_blocks_carry_sender_time_content() {
        let history = vec![msg("Claude-A (Controller)", "payload text")];
        let text = render_export(&history, "specialized", "Controller", "Executor");
        assert!(text.contains("From: Claude-A (Controller)\n"));
        assert!(text.contains("Time: 2025-06-01T10:00:00.000Z\n"));
        assert!(text.contains("Content:\npayload text\n"));
    }

    #[test]
    fn export_blocks_separated_by_fifty_dashes() {
        let history = vec![msg("A", "x"), msg("B", "y")];
        let text = render_export(&history, "specialized", "Controller", "Executor");
        assert_eq!(text.matches(&"-".repeat(50)).count(), 2);
    }

    #[test]
    fn write_export_creates_named_file() {
        let dir = tempdir().expect("tempdir");
        let path = write_export(dir.path(), "content").expect("write");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("aibridge-dual-agent-"));
        assert!(name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn write_export_into_missing_dir_errors() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = write_export(&missing, "content").expect_err("must fail");
        assert!(err.to_string().contains("Export failed"));
    }

    #[test]
    fn startup_prompt_embeds_objective_and_roles() {
        let prompt = startup_prompt("build a chat app", "Controller", "Executor");
        assert!(prompt.starts_with("OBJECTIVE: build a chat app\n"));
        assert!(prompt.contains("Claude-A (Controller)"));
        assert!(prompt.contains("Claude-B (Executor)"));
        assert!(prompt.contains("[INTENT]: plan|design|code|review|test|done"));
    }

    #[test]
    fn initial_plan_message_embeds_objective_and_intent() {
        let plan = initial_plan_message("refactor the parser");
        assert!(plan.starts_with("OBJECTIVE: refactor the parser\n"));
        assert!(plan.contains("[INTENT]: plan"));
        assert!(plan.contains("[PAYLOAD]:"));
    }

    #[test]
    fn now_ms_is_positive_and_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 1_600_000_000_000, "epoch-ms should be in the modern era");
        assert!(b >= a);
    }
}
