//! Session state shared between the console, the dispatcher, and the pollers.
//!
//! ## Design
//! - SharedSession: Arc<Mutex<SessionState>> — one lock, never held across await
//! - ConversationLog mirrors every append to the terminal (or an mpsc sink in
//!   tests) so the rendered view and the exportable history stay in sync
//! - Message ordering = append order = display order

use chrono::{SecondsFormat, Utc};
use colored::*;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Role id → display label. Unknown ids fall back to the raw id.
static ROLE_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("controller", "Controller");
    m.insert("executor", "Executor");
    m
});

// ---------------------------------------------------------------------------
// Agents and speakers
// ---------------------------------------------------------------------------

/// One of the two fixed conversational participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agent {
    ClaudeA,
    ClaudeB,
}

impl Agent {
    /// The identifier used on the wire and in server message lists.
    pub fn wire_id(&self) -> &'static str {
        match self {
            Agent::ClaudeA => "claude-a",
            Agent::ClaudeB => "claude-b",
        }
    }

    /// The other agent — every message is addressed to the sender's peer.
    pub fn peer(&self) -> Agent {
        match self {
            Agent::ClaudeA => Agent::ClaudeB,
            Agent::ClaudeB => Agent::ClaudeA,
        }
    }

    pub fn short_title(&self) -> &'static str {
        match self {
            Agent::ClaudeA => "Claude-A",
            Agent::ClaudeB => "Claude-B",
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_id())
    }
}

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Speaker {
    ClaudeA,
    ClaudeB,
    System,
}

impl Speaker {
    /// Classify a server-reported sender id.
    ///
    /// `"system"` (any casing) maps to [`Speaker::System`]. Any other sender
    /// containing the substring `"claude-a"` maps to Claude-A; everything else
    /// is attributed to Claude-B. Suffixes and casing are tolerated so that
    /// ids like `claude-a-watcher` still land on the right side of the log.
    pub fn classify(wire_sender: &str) -> Speaker {
        let lower = wire_sender.to_ascii_lowercase();
        if lower == "system" {
            Speaker::System
        } else if lower.contains("claude-a") {
            Speaker::ClaudeA
        } else {
            Speaker::ClaudeB
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Speaker::ClaudeA => "[A]",
            Speaker::ClaudeB => "[B]",
            Speaker::System => "[SYS]",
        }
    }
}

impl From<Agent> for Speaker {
    fn from(agent: Agent) -> Speaker {
        match agent {
            Agent::ClaudeA => Speaker::ClaudeA,
            Agent::ClaudeB => Speaker::ClaudeB,
        }
    }
}

// ---------------------------------------------------------------------------
// Role registry
// ---------------------------------------------------------------------------

/// Maps the two fixed agents to their display roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRegistry {
    role_a: String,
    role_b: String,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        RoleRegistry {
            role_a: "controller".to_string(),
            role_b: "executor".to_string(),
        }
    }
}

impl RoleRegistry {
    pub fn new(role_a: impl Into<String>, role_b: impl Into<String>) -> Self {
        RoleRegistry {
            role_a: role_a.into(),
            role_b: role_b.into(),
        }
    }

    /// The role id assigned to `agent` (e.g. `"controller"`).
    pub fn role(&self, agent: Agent) -> &str {
        match agent {
            Agent::ClaudeA => &self.role_a,
            Agent::ClaudeB => &self.role_b,
        }
    }

    pub fn set_role(&mut self, agent: Agent, role: impl Into<String>) {
        match agent {
            Agent::ClaudeA => self.role_a = role.into(),
            Agent::ClaudeB => self.role_b = role.into(),
        }
    }

    /// Human-readable label for a role id, e.g. `controller` → `Controller`.
    pub fn role_label(&self, agent: Agent) -> &str {
        let role = self.role(agent);
        ROLE_LABELS.get(role).copied().unwrap_or(role)
    }

    /// Full display name, e.g. `Claude-A (Controller)`.
    pub fn display_name(&self, agent: Agent) -> String {
        format!("{} ({})", agent.short_title(), self.role_label(agent))
    }
}

// ---------------------------------------------------------------------------
// Conversation log
// ---------------------------------------------------------------------------

/// A single conversation entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub speaker: Speaker,
    pub sender_name: String,
    pub content: String,
    /// ISO-8601, set when the entry is appended locally.
    pub timestamp: String,
}

impl Message {
    pub fn new(speaker: Speaker, sender_name: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            speaker,
            sender_name: sender_name.into(),
            content: content.into(),
            timestamp: now_iso(),
        }
    }

    /// A system-authored entry with the fixed `[SYSTEM]` display name.
    pub fn system(content: impl Into<String>) -> Self {
        Message::new(Speaker::System, "[SYSTEM]", content)
    }
}

/// Append-only ordered history plus a rendered mirror.
///
/// When a sink is installed, appended entries are sent there instead of being
/// printed — the test seam for everything that would otherwise hit the
/// terminal.
pub struct ConversationLog {
    history: Vec<Message>,
    sink: Option<mpsc::UnboundedSender<Message>>,
    /// Suppress terminal rendering entirely (pollers constructed in tests).
    quiet: bool,
}

impl Default for ConversationLog {
    fn default() -> Self {
        ConversationLog {
            history: Vec::new(),
            sink: None,
            quiet: false,
        }
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        ConversationLog::default()
    }

    /// Route appended entries into `tx` instead of the terminal.
    pub fn with_sink(tx: mpsc::UnboundedSender<Message>) -> Self {
        ConversationLog {
            history: Vec::new(),
            sink: Some(tx),
            quiet: false,
        }
    }

    pub fn quiet() -> Self {
        ConversationLog {
            history: Vec::new(),
            sink: None,
            quiet: true,
        }
    }

    /// Append an entry, keeping the rendered view and the history in sync.
    pub fn append(&mut self, message: Message) {
        self.render(&message);
        self.history.push(message);
    }

    /// Replace the whole log with the initial system placeholder.
    pub fn clear(&mut self) {
        self.history.clear();
        self.append(Message::system(
            "Conversation cleared. Ready for a new Claude-A / Claude-B session.",
        ));
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn render(&self, message: &Message) {
        if let Some(tx) = &self.sink {
            let _ = tx.send(message.clone());
            return;
        }
        if self.quiet {
            return;
        }
        let header = format!("{} {}", message.speaker.icon(), message.sender_name);
        let colored_header = match message.speaker {
            Speaker::ClaudeA => header.bright_cyan().bold(),
            Speaker::ClaudeB => header.bright_yellow().bold(),
            Speaker::System => header.bright_black().bold(),
        };
        println!("{}  {}", colored_header, message.timestamp.bright_black());
        println!("{}\n", message.content);
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Mutable per-run state, created once at startup.
///
/// `server_count` is the number of server-reported messages already merged
/// into the log. It only ever grows; the poller slices the server list at
/// this index so no server message is appended twice.
pub struct SessionState {
    pub is_running: bool,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub message_delay: Duration,
    pub mode: String,
    pub roles: RoleRegistry,
    pub server_count: usize,
    pub log: ConversationLog,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            is_running: false,
            current_iteration: 0,
            max_iterations: 10,
            message_delay: Duration::from_secs(3),
            mode: "specialized".to_string(),
            roles: RoleRegistry::default(),
            server_count: 0,
            log: ConversationLog::new(),
        }
    }

    /// Apply the configured inputs and reset per-run counters for `start`.
    pub fn reset_for_start(
        &mut self,
        mode: String,
        roles: RoleRegistry,
        max_iterations: u32,
        message_delay: Duration,
    ) {
        self.mode = mode;
        self.roles = roles;
        self.max_iterations = max_iterations;
        self.message_delay = message_delay;
        self.is_running = true;
        self.current_iteration = 0;
        self.server_count = 0;
        self.log = match (&self.log.sink, self.log.quiet) {
            (Some(tx), _) => ConversationLog::with_sink(tx.clone()),
            (None, true) => ConversationLog::quiet(),
            (None, false) => ConversationLog::new(),
        };
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new()
    }
}

/// The single shared handle all tasks use. Mutation happens in short
/// critical sections; the lock is never held across a suspension point.
pub type SharedSession = Arc<Mutex<SessionState>>;

pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(SessionState::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // -- Agent --

    #[test]
    fn agent_wire_ids_fixed() {
        assert_eq!(Agent::ClaudeA.wire_id(), "claude-a");
        assert_eq!(Agent::ClaudeB.wire_id(), "claude-b");
    }

    #[test]
    fn agent_peer_is_symmetric() {
        assert_eq!(Agent::ClaudeA.peer(), Agent::ClaudeB);
        assert_eq!(Agent::ClaudeB.peer(), Agent::ClaudeA);
        assert_eq!(Agent::ClaudeA.peer().peer(), Agent::ClaudeA);
    }

    #[test]
    fn agent_display_matches_wire_id() {
        assert_eq!(Agent::ClaudeA.to_string(), "claude-a");
        assert_eq!(Agent::ClaudeB.to_string(), "claude-b");
    }

    // -- Speaker classification --

    #[rstest]
    #[case("claude-a", Speaker::ClaudeA)]
    #[case("CLAUDE-A", Speaker::ClaudeA)]
    #[case("claude-a-watcher", Speaker::ClaudeA)]
    #[case("prefix-Claude-A", Speaker::ClaudeA)]
    #[case("claude-b", Speaker::ClaudeB)]
    #[case("codex", Speaker::ClaudeB)]
    #[case("unknown", Speaker::ClaudeB)]
    #[case("", Speaker::ClaudeB)]
    #[case("system", Speaker::System)]
    #[case("SYSTEM", Speaker::System)]
    fn classify_wire_senders(#[case] wire: &str, #[case] expected: Speaker) {
        assert_eq!(Speaker::classify(wire), expected);
    }

    #[test]
    fn speaker_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&Speaker::ClaudeA).unwrap(), "\"claude-a\"");
        assert_eq!(serde_json::to_string(&Speaker::System).unwrap(), "\"system\"");
    }

    #[test]
    fn speaker_icons() {
        assert_eq!(Speaker::ClaudeA.icon(), "[A]");
        assert_eq!(Speaker::ClaudeB.icon(), "[B]");
        assert_eq!(Speaker::System.icon(), "[SYS]");
    }

    // -- RoleRegistry --

    #[test]
    fn default_roles_controller_executor() {
        let roles = RoleRegistry::default();
        assert_eq!(roles.role(Agent::ClaudeA), "controller");
        assert_eq!(roles.role(Agent::ClaudeB), "executor");
    }

    #[test]
    fn display_name_includes_role_label() {
        let roles = RoleRegistry::default();
        assert_eq!(roles.display_name(Agent::ClaudeA), "Claude-A (Controller)");
        assert_eq!(roles.display_name(Agent::ClaudeB), "Claude-B (Executor)");
    }

    #[test]
    fn swapped_roles_update_display_names() {
        let mut roles = RoleRegistry::default();
        roles.set_role(Agent::ClaudeA, "executor");
        roles.set_role(Agent::ClaudeB, "controller");
        assert_eq!(roles.display_name(Agent::ClaudeA), "Claude-A (Executor)");
        assert_eq!(roles.display_name(Agent::ClaudeB), "Claude-B (Controller)");
    }

    #[test]
    fn unknown_role_falls_back_to_raw_id() {
        let roles = RoleRegistry::new("reviewer", "executor");
        assert_eq!(roles.role_label(Agent::ClaudeA), "reviewer");
        assert_eq!(roles.display_name(Agent::ClaudeA), "Claude-A (reviewer)");
    }

    // -- Message --

    #[test]
    fn message_timestamp_is_iso8601_utc() {
        let msg = Message::new(Speaker::ClaudeA, "Claude-A", "hello");
        assert!(msg.timestamp.ends_with('Z') || msg.timestamp.contains("+00:00"));
        assert!(msg.timestamp.contains('T'));
    }

    #[test]
    fn system_message_uses_fixed_sender_name() {
        let msg = Message::system("started");
        assert_eq!(msg.speaker, Speaker::System);
        assert_eq!(msg.sender_name, "[SYSTEM]");
        assert_eq!(msg.content, "started");
    }

    // -- ConversationLog --

    #[test]
    fn append_keeps_history_in_order() {
        let mut log = ConversationLog::quiet();
        log.append(Message::new(Speaker::ClaudeA, "A", "one"));
        log.append(Message::new(Speaker::ClaudeB, "B", "two"));
        log.append(Message::system("three"));
        let contents: Vec<&str> = log.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn append_mirrors_into_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut log = ConversationLog::with_sink(tx);
        log.append(Message::new(Speaker::ClaudeB, "B", "hi"));
        let mirrored = rx.try_recv().expect("sink should receive the entry");
        assert_eq!(mirrored.content, "hi");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn clear_leaves_single_system_placeholder() {
        let mut log = ConversationLog::quiet();
        log.append(Message::new(Speaker::ClaudeA, "A", "one"));
        log.append(Message::new(Speaker::ClaudeB, "B", "two"));
        log.clear();
        assert_eq!(log.len(), 1);
        assert_eq!(log.history()[0].speaker, Speaker::System);
        assert!(log.history()[0].content.contains("cleared"));
    }

    #[test]
    fn clear_on_empty_log_still_places_placeholder() {
        let mut log = ConversationLog::quiet();
        log.clear();
        assert_eq!(log.len(), 1);
    }

    // -- SessionState --

    #[test]
    fn new_session_is_idle() {
        let state = SessionState::new();
        assert!(!state.is_running);
        assert_eq!(state.current_iteration, 0);
        assert_eq!(state.server_count, 0);
        assert!(state.log.is_empty());
        assert_eq!(state.mode, "specialized");
    }

    #[test]
    fn reset_for_start_applies_inputs_and_resets_counters() {
        let mut state = SessionState::new();
        state.server_count = 7;
        state.current_iteration = 3;
        state.log = ConversationLog::quiet();
        state.log.append(Message::system("stale"));

        state.reset_for_start(
            "freeform".to_string(),
            RoleRegistry::new("executor", "controller"),
            25,
            Duration::from_secs(5),
        );

        assert!(state.is_running);
        assert_eq!(state.current_iteration, 0);
        assert_eq!(state.server_count, 0);
        assert_eq!(state.mode, "freeform");
        assert_eq!(state.max_iterations, 25);
        assert_eq!(state.message_delay, Duration::from_secs(5));
        assert_eq!(state.roles.role(Agent::ClaudeA), "executor");
        assert!(state.log.is_empty(), "history must be cleared on start");
    }

    #[test]
    fn reset_for_start_preserves_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = SessionState::new();
        state.log = ConversationLog::with_sink(tx);
        state.reset_for_start(
            "specialized".to_string(),
            RoleRegistry::default(),
            10,
            Duration::from_secs(3),
        );
        state.log.append(Message::system("post-reset"));
        assert!(rx.try_recv().is_ok(), "sink must survive the reset");
    }
}
