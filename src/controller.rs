//! Session lifecycle and message dispatch.
//!
//! The controller is the single owner of session mutation: pollers only merge
//! through the shared handle, every other write goes through here. Locks are
//! taken in short scopes and never held across an await.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::api::{BridgeClient, BridgeError, SendMessageRequest, StartSessionRequest};
use crate::export;
use crate::notify::Notifier;
use crate::session::{Agent, Message, RoleRegistry, SharedSession, Speaker};

/// The configured inputs a `start` captures (the browser form fields).
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub mode: String,
    pub roles: RoleRegistry,
    pub max_iterations: u32,
    pub message_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            mode: "specialized".to_string(),
            roles: RoleRegistry::default(),
            max_iterations: 10,
            message_delay: Duration::from_secs(3),
        }
    }
}

/// Orchestrates start/stop, dispatch, export, and clear.
pub struct SessionController {
    client: Arc<BridgeClient>,
    session: SharedSession,
    notifier: Notifier,
    settings: SessionSettings,
    export_dir: PathBuf,
}

impl SessionController {
    pub fn new(
        client: Arc<BridgeClient>,
        session: SharedSession,
        notifier: Notifier,
        settings: SessionSettings,
        export_dir: PathBuf,
    ) -> Self {
        SessionController {
            client,
            session,
            notifier,
            settings,
            export_dir,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().expect("session lock").is_running
    }

    /// Start a session: validate, reset state, call the backend, then send
    /// the scripted plan message.
    ///
    /// An empty objective is rejected before any state change or network
    /// call. A backend failure after the reset leaves the session RUNNING —
    /// the same acknowledged inconsistency the original panel has; the
    /// operator resolves it with `stop`.
    pub async fn start(&self, objective: &str) -> Result<(), BridgeError> {
        let objective = objective.trim();
        if objective.is_empty() {
            self.notifier.error("Define an objective before starting");
            return Err(BridgeError::EmptyObjective);
        }

        {
            let mut state = self.session.lock().expect("session lock");
            state.reset_for_start(
                self.settings.mode.clone(),
                self.settings.roles.clone(),
                self.settings.max_iterations,
                self.settings.message_delay,
            );
        }

        let mut roles = HashMap::new();
        roles.insert(
            Agent::ClaudeA.wire_id().to_string(),
            self.settings.roles.role(Agent::ClaudeA).to_string(),
        );
        roles.insert(
            Agent::ClaudeB.wire_id().to_string(),
            self.settings.roles.role(Agent::ClaudeB).to_string(),
        );
        let request = StartSessionRequest {
            objective: objective.to_string(),
            mode: self.settings.mode.clone(),
            roles,
        };

        if let Err(e) = self.client.start_session(&request).await {
            self.notifier.error(format!("Error starting session: {e}"));
            return Err(e);
        }

        info!(mode = %self.settings.mode, "session started");
        {
            let mut state = self.session.lock().expect("session lock");
            let banner = format!(
                "Automated session started\n\
                 Mode: {}\n\
                 Claude-A: {}\n\
                 Claude-B: {}\n\
                 Objective: {}\n\n\
                 Claude-A / Claude-B relay is live.",
                state.mode,
                state.roles.role(Agent::ClaudeA),
                state.roles.role(Agent::ClaudeB),
                objective,
            );
            state.log.append(Message::system(banner));
        }

        // Scripted opener: Claude-A asks Claude-B for a plan. A failure here
        // is logged but does not fail the start — the session stays live and
        // the operator can dispatch manually.
        let plan = export::initial_plan_message(objective);
        let plan_request = SendMessageRequest {
            sender: Agent::ClaudeA.wire_id().to_string(),
            recipient: Agent::ClaudeB.wire_id().to_string(),
            content: plan.clone(),
            role: self.settings.roles.role(Agent::ClaudeA).to_string(),
            intent: "plan".to_string(),
            last_seen: Some("none".to_string()),
        };
        match self.client.send_message(&plan_request).await {
            Ok(()) => {
                let mut state = self.session.lock().expect("session lock");
                let name = state.roles.display_name(Agent::ClaudeA);
                state.log.append(Message::new(Speaker::ClaudeA, name, plan));
                self.notifier.success("First message sent to Claude-B");
            }
            Err(e) => {
                error!(error = %e, "could not send the initial plan message");
            }
        }

        self.notifier.success("Automated session started");
        Ok(())
    }

    /// Stop the session. Only flips the flag — an in-flight poll fetch still
    /// merges; the next tick is a no-op.
    pub fn stop(&self) {
        let mut state = self.session.lock().expect("session lock");
        state.is_running = false;
        state
            .log
            .append(Message::system("Automated session stopped by the operator."));
        drop(state);
        info!("session stopped");
        self.notifier.success("Automated session stopped");
    }

    /// Dispatch one manual message on behalf of `agent`.
    ///
    /// On backend acknowledgement the message is appended locally; on any
    /// failure a notification carries the server-provided or generic error
    /// and nothing is appended. No retry.
    pub async fn send(&self, agent: Agent, text: &str) -> Result<(), BridgeError> {
        let text = text.trim();
        if text.is_empty() {
            self.notifier.error("Write a message first");
            return Err(BridgeError::EmptyMessage);
        }

        let role = {
            let state = self.session.lock().expect("session lock");
            state.roles.role(agent).to_string()
        };

        let request = SendMessageRequest {
            sender: agent.wire_id().to_string(),
            recipient: agent.peer().wire_id().to_string(),
            content: text.to_string(),
            role,
            intent: "manual".to_string(),
            last_seen: None,
        };

        match self.client.send_message(&request).await {
            Ok(()) => {
                let mut state = self.session.lock().expect("session lock");
                let name = state.roles.display_name(agent);
                state
                    .log
                    .append(Message::new(agent.into(), name, text.to_string()));
                drop(state);
                self.notifier.success(format!("Message sent from {agent}"));
                Ok(())
            }
            Err(e) => {
                self.notifier.error(format!("Error sending message: {e}"));
                Err(e)
            }
        }
    }

    /// Export the conversation history to a text file in the export dir.
    pub fn export(&self) -> Result<PathBuf, BridgeError> {
        let (history, mode, label_a, label_b) = {
            let state = self.session.lock().expect("session lock");
            (
                state.log.history().to_vec(),
                state.mode.clone(),
                state.roles.role_label(Agent::ClaudeA).to_string(),
                state.roles.role_label(Agent::ClaudeB).to_string(),
            )
        };

        if history.is_empty() {
            self.notifier.error("No conversation to export");
            return Err(BridgeError::EmptyExport);
        }

        let text = export::render_export(&history, &mode, &label_a, &label_b);
        match export::write_export(&self.export_dir, &text) {
            Ok(path) => {
                self.notifier
                    .success(format!("Conversation exported to {}", path.display()));
                Ok(path)
            }
            Err(e) => {
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Reset the log to the initial system placeholder.
    pub fn clear(&self) {
        let mut state = self.session.lock().expect("session lock");
        state.log.clear();
        drop(state);
        self.notifier.success("Conversation cleared");
    }

    /// Render the startup prompt template for the given objective.
    pub fn startup_prompt(&self, objective: &str) -> Result<String, BridgeError> {
        let objective = objective.trim();
        if objective.is_empty() {
            self.notifier.error("Define an objective first");
            return Err(BridgeError::EmptyObjective);
        }
        Ok(export::startup_prompt(
            objective,
            self.settings.roles.role_label(Agent::ClaudeA),
            self.settings.roles.role_label(Agent::ClaudeB),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
