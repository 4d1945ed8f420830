use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_bridge::api::{BridgeClient, FileBundleRequest};
use ai_bridge::cli::Args;
use ai_bridge::config::{FileConfig, Settings};
use ai_bridge::controller::{SessionController, SessionSettings};
use ai_bridge::notify::Notifier;
use ai_bridge::poller::{new_shared_metrics, MessagePoller, MetricsPoller, SharedMetrics};
use ai_bridge::session::{new_shared_session, now_iso, Agent, RoleRegistry, SharedSession};
use ai_bridge::store::ObjectiveStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let file = match &args.config {
        Some(path) => match FileConfig::load(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("{} {}", "[error]".bright_red().bold(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&args, &file);

    let console_id = uuid::Uuid::new_v4();
    info!(%console_id, base_url = %settings.base_url, "ai-bridge console starting");

    let client = Arc::new(BridgeClient::builder(settings.base_url.clone()).build());
    let session = new_shared_session();
    let metrics = new_shared_metrics();
    let notifier = Notifier::new();
    let store = ObjectiveStore::new(settings.store_path.clone());

    let mut objective = settings.objective.clone();
    if objective.is_none() {
        match store.load() {
            Ok(stored) => objective = stored,
            Err(e) => notifier.error(e.to_string()),
        }
    }

    // Default gating: auto-approve both agents. Best-effort — a dead backend
    // at startup is reported and otherwise ignored.
    for agent in [Agent::ClaudeA, Agent::ClaudeB] {
        if let Err(e) = client.set_yes_all(agent.wire_id(), true).await {
            warn!(agent = %agent, error = %e, "set_yes_all failed");
        }
    }

    let session_settings = SessionSettings {
        mode: settings.mode.clone(),
        roles: RoleRegistry::new(settings.role_a.clone(), settings.role_b.clone()),
        max_iterations: settings.max_iterations,
        message_delay: settings.message_delay,
    };
    let controller = SessionController::new(
        client.clone(),
        session.clone(),
        notifier.clone(),
        session_settings,
        settings.export_dir.clone(),
    );

    tokio::spawn(MessagePoller::new(client.clone(), session.clone(), settings.poll_interval).run());
    tokio::spawn(MetricsPoller::new(client.clone(), metrics.clone(), settings.metrics_interval).run());

    print_header(&settings.base_url, objective.as_deref());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bright_blue().bold());
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match command {
            "start" => {
                let goal = if rest.is_empty() {
                    objective.clone().unwrap_or_default()
                } else {
                    rest.to_string()
                };
                if controller.start(&goal).await.is_ok() {
                    objective = Some(goal);
                }
            }
            "stop" => controller.stop(),
            "a" => {
                let _ = controller.send(Agent::ClaudeA, rest).await;
            }
            "b" => {
                let _ = controller.send(Agent::ClaudeB, rest).await;
            }
            "status" => print_status(&session, &metrics, &controller),
            "export" => {
                let _ = controller.export();
            }
            "clear" => controller.clear(),
            "objective" => {
                if rest.is_empty() {
                    match &objective {
                        Some(goal) => println!("{} {}", "objective:".bright_yellow(), goal),
                        None => notifier.error("No objective defined"),
                    }
                } else {
                    match store.save(rest) {
                        Ok(()) => {
                            objective = Some(rest.to_string());
                            notifier.success("Objective saved");
                        }
                        Err(e) => notifier.error(e.to_string()),
                    }
                }
            }
            "template" => {
                if let Ok(prompt) = controller.startup_prompt(objective.as_deref().unwrap_or("")) {
                    println!("\n{}\n", prompt);
                }
            }
            "bundle" => apply_bundle(&client, &notifier, rest).await,
            "logs" => {
                let tail = rest.parse::<usize>().unwrap_or(500);
                match client.fetch_log_tail(tail).await {
                    Ok(text) => println!("{}", text),
                    Err(e) => notifier.error(format!("Error fetching logs: {e}")),
                }
            }
            "help" => print_help(),
            "quit" | "exit" => break,
            other => notifier.error(format!("Unknown command '{other}' — try 'help'")),
        }
    }

    if controller.is_running() {
        controller.stop();
    }
}

/// Read a bundle JSON document from `path` and apply it on the backend.
async fn apply_bundle(client: &BridgeClient, notifier: &Notifier, path: &str) {
    if path.is_empty() {
        notifier.error("Usage: bundle <path.json>");
        return;
    }
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            notifier.error(format!("Cannot read bundle {path}: {e}"));
            return;
        }
    };
    let request: FileBundleRequest = match serde_json::from_str(&text) {
        Ok(req) => req,
        Err(e) => {
            notifier.error(format!("Error parsing bundle: {e}"));
            return;
        }
    };
    match client.apply_file_bundle(&request).await {
        Ok(resp) => notifier.success(format!("Files created: {}", resp.created.len())),
        Err(e) => notifier.error(format!("Error applying bundle: {e}")),
    }
}

fn print_header(base_url: &str, objective: Option<&str>) {
    println!("{}", "AI-BRIDGE DUAL AGENT CONSOLE".bright_cyan().bold());
    println!("{}: {}", "Backend".bright_yellow(), base_url.bright_white());
    println!(
        "{}: {}",
        "Objective".bright_yellow(),
        objective.unwrap_or("(none — set one with 'objective <text>')")
    );
    println!("{}", "=".repeat(50).bright_blue());
    println!("Type 'help' for commands.\n");
}

fn print_status(session: &SharedSession, metrics: &SharedMetrics, controller: &SessionController) {
    let (iteration, max, mode) = {
        let state = session.lock().expect("session lock");
        (state.current_iteration, state.max_iterations, state.mode.clone())
    };
    let status = if controller.is_running() {
        "[ACTIVE] Session in progress".bright_green().bold()
    } else {
        "[READY] Idle".bright_yellow().bold()
    };
    println!("{}", status);
    println!("{}: {}", "Time".bright_yellow(), now_iso());
    println!("{}: {} (iteration {}/{})", "Mode".bright_yellow(), mode, iteration, max);
    let snapshot = *metrics.lock().expect("metrics lock");
    println!(
        "{}: {}  {}: {:.1}  {}: {}",
        "messages".bright_yellow(),
        snapshot.message_count,
        "msgs/min".bright_yellow(),
        snapshot.messages_per_minute,
        "repeats".bright_yellow(),
        snapshot.repeat_count,
    );
}

fn print_help() {
    println!("{}", "Commands:".bright_white().bold());
    println!("  start [objective]   start the automated session");
    println!("  stop                stop the session");
    println!("  a <text>            send a message as Claude-A");
    println!("  b <text>            send a message as Claude-B");
    println!("  status              session state, clock, and latest metrics");
    println!("  export              write the conversation to a text file");
    println!("  clear               reset the conversation log");
    println!("  objective [text]    show or persist the objective");
    println!("  template            print the dual-agent startup prompt");
    println!("  bundle <path.json>  apply a file bundle on the backend");
    println!("  logs [n]            print the last n project log lines (default 500)");
    println!("  quit                leave the console");
}
