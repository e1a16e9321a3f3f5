//! Terminal front end of the chat application.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::llm::AzureOpenAIProvider;
use super::session::{ChatSession, McpConnection};
use super::style::{self, get_styles, CommandHelp, PROMPT};
use super::watch::{plan_reload, ConfigSource, ConfigWatcher};
use crate::config::{AppConfig, EnvSnapshot};
use crate::mcp::client::{McpClient, McpServerSpec};

const WATCH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(styles = get_styles(), name = "", disable_help_subcommand = true)]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
enum InnerCommand {
    /// Launch an MCP server and make its tools available.
    Connect {
        name: String,
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Stop an MCP server and drop its tools.
    Disconnect { name: String },

    /// Show the tools of every connected server.
    Tools,

    /// Show connected servers.
    Servers,

    /// Start a new conversation.
    Reset,

    /// Read the configuration again and apply it.
    Reload,

    /// Show this help.
    Help,

    /// Leave the chat.
    #[command(alias = "quit")]
    Exit,
}

const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "connect",
        args: "<name> <command> [args...]",
        description: "Launch an MCP server and make its tools available",
    },
    CommandHelp {
        name: "disconnect",
        args: "<name>",
        description: "Stop an MCP server and drop its tools",
    },
    CommandHelp {
        name: "tools",
        args: "",
        description: "Show the tools of every connected server",
    },
    CommandHelp {
        name: "servers",
        args: "",
        description: "Show connected servers",
    },
    CommandHelp {
        name: "reset",
        args: "",
        description: "Start a new conversation",
    },
    CommandHelp {
        name: "reload",
        args: "",
        description: "Read the configuration again and apply it",
    },
    CommandHelp {
        name: "help",
        args: "",
        description: "Show this help",
    },
    CommandHelp {
        name: "exit",
        args: "",
        description: "Leave the chat",
    },
];

/// Parse a `/command` line. `Err` carries clap's rendered message.
fn parse_command(line: &str) -> Result<InnerCommand, String> {
    let line = line.strip_prefix('/').unwrap_or(line);
    let args =
        shlex::split(line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    InnerCli::try_parse_from(std::iter::once("").chain(args.iter().map(String::as_str)))
        .map(|cli| cli.command)
        .map_err(|e| e.render().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

// ============================================================================
// Line editor thread
// ============================================================================

enum InputEvent {
    Line(String),
    Closed,
}

#[derive(rustyline_derive::Hinter)]
struct ChatHelper {
    commands_names: Vec<String>,
}

impl ChatHelper {
    fn new() -> Self {
        let commands_names = InnerCli::command()
            .get_subcommands()
            .map(|sc| format!("/{}", sc.get_name()))
            .collect();
        ChatHelper { commands_names }
    }
}

impl Completer for ChatHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect();
        Ok((0, matches))
    }
}

impl Highlighter for ChatHelper {}
impl Validator for ChatHelper {}
impl Helper for ChatHelper {}

struct Input {
    events: mpsc::Receiver<InputEvent>,
    ack: std::sync::mpsc::Sender<()>,
    thread: std::thread::JoinHandle<()>,
}

/// Runs the blocking line editor on its own thread. After each line the
/// thread waits for an ack so the prompt comes back once output is done.
fn spawn_input(history_file: Option<PathBuf>) -> Input {
    let (events_tx, events) = mpsc::channel(1);
    let (ack, ack_rx) = std::sync::mpsc::channel::<()>();

    let thread = std::thread::spawn(move || {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();
        let mut rl = match Editor::<ChatHelper, FileHistory>::with_config(config) {
            Ok(rl) => rl,
            Err(e) => {
                warn!("Failed to start line editor: {}", e);
                let _ = events_tx.blocking_send(InputEvent::Closed);
                return;
            }
        };
        rl.set_helper(Some(ChatHelper::new()));
        if let Some(path) = &history_file {
            if let Err(e) = rl.load_history(path) {
                debug!("No history loaded from {:?}: {}", path, e);
            }
        }

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    if events_tx.blocking_send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                    if ack_rx.recv().is_err() {
                        break;
                    }
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    let _ = events_tx.blocking_send(InputEvent::Closed);
                    break;
                }
                Err(rustyline::error::ReadlineError::Eof) => {
                    println!("CTRL-D");
                    let _ = events_tx.blocking_send(InputEvent::Closed);
                    break;
                }
                Err(e) => {
                    warn!("Line editor error: {}", e);
                    let _ = events_tx.blocking_send(InputEvent::Closed);
                    break;
                }
            }
        }

        if let Some(path) = &history_file {
            if let Err(e) = rl.save_history(path) {
                warn!("Failed to save history to {:?}: {}", path, e);
            }
        }
    });

    Input {
        events,
        ack,
        thread,
    }
}

// ============================================================================
// Application
// ============================================================================

pub struct ChatApp {
    session: ChatSession,
    source: ConfigSource,
    config: AppConfig,
    /// Servers started from the configuration file, by name
    configured: BTreeMap<String, McpServerSpec>,
}

impl ChatApp {
    pub fn new(source: ConfigSource, config: AppConfig) -> Self {
        let llm = Arc::new(AzureOpenAIProvider::new(config.llm.clone()));
        let session = ChatSession::new(llm, config.chat.clone());
        Self {
            session,
            source,
            config,
            configured: BTreeMap::new(),
        }
    }

    pub async fn run(mut self, watch: bool) -> Result<()> {
        style::print_welcome(&self.config.llm.endpoint, &self.config.llm.deployment);

        for spec in self.config.mcp_servers.clone() {
            if self.connect(spec.clone()).await {
                self.configured.insert(spec.name.clone(), spec);
            }
        }

        let mut input = spawn_input(self.config.chat.history_file.clone());
        let mut watcher = watch.then(|| ConfigWatcher::new(self.source.watched_paths()));
        if let Some(watcher) = &watcher {
            info!("Watching {:?} for changes", watcher.paths());
        }
        let mut ticker = tokio::time::interval(WATCH_INTERVAL);

        loop {
            tokio::select! {
                event = input.events.recv() => {
                    let flow = match event {
                        Some(InputEvent::Line(line)) => self.handle_line(line.trim()).await,
                        Some(InputEvent::Closed) | None => Flow::Exit,
                    };
                    if flow == Flow::Exit {
                        break;
                    }
                    style::flush();
                    let _ = input.ack.send(());
                }
                _ = ticker.tick(), if watcher.is_some() => {
                    if watcher.as_mut().is_some_and(ConfigWatcher::poll_changed) {
                        println!();
                        style::print_warning("Configuration changed, reloading");
                        self.reload().await;
                        print!("{}", PROMPT);
                        style::flush();
                    }
                }
            }
        }

        // Dropping the ack lets the editor thread save its history and end
        drop(input.ack);
        let _ = tokio::task::spawn_blocking(move || input.thread.join()).await;

        self.shutdown_all().await;
        style::print_goodbye();
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        if !line.starts_with('/') {
            self.chat(line).await;
            return Flow::Continue;
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                return Flow::Continue;
            }
        };

        match command {
            InnerCommand::Connect {
                name,
                command,
                args,
            } => {
                let mut spec = McpServerSpec::new(name, command);
                spec.args = args;
                match EnvSnapshot::load(self.source.env_file.as_deref()) {
                    Ok(env) => spec.env = env.file_vars().clone(),
                    Err(e) => warn!("Could not read env file for {}: {}", spec.name, e),
                }
                self.configured.remove(&spec.name);
                self.connect(spec).await;
            }
            InnerCommand::Disconnect { name } => {
                self.configured.remove(&name);
                if !self.disconnect(&name).await {
                    style::print_error(&format!("No server named {}", name));
                }
            }
            InnerCommand::Tools => self.print_tools(),
            InnerCommand::Servers => self.print_servers(),
            InnerCommand::Reset => {
                self.session.reset();
                style::print_success("Conversation cleared");
            }
            InnerCommand::Reload => self.reload().await,
            InnerCommand::Help => style::print_help(COMMANDS),
            InnerCommand::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    async fn chat(&mut self, text: &str) {
        match self.session.send(text).await {
            Ok(reply) => style::print_reply(&reply),
            Err(e) => style::print_error(&e.to_string()),
        }
    }

    /// Start a server and attach it, replacing one with the same name.
    async fn connect(&mut self, spec: McpServerSpec) -> bool {
        let name = spec.name.clone();
        info!(server = %name, command = %spec.command, "Connecting MCP server");

        match McpClient::connect(spec, self.session.settings().tool_timeout).await {
            Ok(client) => {
                style::print_success(&format!("Connected to {}", name));
                for tool in client.tools() {
                    style::print_list_item(&tool.name, &tool.description, 1);
                }
                if let Some(previous) = self.session.add_connection(Arc::new(client)) {
                    previous.shutdown().await;
                }
                true
            }
            Err(e) => {
                style::print_error(&format!("Failed to connect to {}: {}", name, e));
                false
            }
        }
    }

    async fn disconnect(&mut self, name: &str) -> bool {
        match self.session.remove_connection(name) {
            Some(connection) => {
                connection.shutdown().await;
                style::print_success(&format!("Disconnected from {}", name));
                true
            }
            None => false,
        }
    }

    async fn reload(&mut self) {
        let config = match self.source.load() {
            Ok(config) => config,
            Err(e) => {
                style::print_error(&format!("Reload failed, keeping current configuration: {:#}", e));
                return;
            }
        };

        if config.llm != self.config.llm {
            info!(
                endpoint = %config.llm.endpoint,
                deployment = %config.llm.deployment,
                "Azure OpenAI settings changed"
            );
            self.session
                .set_llm(Arc::new(AzureOpenAIProvider::new(config.llm.clone())));
        }
        self.session.update_settings(config.chat.clone());

        let attached = self.attached_by_hand();
        let plan = plan_reload(&self.configured, &config.mcp_servers, &attached);
        for name in &plan.stop {
            self.configured.remove(name);
            self.disconnect(name).await;
        }
        for spec in plan.start {
            if self.connect(spec.clone()).await {
                self.configured.insert(spec.name.clone(), spec);
            }
        }

        self.config = config;
        style::print_success("Configuration reloaded");
    }

    /// Live connections that did not come from the configuration file.
    fn attached_by_hand(&self) -> BTreeSet<String> {
        self.session
            .connections()
            .map(|c| c.name().to_string())
            .filter(|name| !self.configured.contains_key(name))
            .collect()
    }

    fn print_tools(&self) {
        style::print_section_header("Tools");
        let mut any = false;
        for connection in self.session.connections() {
            style::print_key_value("Server", connection.name());
            for tool in connection.tools() {
                any = true;
                style::print_list_item(&tool.name, &tool.description, 1);
            }
        }
        if !any {
            style::print_empty_list("No tools available, attach a server with /connect");
        }
        style::print_section_footer();
    }

    fn print_servers(&self) {
        style::print_section_header("Servers");
        let mut any = false;
        for connection in self.session.connections() {
            any = true;
            let origin = if self.configured.contains_key(connection.name()) {
                "config"
            } else {
                "/connect"
            };
            style::print_list_item(
                connection.name(),
                &format!("{} tools, from {}", connection.tools().len(), origin),
                0,
            );
        }
        if !any {
            style::print_empty_list("No servers connected");
        }
        style::print_section_footer();
    }

    async fn shutdown_all(&mut self) {
        for connection in self.session.take_connections() {
            connection.shutdown().await;
        }
    }
}
