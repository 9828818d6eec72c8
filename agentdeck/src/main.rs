//! agentdeck - command-line front end for the multi-agent dashboard
//!
//! This tool provides commands for:
//! - Following the live event stream with connection and liveness status
//! - Printing per-message timelines of correlated thoughts and tool calls
//! - Operator controls: message, interrupt, compact, terminal snapshot
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/agentdeck/agentdeck.log.YYYY-MM-DD (rotated daily)
//! - Config: $XDG_CONFIG_HOME/agentdeck/config.toml (~/.config/agentdeck/config.toml)

mod render;
mod watch;

use agentdeck_core::history::{self, MessageFeed, MessageHistory};
use agentdeck_core::{correlate, ApiClient, Config, Stores};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(about = "Live event feed and message timelines for a multi-agent dashboard")]
#[command(version)]
struct Args {
    /// Dashboard base URL (overrides server.base_url)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the live event stream
    Watch {
        /// Only show activity from this agent
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Show recent messages with their correlated steps
    Timeline {
        /// Only show messages from or to this agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a chat message to an agent
    Send {
        agent: String,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },

    /// Interrupt an agent's current turn
    Interrupt { agent: String },

    /// Ask an agent to compact its context
    Compact { agent: String },

    /// Print the tail of an agent's terminal
    Terminal {
        agent: String,

        /// Number of lines
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Show configuration paths and effective settings
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(server) = args.server {
        config.server.base_url = server;
        config.validate().context("invalid --server")?;
    }

    // Initialize logging
    let _log_guard =
        agentdeck_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(command = command_name(&args.command), "agentdeck starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    runtime.block_on(run(args.command, config))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Watch { .. } => "watch",
        Command::Timeline { .. } => "timeline",
        Command::Send { .. } => "send",
        Command::Interrupt { .. } => "interrupt",
        Command::Compact { .. } => "compact",
        Command::Terminal { .. } => "terminal",
        Command::Config => "config",
    }
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Watch { agent } => watch::cmd_watch(&config, agent).await,
        Command::Timeline { agent, limit } => cmd_timeline(&config, agent, limit).await,
        Command::Send { agent, content } => {
            let client = api_client(&config)?;
            client
                .send_message(&agent, &content.join(" "))
                .await
                .with_context(|| format!("failed to send message to {}", agent))?;
            println!("Sent to {}", agent);
            Ok(())
        }
        Command::Interrupt { agent } => {
            let client = api_client(&config)?;
            client
                .interrupt(&agent)
                .await
                .with_context(|| format!("failed to interrupt {}", agent))?;
            println!("Interrupted {}", agent);
            Ok(())
        }
        Command::Compact { agent } => {
            let client = api_client(&config)?;
            client
                .compact(&agent)
                .await
                .with_context(|| format!("failed to compact {}", agent))?;
            println!("Compaction requested for {}", agent);
            Ok(())
        }
        Command::Terminal { agent, lines } => {
            let client = api_client(&config)?;
            let snapshot = client
                .agent_terminal(&agent, lines)
                .await
                .with_context(|| format!("failed to read terminal of {}", agent))?;
            print!("{}", snapshot.output);
            if !snapshot.output.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        Command::Config => {
            cmd_config(&config);
            Ok(())
        }
    }
}

fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(&config.server).context("failed to create API client")
}

async fn cmd_timeline(config: &Config, agent: Option<String>, limit: usize) -> Result<()> {
    let client = api_client(config)?;
    let stores = Stores::shared(&config.stores);

    // Recent events and thoughts stand in for the live stores
    history::backfill(&client, &stores, &config.history)
        .await
        .context("failed to load recent history")?;

    let involves = |from: &str, to: &str| {
        agent
            .as_deref()
            .map_or(true, |agent| from == agent || to == agent)
    };

    let mut feed = MessageFeed::new(config.history.message_page_size);
    loop {
        let matching = feed
            .messages()
            .iter()
            .filter(|m| involves(&m.from_agent, &m.to_agent))
            .count();
        if matching >= limit || !feed.has_more() {
            break;
        }
        if feed
            .load_next(&client)
            .await
            .context("failed to fetch messages")?
            == 0
        {
            break;
        }
    }

    let mut messages: Vec<_> = feed
        .messages()
        .iter()
        .filter(|m| involves(&m.from_agent, &m.to_agent))
        .cloned()
        .collect();
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    messages.truncate(limit);

    if messages.is_empty() {
        println!("No messages.");
        return Ok(());
    }

    let merged = MessageHistory::load(&client, &stores, messages, &config.history)
        .await
        .context("failed to load message history")?;
    let correlation = correlate(&merged);

    for line in render::timeline_lines(&correlation, Utc::now()) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_config(config: &Config) {
    let config_path = Config::config_path();
    let found = if config_path.exists() {
        ""
    } else {
        " (not found, using defaults)"
    };

    println!("agentdeck Configuration");
    println!("=======================");
    println!();
    println!("Config file:     {}{}", config_path.display(), found);
    println!(
        "Log file:        {} (rotated daily)",
        Config::log_path(Utc::now().date_naive()).display()
    );
    println!();
    println!("Server:          {}", config.server.base_url);
    println!("Stream:          {}", config.server.stream_url());
    println!(
        "HTTP:            timeout {}s, {} retries",
        config.server.timeout_secs, config.server.max_retries
    );
    println!(
        "Reconnect:       {}ms doubling to {}ms",
        config.connection.reconnect_base_ms, config.connection.reconnect_max_ms
    );
    println!(
        "Stores:          {} activities, {} events/session, {} thoughts",
        config.stores.max_activities,
        config.stores.max_events_per_session,
        config.stores.max_thoughts
    );
    println!(
        "Liveness:        active for {}s after a tool use",
        config.liveness.activity_timeout_secs
    );
    println!(
        "History:         {} messages/page, {} thoughts, {} events backfilled",
        config.history.message_page_size,
        config.history.thought_limit,
        config.history.event_backfill_limit
    );
    println!("Log level:       {}", config.logging.level);
}
