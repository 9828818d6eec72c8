//! `agentdeck watch`: live activity feed with connection and liveness status.

use std::collections::HashSet;
use std::time::Duration;

use agentdeck_core::connection::{self, WsConnector};
use agentdeck_core::history;
use agentdeck_core::liveness::activity_description;
use agentdeck_core::store::{self, SharedStores};
use agentdeck_core::{ApiClient, Config, LivenessOracle, Signal, Stores};
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;

use crate::render::activity_line;

/// Feed lines already printed, pruned as the store evicts them.
struct Printed {
    ids: HashSet<String>,
}

impl Printed {
    fn print_new(&mut self, stores: &SharedStores, agent: Option<&str>) {
        let stores = store::lock(stores);
        let fresh: Vec<String> = stores
            .activities
            .iter()
            .filter(|a| agent.map_or(true, |agent| a.agent_id == agent))
            .filter(|a| !self.ids.contains(&a.id))
            .map(activity_line)
            .collect();
        // Newest-first in the store, oldest-first on screen
        for line in fresh.iter().rev() {
            println!("{}", line);
        }
        for activity in stores.activities.iter() {
            self.ids.insert(activity.id.clone());
        }
        self.ids.retain(|id| stores.activities.contains(id));
    }
}

fn liveness_line(stores: &SharedStores, oracle: &LivenessOracle, agent: Option<&str>) -> String {
    let stores = store::lock(stores);
    let now = Utc::now();
    match agent {
        Some(agent) => match oracle.active_for_agent(&stores.agent_events, Some(agent), now) {
            Some(event) => format!("{}: {}", agent, activity_description(event.tool_name.as_deref())),
            None => format!("{}: idle", agent),
        },
        None => {
            let active = oracle.active_sessions(&stores.agent_events, now);
            if active.is_empty() {
                "no agents working".to_string()
            } else {
                let described: Vec<String> = active
                    .iter()
                    .map(|session| {
                        let tool = stores
                            .agent_events
                            .latest(session)
                            .and_then(|e| e.tool_name.as_deref());
                        format!("{} ({})", session, activity_description(tool))
                    })
                    .collect();
                format!("working: {}", described.join(", "))
            }
        }
    }
}

async fn run_backfill(client: &ApiClient, stores: &SharedStores, config: &Config) {
    if let Err(e) = history::backfill(client, stores, &config.history).await {
        tracing::warn!(error = %e, "History backfill failed");
        eprintln!("history unavailable: {}", e);
    }
}

pub async fn cmd_watch(config: &Config, agent: Option<String>) -> Result<()> {
    let client = ApiClient::new(&config.server).context("failed to create API client")?;
    let stores = Stores::shared(&config.stores);
    store::lock(&stores).view.select_agent(agent.clone());
    let oracle = LivenessOracle::from_config(&config.liveness);
    let agent = agent.as_deref();

    if !client.health_check().await.unwrap_or(false) {
        eprintln!(
            "warning: {} is not answering yet, will keep retrying",
            client.base_url()
        );
    }

    let url = config.server.stream_url();
    let handle = connection::spawn(WsConnector::new(url.clone()), stores.clone(), &config.connection);
    let mut signals = handle.subscribe();
    let mut status = handle.watch_status();
    handle.connect();

    println!("Watching {} (Ctrl+C to stop)", url);
    println!();

    let mut printed = Printed {
        ids: HashSet::new(),
    };
    let mut last_liveness = String::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!("\nShutting down...");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("-- {}", current);
            }
            signal = signals.recv() => match signal {
                Ok(Signal::StreamOpened { .. }) => run_backfill(&client, &stores, config).await,
                Ok(Signal::AgentArchived { agent_id, was_selected }) => {
                    println!("-- agent {} archived", agent_id);
                    if was_selected {
                        println!("-- now viewing archived history for {}", agent_id);
                    }
                }
                Ok(Signal::MessagesStale) | Ok(Signal::SessionsStale) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Signal subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                printed.print_new(&stores, agent);
                let liveness = liveness_line(&stores, &oracle, agent);
                if liveness != last_liveness {
                    println!("-- {}", liveness);
                    last_liveness = liveness;
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
